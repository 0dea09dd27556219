// Copyright (c) 2018-2022 The Botho Foundation

//! Session credentials. Derivation from a master seed is an external
//! collaborator's job (out of scope here); this crate only defines the
//! shape the signing engine consumes for the lifetime of a session.

use zeroize::{Zeroize, ZeroizeOnDrop};

use bth_crypto_keys::{Point, Scalar, G};

use crate::public_address::PublicAddress;

/// Which Monero network an address was minted for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkTag {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// The developer staging network.
    Stagenet,
}

/// The device's account credentials for the lifetime of a signing session.
///
/// Holds the spend secret, which the rest of the engine never lets leave
/// the device unencrypted; dropped and zeroized at the end of every
/// session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    spend_secret: Scalar,
    view_secret: Scalar,
    #[zeroize(skip)]
    spend_public: Point,
    #[zeroize(skip)]
    view_public: Point,
    #[zeroize(skip)]
    primary_address: PublicAddress,
    #[zeroize(skip)]
    network_tag: NetworkTag,
}

impl Credentials {
    /// Build credentials from an already-derived spend/view keypair.
    ///
    /// Master-seed derivation is assumed to happen upstream of this
    /// crate; this constructor just validates internal consistency
    /// (`spend_public == spend_secret*G`, etc., is the caller's
    /// responsibility, since the two secrets are the only source of
    /// truth here).
    pub fn new(spend_secret: Scalar, view_secret: Scalar, network_tag: NetworkTag) -> Self {
        let spend_public = spend_secret * G;
        let view_public = view_secret * G;
        let primary_address = PublicAddress::new(spend_public, view_public);
        Credentials {
            spend_secret,
            view_secret,
            spend_public,
            view_public,
            primary_address,
            network_tag,
        }
    }

    /// The one-time spend secret `b`.
    pub fn spend_secret(&self) -> &Scalar {
        &self.spend_secret
    }

    /// The view secret `a`.
    pub fn view_secret(&self) -> &Scalar {
        &self.view_secret
    }

    /// The public spend key `B`.
    pub fn spend_public(&self) -> Point {
        self.spend_public
    }

    /// The public view key `A`.
    pub fn view_public(&self) -> Point {
        self.view_public
    }

    /// The account's primary (index `(0,0)`) public address.
    pub fn primary_address(&self) -> &PublicAddress {
        &self.primary_address
    }

    /// Which network this account's addresses are minted for.
    pub fn network_tag(&self) -> NetworkTag {
        self.network_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn primary_address_matches_public_keys() {
        let mut rng = StdRng::from_seed([50u8; 32]);
        let creds = Credentials::new(
            Scalar::random(&mut rng),
            Scalar::random(&mut rng),
            NetworkTag::Mainnet,
        );
        assert_eq!(creds.primary_address().spend_public_key(), creds.spend_public());
        assert_eq!(creds.primary_address().view_public_key(), creds.view_public());
    }
}
