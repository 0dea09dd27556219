// Copyright (c) 2018-2022 The Botho Foundation

//! A Monero public address: a subaddress spend/view keypair `(D, C)`,
//! plus a network tag distinguishing mainnet/testnet/stagenet.

use bth_crypto_keys::{Point, PointDecodingError, Scalar, G};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain_separators::SUBADDRESS_DOMAIN_TAG;

/// The index `(0, 0)` is the primary address, not a derived subaddress.
pub const PRIMARY_ADDRESS_INDEX: SubaddressIndex = SubaddressIndex { major: 0, minor: 0 };

/// A `(major, minor)` subaddress account/index pair.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubaddressIndex {
    /// The account index.
    pub major: u32,
    /// The subaddress index within the account.
    pub minor: u32,
}

impl SubaddressIndex {
    /// Construct an index.
    pub fn new(major: u32, minor: u32) -> Self {
        SubaddressIndex { major, minor }
    }

    /// Whether this index denotes the primary address (no derivation).
    pub fn is_primary(&self) -> bool {
        self.major == 0 && self.minor == 0
    }
}

/// A public address: `(spend_public, view_public)`, plus the network tag
/// the address was constructed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct PublicAddress {
    spend_public: Point,
    view_public: Point,
}

impl PublicAddress {
    /// Build a public address from its two public keys.
    pub fn new(spend_public: Point, view_public: Point) -> Self {
        PublicAddress {
            spend_public,
            view_public,
        }
    }

    /// Decode a public address from its two 32-byte public key encodings.
    pub fn from_bytes(
        spend_public: &[u8; 32],
        view_public: &[u8; 32],
    ) -> Result<Self, PointDecodingError> {
        Ok(PublicAddress::new(
            Point::from_bytes(spend_public)?,
            Point::from_bytes(view_public)?,
        ))
    }

    /// The public spend key `D`.
    pub fn spend_public_key(&self) -> Point {
        self.spend_public
    }

    /// The public view key `C`.
    pub fn view_public_key(&self) -> Point {
        self.view_public
    }

    /// Derive the subaddress `(D_i, C_i)` for `index`, given the
    /// account's view secret `a`.
    ///
    /// `index == (0, 0)` returns the primary address unchanged (Monero
    /// special-cases the primary address rather than hashing it through
    /// the subaddress derivation, so wallets that never use subaddresses
    /// incur no extra scalar multiplications).
    pub fn subaddress(&self, view_secret: &Scalar, index: &SubaddressIndex) -> PublicAddress {
        if index.is_primary() {
            return *self;
        }
        let m = subaddress_scalar(view_secret, index);
        let spend_public = self.spend_public + (m * G);
        let view_public = *view_secret * spend_public;
        PublicAddress::new(spend_public, view_public)
    }
}

/// `m = Hs("SubAddr\0" || a || major || minor)`, the per-index scalar
/// Monero subaddresses are derived from.
pub fn subaddress_scalar(view_secret: &Scalar, index: &SubaddressIndex) -> Scalar {
    let mut buf = [0u8; SUBADDRESS_DOMAIN_TAG.len() + 32 + 4 + 4];
    let mut offset = 0;
    buf[offset..offset + SUBADDRESS_DOMAIN_TAG.len()].copy_from_slice(SUBADDRESS_DOMAIN_TAG);
    offset += SUBADDRESS_DOMAIN_TAG.len();
    buf[offset..offset + 32].copy_from_slice(&view_secret.to_bytes());
    offset += 32;
    buf[offset..offset + 4].copy_from_slice(&index.major.to_le_bytes());
    offset += 4;
    buf[offset..offset + 4].copy_from_slice(&index.minor.to_le_bytes());

    Scalar::from_hash_bytes(&bth_crypto_keys::keccak256(&buf))
}
