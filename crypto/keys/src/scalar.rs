// Copyright (c) 2018-2022 The Botho Foundation

use core::ops::{Add, Mul, Neg, Sub};

use curve25519_dalek::scalar::Scalar as DalekScalar;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A scalar in the Ed25519 scalar field (integers mod `ell`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Zeroize)]
pub struct Scalar(pub(crate) DalekScalar);

impl Scalar {
    /// The additive identity.
    pub fn zero() -> Self {
        Scalar(DalekScalar::ZERO)
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Scalar(DalekScalar::ONE)
    }

    /// Sample a uniformly random scalar.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        Scalar(DalekScalar::from_bytes_mod_order_wide(&bytes))
    }

    /// Decode a little-endian 32-byte canonical scalar encoding.
    ///
    /// Non-canonical encodings (>= ell) are reduced modulo `ell`, matching
    /// the reference implementation's `sc_reduce32` behavior for values
    /// that arrive from hashing rather than user input.
    pub fn from_bytes_mod_order(bytes: &[u8; 32]) -> Self {
        Scalar(DalekScalar::from_bytes_mod_order(*bytes))
    }

    /// Encode to the canonical 32-byte little-endian representation.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Reduce a 32-byte Keccak digest into a scalar, as used for deriving
    /// `amount_key`, `r`, output masks, etc. from a hash.
    pub fn from_hash_bytes(bytes: &[u8; 32]) -> Self {
        Scalar(DalekScalar::from_bytes_mod_order(*bytes))
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar(DalekScalar::from(n))
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Scalar {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: alloc::vec::Vec<u8> = Deserialize::deserialize(deserializer)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Scalar::from_bytes_mod_order(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_additive_identity() {
        let s = Scalar::from(42u64);
        assert_eq!(s + Scalar::zero(), s);
    }

    #[test]
    fn sum_and_negation() {
        let a = Scalar::from(5u64);
        let b = Scalar::from(3u64);
        assert_eq!(a - b + b, a);
        assert_eq!(a + (-a), Scalar::zero());
    }

    #[test]
    fn roundtrip_bytes() {
        let a = Scalar::from(123456789u64);
        let bytes = a.to_bytes();
        assert_eq!(Scalar::from_bytes_mod_order(&bytes), a);
    }
}
