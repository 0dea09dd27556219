// Copyright (c) 2018-2022 The Botho Foundation

use core::ops::{Add, Mul, Neg, Sub};

use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    traits::{Identity, IsIdentity},
};
use displaydoc::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{keccak256, Scalar};

/// Errors which can occur decoding a compressed Edwards point.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PointDecodingError {
    /// point is not a valid canonical encoding of a curve point
    InvalidEncoding,
}

/// A point on the Edwards25519 curve, canonically encoded as 32 bytes.
///
/// Monero's wire format and its `hash_to_point` function are both defined
/// directly over Edwards25519 (not the Ristretto quotient group used by
/// most other Botho crates), so this wraps `EdwardsPoint` rather than
/// `RistrettoPoint`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Zeroize)]
pub struct Point(pub(crate) EdwardsPoint);

/// The base generator `G`.
pub const G: Point = Point(ED25519_BASEPOINT_POINT);

impl Point {
    /// The identity (neutral) element.
    pub fn identity() -> Self {
        Point(EdwardsPoint::identity())
    }

    /// `self == identity`.
    pub fn is_identity(&self) -> bool {
        self.0.is_identity()
    }

    /// Decode a canonical 32-byte point encoding.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, PointDecodingError> {
        let compressed = CompressedEdwardsY(*bytes);
        let point = compressed
            .decompress()
            .ok_or(PointDecodingError::InvalidEncoding)?;
        Ok(Point(point))
    }

    /// Encode to the canonical 32-byte representation.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    /// A hash-to-curve map in the spirit of Monero's `H_p`: hash a point
    /// to a new curve point with unknown discrete log relative to `G`.
    ///
    /// This is a try-and-increment decompression loop, not Monero's real
    /// `ge_fromfe_frombytes_vartime` elligator-style map, and `pedersen_h`
    /// built from it is not Monero's real hardcoded `H` constant. Points
    /// produced here differ from the reference implementation's, so
    /// commitments and key images built on this `H`/`H_p` will not
    /// validate under real Monero consensus rules. Bit-exact consensus
    /// compatibility is out of scope for this engine; see `DESIGN.md`.
    pub fn hash_to_point(&self) -> Self {
        let digest = keccak256(&self.to_bytes());
        Self::hash_to_point_bytes(&digest)
    }

    /// `H_p` applied directly to an arbitrary byte string (used for the
    /// Pedersen generator `H = H_p(G)` and by tests).
    pub fn hash_to_point_bytes(bytes: &[u8; 32]) -> Self {
        // Try-and-increment: not the real `ge_fromfe` field-element map.
        let mut candidate = *bytes;
        let point = loop {
            if let Some(p) = CompressedEdwardsY(candidate).decompress() {
                break p;
            }
            candidate = keccak256(&candidate);
        };
        // Clear the cofactor (8).
        Point(point.mul_by_cofactor())
    }

    /// The alternate Pedersen generator `H = H_p(G)`, used for amount
    /// commitments `C = mask*G + amount*H`.
    ///
    /// Not Monero's published `H` constant — see [`Point::hash_to_point`].
    pub fn pedersen_h() -> Self {
        G.hash_to_point()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point(-self.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Point;
    fn mul(self, rhs: Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl Mul<Point> for Scalar {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        Point(self.0 * rhs.0)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Point {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: alloc::vec::Vec<u8> = Deserialize::deserialize(deserializer)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Point::from_bytes(&arr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_roundtrip() {
        let id = Point::identity();
        let bytes = id.to_bytes();
        assert_eq!(Point::from_bytes(&bytes).unwrap(), id);
    }

    #[test]
    fn g_encode_decode_roundtrip() {
        let bytes = G.to_bytes();
        let decoded = Point::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, G);
    }

    #[test]
    fn invalid_encoding_rejected() {
        // All-1s is not a valid compressed Edwards point.
        let bytes = [0xFFu8; 32];
        assert!(Point::from_bytes(&bytes).is_err());
    }

    #[test]
    fn hash_to_point_is_deterministic_and_not_g() {
        let h1 = Point::pedersen_h();
        let h2 = Point::pedersen_h();
        assert_eq!(h1, h2);
        assert_ne!(h1, G);
    }

    #[test]
    fn hash_to_point_differs_for_different_inputs() {
        let a = Point::hash_to_point_bytes(&[1u8; 32]);
        let b = Point::hash_to_point_bytes(&[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn scalar_mult_distributes_over_add() {
        let s = Scalar::from(7u64);
        let lhs = s * (G + G);
        let rhs = (s * G) + (s * G);
        assert_eq!(lhs, rhs);
    }
}
