// Copyright (c) 2018-2022 The Botho Foundation

//! Key images: `I = x · H_p(x·G)`, the deterministic, spend-once tag
//! attached to every signed input so the network can reject double spends.

use bth_crypto_keys::{Point, PointDecodingError, Scalar, G};
use displaydoc::Display;
use zeroize::Zeroize;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors constructing or validating a [`KeyImage`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum KeyImageError {
    /// Key image is not a valid canonical curve point
    InvalidCurvePoint,
}

impl From<PointDecodingError> for KeyImageError {
    fn from(_: PointDecodingError) -> Self {
        KeyImageError::InvalidCurvePoint
    }
}

/// A Monero key image, `I = x · H_p(x·G)` for one-time private key `x`.
///
/// Linkability comes from `H_p`: two outputs spent with the same one-time
/// private key always produce the same `I`, regardless of the ring they
/// are signed in, so the network can reject the second spend without
/// learning which ring member was real.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyImage(pub(crate) Point);

impl KeyImage {
    /// Derive the key image for one-time private key `x`.
    pub fn from_spend_secret(x: &Scalar) -> Self {
        let pubkey = *x * G;
        let hashed = pubkey.hash_to_point();
        KeyImage(*x * hashed)
    }

    /// Decode a canonical 32-byte key image.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyImageError> {
        Ok(KeyImage(Point::from_bytes(bytes)?))
    }

    /// Encode to the canonical 32-byte representation.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The underlying curve point.
    pub fn as_point(&self) -> Point {
        self.0
    }
}

impl Zeroize for KeyImage {
    fn zeroize(&mut self) {
        self.0 = Point::identity();
    }
}

#[cfg(feature = "serde")]
impl Serialize for KeyImage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for KeyImage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(KeyImage(Point::deserialize(deserializer)?))
    }
}
