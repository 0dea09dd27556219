// Copyright (c) 2018-2022 The Botho Foundation

//! Errors which can occur in connection to RingMLSAG signatures.

use displaydoc::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An error which can occur when signing or verifying an MLSAG.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Error {
    /// Incorrect length for array copy, provided `{0}`, required `{1}`.
    LengthMismatch(usize, usize),

    /// Index out of bounds
    IndexOutOfBounds,

    /// Invalid curve point
    InvalidCurvePoint,

    /// The signature was not able to be validated
    InvalidSignature,

    /// Failed to compress/decompress a KeyImage
    InvalidKeyImage,

    /// Value not conserved
    ValueNotConserved,

    /// Mask sum does not match between pseudo-outs and output masks
    MaskSumMismatch,
}

impl From<bth_crypto_keys::PointDecodingError> for Error {
    fn from(_: bth_crypto_keys::PointDecodingError) -> Self {
        Error::InvalidCurvePoint
    }
}
