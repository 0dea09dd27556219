// Copyright (c) 2018-2022 The Botho Foundation

//! Errors raised while building or hashing a transaction's wire
//! structures.

use displaydoc::Display;

use crate::serializer::ReaderError;

/// An error constructing or serializing a transaction's wire structures.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TxCoreError {
    /// archive error: {0}
    Reader(ReaderError),
    /// incremental hasher driven out of order
    HasherOutOfOrder,
    /// declared {declared} inputs but {actual} were absorbed
    InputCountMismatch {
        /// number of inputs declared at session start
        declared: usize,
        /// number of inputs actually absorbed
        actual: usize,
    },
    /// declared {declared} outputs but {actual} were absorbed
    OutputCountMismatch {
        /// number of outputs declared at session start
        declared: usize,
        /// number of outputs actually absorbed
        actual: usize,
    },
    /// real output index {0} is out of range for a ring of this size
    RealOutputIndexOutOfBounds(usize),
    /// an RCT type with no Borromean range-proof engine was requested
    UnsupportedRctType,
}

impl From<ReaderError> for TxCoreError {
    fn from(e: ReaderError) -> Self {
        TxCoreError::Reader(e)
    }
}
