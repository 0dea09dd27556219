// Copyright (c) 2018-2022 The Botho Foundation

//! The signing engine's error taxonomy. Every variant is fatal to the
//! current session: the dispatcher purges `SigningState` and reports a
//! `RespError` to the host, which restarts from `Init`.

use displaydoc::Display;

/// An error raised while driving a signing or key-image-sync session.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SignError {
    /// request stage `{0:?}` is not valid from the current session stage
    WrongStage(&'static str),
    /// index {index} exceeds the declared count {declared}
    IndexOutOfBounds {
        /// the index presented
        index: usize,
        /// the declared bound
        declared: usize,
    },
    /// HMAC did not match the expected value for this fragment
    HmacMismatch,
    /// AEAD open failed for an offloaded secret
    AeadOpenFailed,
    /// the user rejected the transaction at confirmation
    UserRejected,
    /// declared change address does not appear among the outputs
    ChangeAddressNotFound,
    /// host supplied {0} tx keys, fewer than the {1} outputs that need them
    NotEnoughTxKeys(usize, usize),
    /// exactly one payment-id-eligible destination is required, found {0}
    AmbiguousPaymentIdDestination(usize),
    /// sum(inputs) - sum(outputs) != fee
    FeeMismatch,
    /// outputs outnumber inputs
    TooManyOutputs,
    /// sum of pseudo-out masks does not equal sum of output masks
    MaskSumMismatch,
    /// computed tx_prefix_hash does not match the host-supplied value
    PrefixHashMismatch,
    /// recovered one-time key does not match the real output's destination key
    OnetimeKeyMismatch,
    /// recovered commitment does not match the real output's mask commitment
    CommitmentMismatch,
    /// ring member's public key could not be decoded
    InvalidCurvePoint,
    /// no subaddress in scope for this session owns the claimed output
    UnknownDestination,
    /// an RCT type with no Borromean range-proof engine was requested
    UnsupportedRctType,
    /// a ring-signature primitive failed: {0}
    RingSignature(bth_crypto_ring_signature::Error),
    /// a transaction-core primitive failed: {0}
    TransactionCore(bth_transaction_core::TxCoreError),
}

impl From<bth_crypto_ring_signature::Error> for SignError {
    fn from(e: bth_crypto_ring_signature::Error) -> Self {
        SignError::RingSignature(e)
    }
}

impl From<bth_transaction_core::TxCoreError> for SignError {
    fn from(e: bth_transaction_core::TxCoreError) -> Self {
        SignError::TransactionCore(e)
    }
}

impl From<bth_crypto_keys::PointDecodingError> for SignError {
    fn from(_: bth_crypto_keys::PointDecodingError) -> Self {
        SignError::InvalidCurvePoint
    }
}
