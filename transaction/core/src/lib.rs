// Copyright (c) 2018-2022 The Botho Foundation

//! Canonical serializer, wire types and incremental hashers for
//! Monero-style RingCT transactions: the shared vocabulary the signing
//! engine and the host's transaction builder both speak.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod hashers;
mod serializer;
mod tx_error;
mod wire_types;

pub use hashers::{PreMlsagHasher, TxPrefixHasher};
pub use serializer::{Reader, ReaderError, Writer};
pub use tx_error::TxCoreError;
pub use wire_types::{
    extra_tag, DestinationAddress, ExtraField, RctType, RingMember, TsxData, TxDestinationEntry,
    TxSourceEntry, TxinToKey, TxoutToKey, TXIN_TO_KEY_VARIANT_CODE, TXOUT_TO_KEY_VARIANT_CODE,
};

// Re-exported so downstream crates can build commitments and key images
// without a direct dependency on `bth-crypto-ring-signature`.
pub use bth_crypto_ring_signature::{Commitment, CompressedCommitment, KeyImage};
