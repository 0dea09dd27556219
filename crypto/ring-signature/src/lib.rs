// Copyright (c) 2018-2022 The Botho Foundation

//! MLSAG ring signatures, Pedersen commitments, key images and Borromean
//! range proofs for Monero-style RingCT transactions.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod error;

pub mod commitment;
pub mod key_image;
pub mod mlsag;
pub mod range_proof;

pub use error::Error;
pub use key_image::{KeyImage, KeyImageError};
pub use mlsag::{mlsag_sign, mlsag_verify, MgSig, MlsagRing};
pub use range_proof::{prove_range, verify_range, BorromeanRangeProof, RANGE_PROOF_BITS};
pub use commitment::{gen_c, sum_points, Commitment, CompressedCommitment};
