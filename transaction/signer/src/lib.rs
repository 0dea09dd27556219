// Copyright (c) 2018-2022 The Botho Foundation

//! Device-side multi-round Monero RingCT transaction signing engine.
//!
//! The spend key never leaves this crate's custody: the host drives a
//! nine-stage protocol (`state::SigningState`) that presents inputs and
//! outputs one at a time, offloading bulky per-item secrets back to the
//! host under HMAC/AEAD seals it alone can open. A companion key-image
//! export session (`key_image_sync`) answers the host's sync requests
//! for previously received outputs using the same credential set.

#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod config;
mod error;
mod key_image_sync;
mod key_schedule;
mod messages;
mod state;
mod stealth;

pub use config::SignerConfig;
pub use error::SignError;
pub use key_image_sync::{verify_key_image_proof, KeyImageProof, KiSync};
pub use messages::{
    KeyImageSyncRequest, KeyImageSyncResponse, SignTxRequest, SignTxResponse,
};
pub use state::SigningState;
