// Copyright (c) 2018-2022 The Botho Foundation

//! Monero-style account credentials, public addresses, and subaddress
//! derivation.
//!
//! Deriving credentials from a master seed is an external collaborator's
//! job; this crate only defines the `Credentials`/`PublicAddress` shapes
//! the signing engine consumes, and the subaddress derivation formula
//! needed to recognize and build stealth destinations for any index.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod credentials;
mod domain_separators;
mod public_address;

pub use credentials::{Credentials, NetworkTag};
pub use public_address::{
    subaddress_scalar, PublicAddress, SubaddressIndex, PRIMARY_ADDRESS_INDEX,
};
