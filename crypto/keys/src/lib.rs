// Copyright (c) 2018-2022 The Botho Foundation

//! Edwards25519 scalar/point arithmetic, Keccak hashing, HMAC and AEAD
//! primitives used throughout the Botho hardware-wallet signing core.
//!
//! Monero works directly on the Edwards25519 curve (not its Ristretto
//! quotient), so unlike most Botho crates this wraps
//! `curve25519_dalek::edwards::EdwardsPoint` rather than `RistrettoPoint`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod aead_box;
mod point;
mod scalar;

pub use aead_box::{open, seal, AeadError};
pub use point::{Point, PointDecodingError, G};
pub use scalar::Scalar;

use sha3::{Digest, Keccak256};

/// `keccak256(data)`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Monero's `cn_fast_hash`, an alias for [`keccak256`].
pub fn cn_fast_hash(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// `keccak256(keccak256(data))`, used throughout the key schedule.
pub fn keccak_2hash(data: &[u8]) -> [u8; 32] {
    keccak256(&keccak256(data))
}

/// `HMAC(key, msg) = keccak_2hash(key || msg)`.
///
/// This is the lightweight HMAC construction specified for the signing
/// core; it is not HMAC-SHA3 in the NIST sense, but the double-hash
/// construction the onboard firmware actually uses.
pub fn compute_hmac(key: &[u8; 32], msg: &[u8]) -> [u8; 32] {
    let mut buf = alloc::vec::Vec::with_capacity(32 + msg.len());
    buf.extend_from_slice(key);
    buf.extend_from_slice(msg);
    keccak_2hash(&buf)
}

/// Constant-time equality for byte strings of equal length.
///
/// Unequal lengths are rejected in variable time (the length of a blob is
/// not secret); the byte-by-byte comparison itself is constant time.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_2hash_matches_double_application() {
        let data = b"botho monero signer";
        let once = keccak256(data);
        let twice = keccak256(&once);
        assert_eq!(keccak_2hash(data), twice);
    }

    #[test]
    fn ct_eq_rejects_single_bit_flip() {
        let a = [1u8, 2, 3, 4];
        let mut b = a;
        b[2] ^= 0x01;
        assert!(ct_eq(&a, &a));
        assert!(!ct_eq(&a, &b));
    }

    #[test]
    fn ct_eq_rejects_length_mismatch() {
        assert!(!ct_eq(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn compute_hmac_is_deterministic() {
        let key = [7u8; 32];
        let msg = b"pseudo_out";
        assert_eq!(compute_hmac(&key, msg), compute_hmac(&key, msg));
    }

    #[test]
    fn compute_hmac_differs_on_key() {
        let msg = b"pseudo_out";
        assert_ne!(compute_hmac(&[1u8; 32], msg), compute_hmac(&[2u8; 32], msg));
    }
}
