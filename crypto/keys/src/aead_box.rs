// Copyright (c) 2018-2022 The Botho Foundation

//! AES-256-GCM sealing for state the device offloads to the untrusted host
//! (`alpha_i`, the multisig `c_out` value, and the final `enc(r)` blob).
//!
//! Wire format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aead::{Aead, AeadCore, KeyInit};
use aes_gcm::Aes256Gcm;
use alloc::vec::Vec;
use displaydoc::Display;
use rand_core::{CryptoRng, RngCore};

/// Errors sealing or opening an offloaded blob.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum AeadError {
    /// ciphertext is shorter than the nonce+tag overhead
    Truncated,
    /// AEAD decryption failed (wrong key or tampered ciphertext)
    DecryptionFailed,
}

const NONCE_LEN: usize = 12;

/// Seal `plaintext` under `key`, returning `nonce || ciphertext || tag`.
pub fn seal<R: RngCore + CryptoRng>(key: &[u8; 32], plaintext: &[u8], rng: &mut R) -> Vec<u8> {
    let cipher = Aes256Gcm::new(key.into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);
    let nonce = aes_gcm::Nonce::from_slice(&nonce_bytes);
    // A freshly sampled 96-bit nonce only collides with negligible
    // probability for the small number of offload operations per
    // transaction; the signer never reuses a key across sessions.
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-GCM encryption is infallible for valid key/nonce sizes");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Open a blob produced by [`seal`].
pub fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, AeadError> {
    if blob.len() < NONCE_LEN + 16 {
        return Err(AeadError::Truncated);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.into());
    let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| AeadError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn seal_open_roundtrip() {
        let mut rng = StdRng::from_seed([9u8; 32]);
        let key = [3u8; 32];
        let plaintext = b"alpha scalar bytes go here......";
        let blob = seal(&key, plaintext, &mut rng);
        let recovered = open(&key, &blob).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn open_rejects_wrong_key() {
        let mut rng = StdRng::from_seed([10u8; 32]);
        let blob = seal(&[1u8; 32], b"secret", &mut rng);
        assert_eq!(open(&[2u8; 32], &blob), Err(AeadError::DecryptionFailed));
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let mut rng = StdRng::from_seed([11u8; 32]);
        let key = [5u8; 32];
        let mut blob = seal(&key, b"secret payload", &mut rng);
        let last = blob.len() - 1;
        blob[last] ^= 1;
        assert_eq!(open(&key, &blob), Err(AeadError::DecryptionFailed));
    }

    #[test]
    fn open_rejects_truncated_blob() {
        assert_eq!(open(&[0u8; 32], &[1, 2, 3]), Err(AeadError::Truncated));
    }
}
