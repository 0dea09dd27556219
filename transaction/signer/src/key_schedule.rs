// Copyright (c) 2018-2022 The Botho Foundation

//! Per-transaction HMAC/AEAD key derivation (`spec.md` §4.4). Every
//! offloaded fragment the host holds on the device's behalf is pinned
//! under a tagged subkey of `key_hmac` or `key_enc`; the device never
//! trusts a re-presented fragment it cannot re-derive the pin for.

use alloc::vec::Vec;

use bth_crypto_keys::{keccak_2hash, Scalar};
use bth_transaction_core::Writer;
use rand_core::{CryptoRng, RngCore};

/// HMAC subkey tag, `H(parent ‖ tag ‖ varint(index))`.
const TAG_TXIN: &[u8] = b"txin";
const TAG_TXIN_COMM: &[u8] = b"txin-comm";
const TAG_TXDEST: &[u8] = b"txdest";
const TAG_TXOUT: &[u8] = b"txout";
const TAG_TXIN_ALPHA: &[u8] = b"txin-alpha";
const TAG_COUT: &[u8] = b"cout";

/// The derived `key_hmac`/`key_enc` pair for one signing session, and
/// the tagged-subkey derivation over them.
#[derive(Clone, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct KeySchedule {
    key_hmac: [u8; 32],
    key_enc: [u8; 32],
}

impl KeySchedule {
    /// Derive the schedule from the canonical `TsxData` bytes, the
    /// session's transaction secret `r`, a per-device transaction
    /// counter, and fresh randomness from `rng`.
    pub fn derive<R: RngCore + CryptoRng>(
        tsx_data_bytes: &[u8],
        r: &Scalar,
        tx_counter: u32,
        rng: &mut R,
    ) -> Self {
        let mut preimage = Vec::with_capacity(tsx_data_bytes.len() + 32 + 5);
        preimage.extend_from_slice(tsx_data_bytes);
        preimage.extend_from_slice(&r.to_bytes());
        let mut counter_bytes = Writer::new();
        counter_bytes.write_varint(tx_counter as u64);
        preimage.extend_from_slice(counter_bytes.as_bytes());

        let digest = bth_crypto_keys::keccak256(&preimage);
        let mut randomness = [0u8; 32];
        rng.fill_bytes(&mut randomness);

        let mut premaster = Vec::with_capacity(64);
        premaster.extend_from_slice(&digest);
        premaster.extend_from_slice(&randomness);
        let key_master = keccak_2hash(&premaster);

        let key_hmac = tagged(&key_master, b"hmac");
        let key_enc = tagged(&key_master, b"enc");
        KeySchedule { key_hmac, key_enc }
    }

    /// `HMAC(K_txin(i), serialize(TxSourceEntry_i ‖ vin_i))`.
    pub fn k_txin(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_hmac, TAG_TXIN, index)
    }

    /// HMAC key for pseudo-out `i`.
    pub fn k_txin_comm(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_hmac, TAG_TXIN_COMM, index)
    }

    /// HMAC key for destination entry `j`.
    pub fn k_txdest(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_hmac, TAG_TXDEST, index)
    }

    /// HMAC key for `(dest_j ‖ vout_j)`.
    pub fn k_txout(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_hmac, TAG_TXOUT, index)
    }

    /// AEAD key sealing `alpha_i`.
    pub fn k_txin_alpha(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_enc, TAG_TXIN_ALPHA, index)
    }

    /// AEAD key sealing the multisig MLSAG `c_out` value.
    pub fn k_cout(&self, index: usize) -> [u8; 32] {
        subkey(&self.key_enc, TAG_COUT, index)
    }
}

fn tagged(parent: &[u8; 32], tag: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + tag.len());
    buf.extend_from_slice(parent);
    buf.extend_from_slice(tag);
    keccak_2hash(&buf)
}

fn subkey(parent: &[u8; 32], tag: &[u8], index: usize) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + tag.len() + 5);
    buf.extend_from_slice(parent);
    buf.extend_from_slice(tag);
    let mut w = Writer::new();
    w.write_varint(index as u64);
    buf.extend_from_slice(w.as_bytes());
    keccak_2hash(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn subkeys_differ_by_tag_and_index() {
        let mut rng = StdRng::from_seed([1u8; 32]);
        let schedule = KeySchedule::derive(b"tsx data", &Scalar::from(7u64), 1, &mut rng);
        assert_ne!(schedule.k_txin(0), schedule.k_txin_comm(0));
        assert_ne!(schedule.k_txin(0), schedule.k_txin(1));
    }

    #[test]
    fn derivation_is_deterministic_given_same_randomness_source() {
        struct FixedRng([u8; 32]);
        impl RngCore for FixedRng {
            fn next_u32(&mut self) -> u32 {
                rand_core::impls::next_u32_via_fill(self)
            }
            fn next_u64(&mut self) -> u64 {
                rand_core::impls::next_u64_via_fill(self)
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                for (i, byte) in dest.iter_mut().enumerate() {
                    *byte = self.0[i % 32];
                }
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
                self.fill_bytes(dest);
                Ok(())
            }
        }
        impl CryptoRng for FixedRng {}

        let a = KeySchedule::derive(b"same", &Scalar::from(1u64), 2, &mut FixedRng([9u8; 32]));
        let b = KeySchedule::derive(b"same", &Scalar::from(1u64), 2, &mut FixedRng([9u8; 32]));
        assert_eq!(a.k_txin(3), b.k_txin(3));
    }
}
