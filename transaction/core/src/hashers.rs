// Copyright (c) 2018-2022 The Botho Foundation

//! The two incremental Keccak hashers the signing state machine drives
//! stage by stage: [`TxPrefixHasher`] (the transaction-prefix hash) and
//! [`PreMlsagHasher`] (the RingCT "full message" every MLSAG signs).

use bth_crypto_keys::{keccak256, Point};

use crate::serializer::Writer;
use crate::wire_types::{ExtraField, RctType, TxinToKey, TxoutToKey};

/// Absorbs `version`, `unlock_time`, each `vin_i`, each `tx_out_i`, and
/// `extra`, in that order, to produce `tx_prefix_hash`.
///
/// Built as a single growing buffer rather than a true streaming Keccak
/// sponge: the prefix is always small enough to hold in full, and doing
/// so keeps the absorb order trivially auditable against `spec.md` §4.3.
#[derive(Clone, Debug, Default)]
pub struct TxPrefixHasher {
    writer: Writer,
    vin_written: usize,
    vout_written: usize,
    expected_vin: usize,
    expected_vout: usize,
    header_done: bool,
}

impl TxPrefixHasher {
    /// A fresh hasher for a transaction with `num_inputs` inputs and
    /// `num_outputs` outputs.
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        TxPrefixHasher {
            writer: Writer::new(),
            vin_written: 0,
            vout_written: 0,
            expected_vin: num_inputs,
            expected_vout: num_outputs,
            header_done: false,
        }
    }

    /// Absorb `version` and `unlock_time`, then the vin varint count.
    /// Must be called exactly once, before the first `absorb_vin`.
    pub fn set_header(&mut self, version: u64, unlock_time: u64) {
        debug_assert!(!self.header_done, "set_header called twice");
        self.writer.write_varint(version);
        self.writer.write_varint(unlock_time);
        self.writer.write_container_len(self.expected_vin);
        self.header_done = true;
    }

    /// Absorb one `vin_i` as it arrives from the host (`InputVinI`).
    pub fn absorb_vin(&mut self, vin: &TxinToKey) {
        debug_assert!(
            self.vin_written < self.expected_vin,
            "more vins absorbed than declared"
        );
        vin.write_tagged(&mut self.writer);
        self.vin_written += 1;
        if self.vin_written == self.expected_vin {
            self.writer.write_container_len(self.expected_vout);
        }
    }

    /// Absorb one `tx_out_i` as it arrives from the host (`SetOutput`).
    pub fn absorb_vout(&mut self, vout: &TxoutToKey) {
        debug_assert!(
            self.vout_written < self.expected_vout,
            "more vouts absorbed than declared"
        );
        vout.write_tagged(&mut self.writer);
        self.vout_written += 1;
    }

    /// Finalize: absorb `extra` and return `tx_prefix_hash`.
    pub fn finalize(mut self, extra: &ExtraField) -> [u8; 32] {
        self.writer.write_blob(&extra.to_bytes());
        keccak256(self.writer.as_bytes())
    }
}

/// The five ordered sub-states of the RingCT "full message" hasher: type
/// + fee, per-input pseudo-outs (Simple RCT only), the transaction
/// prefix hash, per-output ECDH info, per-output commitments.
#[derive(Clone, Debug)]
pub struct PreMlsagHasher {
    writer: Writer,
    use_simple: bool,
    stage: PreMlsagStage,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PreMlsagStage {
    TypeFee,
    PseudoOuts,
    Message,
    Ecdh,
    OutPk,
    Done,
}

impl PreMlsagHasher {
    /// `init(use_simple)`: a fresh hasher, recording whether pseudo-outs
    /// are expected.
    pub fn init(use_simple: bool) -> Self {
        PreMlsagHasher {
            writer: Writer::new(),
            use_simple,
            stage: PreMlsagStage::TypeFee,
        }
    }

    /// `set_type_fee`: absorbs the RCT type byte and the varint fee.
    pub fn set_type_fee(&mut self, rct_type: RctType, fee: u64) {
        assert_eq!(self.stage, PreMlsagStage::TypeFee, "out-of-order hasher call");
        self.writer.write_u8(rct_type.wire_byte());
        self.writer.write_varint(fee);
        self.stage = if self.use_simple {
            PreMlsagStage::PseudoOuts
        } else {
            PreMlsagStage::Message
        };
    }

    /// `set_pseudo_out`: Simple RCT only, absorbs one input's pseudo-out
    /// commitment.
    pub fn set_pseudo_out(&mut self, pseudo_out: Point) {
        assert_eq!(
            self.stage,
            PreMlsagStage::PseudoOuts,
            "out-of-order hasher call, or not a Simple RCT session"
        );
        self.writer.write_bytes32(&pseudo_out.to_bytes());
    }

    /// Advance past the pseudo-out stage once every input has been
    /// absorbed.
    pub fn pseudo_outs_done(&mut self) {
        assert_eq!(self.stage, PreMlsagStage::PseudoOuts, "out-of-order hasher call");
        self.stage = PreMlsagStage::Message;
    }

    /// `set_message`: absorbs `tx_prefix_hash`.
    pub fn set_message(&mut self, tx_prefix_hash: &[u8; 32]) {
        assert_eq!(self.stage, PreMlsagStage::Message, "out-of-order hasher call");
        self.writer.write_bytes32(tx_prefix_hash);
        self.stage = PreMlsagStage::Ecdh;
    }

    /// `set_ecdh`: absorbs one output's ECDH info (the masked amount
    /// key exchange blob).
    pub fn set_ecdh(&mut self, ecdh_info: &[u8; 8]) {
        assert_eq!(self.stage, PreMlsagStage::Ecdh, "out-of-order hasher call");
        self.writer.write_fixed_blob(ecdh_info);
    }

    /// Advance past the ECDH stage once every output's info has been
    /// absorbed.
    pub fn ecdh_done(&mut self) {
        assert_eq!(self.stage, PreMlsagStage::Ecdh, "out-of-order hasher call");
        self.stage = PreMlsagStage::OutPk;
    }

    /// `set_out_pk`: absorbs one output's commitment.
    pub fn set_out_pk(&mut self, out_pk: Point) {
        assert_eq!(self.stage, PreMlsagStage::OutPk, "out-of-order hasher call");
        self.writer.write_bytes32(&out_pk.to_bytes());
    }

    /// `rctsig_base_done`: snapshot the digest. May be called
    /// repeatedly (e.g. once per input's `SignInput`); the hasher is not
    /// consumed.
    pub fn get_digest(&self) -> [u8; 32] {
        keccak256(self.writer.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_crypto_keys::G;

    fn sample_vin() -> TxinToKey {
        TxinToKey {
            amount: 0,
            key_offsets: alloc::vec![5, 4],
            key_image: bth_crypto_ring_signature::KeyImage::from_bytes(&G.to_bytes()).unwrap(),
        }
    }

    fn sample_vout() -> TxoutToKey {
        TxoutToKey {
            amount: 0,
            target_key: G,
        }
    }

    #[test]
    fn tx_prefix_hasher_is_deterministic() {
        let build = || {
            let mut h = TxPrefixHasher::new(1, 1);
            h.set_header(2, 0);
            h.absorb_vin(&sample_vin());
            h.absorb_vout(&sample_vout());
            h.finalize(&ExtraField {
                tx_public_key: Some(G),
                ..Default::default()
            })
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn tx_prefix_hasher_differs_on_unlock_time() {
        let run = |unlock_time| {
            let mut h = TxPrefixHasher::new(1, 1);
            h.set_header(2, unlock_time);
            h.absorb_vin(&sample_vin());
            h.absorb_vout(&sample_vout());
            h.finalize(&ExtraField::default())
        };
        assert_ne!(run(0), run(10));
    }

    #[test]
    fn pre_mlsag_hasher_simple_round_trip() {
        let mut h = PreMlsagHasher::init(true);
        h.set_type_fee(RctType::Simple, 5_000);
        h.set_pseudo_out(G);
        h.pseudo_outs_done();
        h.set_message(&[1u8; 32]);
        h.set_ecdh(&[0u8; 8]);
        h.ecdh_done();
        h.set_out_pk(G);
        let digest = h.get_digest();
        assert_eq!(digest, h.get_digest());
    }

    #[test]
    fn pre_mlsag_hasher_full_skips_pseudo_outs() {
        let mut h = PreMlsagHasher::init(false);
        h.set_type_fee(RctType::Full, 5_000);
        h.set_message(&[2u8; 32]);
        h.set_ecdh(&[0u8; 8]);
        h.ecdh_done();
        h.set_out_pk(G);
        let _ = h.get_digest();
    }

    #[test]
    #[should_panic(expected = "out-of-order")]
    fn pre_mlsag_hasher_rejects_out_of_order_calls() {
        let mut h = PreMlsagHasher::init(true);
        h.set_message(&[0u8; 32]);
    }
}
