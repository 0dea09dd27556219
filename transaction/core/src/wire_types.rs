// Copyright (c) 2018-2022 The Botho Foundation

//! Wire-level Monero structures: transaction inputs/outputs, the
//! `extra` TLV blob, and the request-intent types the host streams in
//! (`TsxData`, `TxSourceEntry`, `TxDestinationEntry`).

use alloc::vec::Vec;

use bth_account_keys::PublicAddress;
use bth_crypto_keys::{Point, Scalar};
use bth_crypto_ring_signature::KeyImage;

use crate::serializer::Writer;

/// Which RingCT signature scheme a transaction uses. Only `Full` and
/// `Simple` are implemented; the Bulletproof variants are recognized on
/// the wire but rejected (no Bulletproof range-proof engine exists
/// here).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RctType {
    /// Borromean range proofs, MLSAG-full.
    Full,
    /// Borromean range proofs, MLSAG-simple (pseudo-outs per input).
    Simple,
    /// Bulletproof range proofs, MLSAG-full. Recognized, not implemented.
    FullBulletproof,
    /// Bulletproof range proofs, MLSAG-simple. Recognized, not implemented.
    SimpleBulletproof,
}

impl RctType {
    /// The single type byte this RCT type serializes as.
    pub fn wire_byte(self) -> u8 {
        match self {
            RctType::Full => 1,
            RctType::Simple => 2,
            RctType::FullBulletproof => 3,
            RctType::SimpleBulletproof => 4,
        }
    }

    /// Whether this type uses per-input pseudo-outs (Simple RCT).
    pub fn is_simple(self) -> bool {
        matches!(self, RctType::Simple | RctType::SimpleBulletproof)
    }

    /// Whether this type's range proofs are Borromean (the only kind
    /// this engine can actually produce).
    pub fn is_borromean(self) -> bool {
        matches!(self, RctType::Full | RctType::Simple)
    }
}

/// The variant code `TxinToKey` serializes under in a `TxInV` union.
pub const TXIN_TO_KEY_VARIANT_CODE: u8 = 0x02;

/// The variant code `TxoutToKey` serializes under in a `TxOutTarget`
/// union.
pub const TXOUT_TO_KEY_VARIANT_CODE: u8 = 0x02;

/// One transaction input: an amount (always `0` post-RingCT), the ring's
/// global output indices (delta-encoded), and this input's key image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxinToKey {
    /// Cleartext amount; always `0` in a RingCT transaction.
    pub amount: u64,
    /// Relative (delta-encoded) global output indices making up the
    /// ring, ascending order in the underlying globals.
    pub key_offsets: Vec<u64>,
    /// This input's key image.
    pub key_image: KeyImage,
}

impl TxinToKey {
    /// Delta-encode a strictly ascending list of global output indices,
    /// `Δ_0 = g_0, Δ_k = g_k − g_{k-1}`.
    pub fn delta_encode_offsets(globals: &[u64]) -> Vec<u64> {
        let mut out = Vec::with_capacity(globals.len());
        let mut prev = 0u64;
        for &g in globals {
            out.push(g - prev);
            prev = g;
        }
        out
    }

    /// Absorb this input into `writer` as a tagged `TxInV` variant:
    /// `0x02 ‖ varint amount ‖ varint len ‖ varint offsets[…] ‖ 32-byte
    /// key image`.
    pub fn write_tagged(&self, writer: &mut Writer) {
        writer.write_u8(TXIN_TO_KEY_VARIANT_CODE);
        writer.write_varint(self.amount);
        writer.write_container_len(self.key_offsets.len());
        for offset in &self.key_offsets {
            writer.write_varint(*offset);
        }
        writer.write_bytes32(&self.key_image.to_bytes());
    }
}

/// One transaction output: an amount (always `0` post-RingCT) and the
/// one-time destination public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxoutToKey {
    /// Cleartext amount; always `0` in a RingCT transaction.
    pub amount: u64,
    /// The one-time destination key, `P = H_s(r·A, i)·G + B`.
    pub target_key: Point,
}

impl TxoutToKey {
    /// Absorb this output into `writer`: `varint amount ‖ variant(0x02)
    /// TxoutToKey{32-byte key}`.
    pub fn write_tagged(&self, writer: &mut Writer) {
        writer.write_varint(self.amount);
        writer.write_u8(TXOUT_TO_KEY_VARIANT_CODE);
        writer.write_bytes32(&self.target_key.to_bytes());
    }
}

/// TLV tags used in the `extra` field.
pub mod extra_tag {
    /// Transaction public key `R`.
    pub const TX_PUBLIC_KEY: u8 = 0x01;
    /// Encrypted payment ID / arbitrary nonce.
    pub const NONCE: u8 = 0x02;
    /// Additional per-output transaction public keys (subaddress
    /// destinations each need their own `R_i`).
    pub const ADDITIONAL_PUBLIC_KEYS: u8 = 0x04;
    /// Padding, ignored by parsers.
    pub const PADDING: u8 = 0x00;
}

/// The `extra` field: a TLV blob carrying the transaction public key and
/// any additional per-destination public keys.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtraField {
    /// The transaction public key `R`.
    pub tx_public_key: Option<Point>,
    /// One additional public key per subaddress destination, in output
    /// order.
    pub additional_public_keys: Vec<Point>,
    /// An opaque nonce blob (e.g. an encrypted payment ID), if present.
    pub nonce: Option<Vec<u8>>,
}

impl ExtraField {
    /// Serialize to the raw `extra` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        if let Some(r) = self.tx_public_key {
            writer.write_u8(extra_tag::TX_PUBLIC_KEY);
            writer.write_bytes32(&r.to_bytes());
        }
        if !self.additional_public_keys.is_empty() {
            writer.write_u8(extra_tag::ADDITIONAL_PUBLIC_KEYS);
            writer.write_container_len(self.additional_public_keys.len());
            for key in &self.additional_public_keys {
                writer.write_bytes32(&key.to_bytes());
            }
        }
        if let Some(nonce) = &self.nonce {
            writer.write_u8(extra_tag::NONCE);
            writer.write_blob(nonce);
        }
        writer.into_bytes()
    }
}

/// One destination the host wants funds sent to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxDestinationEntry {
    /// The amount this destination receives.
    pub amount: u64,
    /// The destination's public address.
    pub address: DestinationAddress,
    /// Whether `address` is a subaddress (changes stealth-key
    /// derivation).
    pub is_subaddress: bool,
}

/// The two public keys of a destination address, kept flat here so this
/// crate isn't forced to depend on `bth-account-keys`'s full
/// `PublicAddress` API surface for a two-field read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DestinationAddress {
    /// The destination's public spend key.
    pub spend_public: Point,
    /// The destination's public view key.
    pub view_public: Point,
}

impl From<&PublicAddress> for DestinationAddress {
    fn from(addr: &PublicAddress) -> Self {
        DestinationAddress {
            spend_public: addr.spend_public_key(),
            view_public: addr.view_public_key(),
        }
    }
}

/// One ring member: its global output index and the `(dest_pub,
/// mask_commit)` pair recorded on-chain for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RingMember {
    /// The output's position in the global output index.
    pub global_index: u64,
    /// The output's one-time destination key.
    pub dest_pub: Point,
    /// The output's Pedersen commitment.
    pub mask_commitment: Point,
}

/// One input the host wants the device to sign: the ring (decoys plus
/// the real output), and everything needed to recompute the real
/// output's one-time spend key.
#[derive(Clone, Debug)]
pub struct TxSourceEntry {
    /// The ring: decoys plus the real output, in ascending global-index
    /// order.
    pub outputs: Vec<RingMember>,
    /// Index into `outputs` of the real (spendable) output.
    pub real_output: usize,
    /// The transaction public key `R` the real output was created under.
    pub real_out_tx_key: Point,
    /// Additional per-destination transaction public keys, if the real
    /// output was sent to a subaddress.
    pub real_out_additional_tx_keys: Vec<Point>,
    /// The real output's position within its transaction's output list.
    pub real_output_in_tx_index: usize,
    /// The amount being spent.
    pub amount: u64,
    /// Whether this source is RingCT (always true in this engine).
    pub rct: bool,
    /// The real output's original Pedersen mask, known to the spender.
    pub mask: Scalar,
}

/// The request intent the host sends at `Init`: everything needed to
/// drive the rest of the signing session.
#[derive(Clone, Debug)]
pub struct TsxData {
    /// Declared number of inputs; bounds `inp_idx`.
    pub num_inputs: usize,
    /// Ring size minus one (decoys per input).
    pub mixin: usize,
    /// The transaction fee.
    pub fee: u64,
    /// The transaction's unlock time.
    pub unlock_time: u64,
    /// Whether this is a multisig co-signing session.
    pub is_multisig: bool,
    /// Declared outputs; bounds `out_idx`.
    pub outputs: Vec<TxDestinationEntry>,
    /// The change output, if any.
    pub change_dts: Option<TxDestinationEntry>,
    /// An optional short payment ID.
    pub payment_id: Option<Vec<u8>>,
    /// The spending account index, if not the default account.
    pub account: Option<u32>,
    /// Minor (subaddress) indices in scope for this session.
    pub minor_indices: Vec<u32>,
    /// The pinned `tx_prefix_hash`, if the host already knows it
    /// (multisig co-signing restart path).
    pub exp_tx_prefix_hash: Option<[u8; 32]>,
    /// Externally supplied `r` scalars, for multisig sessions that must
    /// share a transaction key across co-signers.
    pub use_tx_keys: Vec<Scalar>,
}
