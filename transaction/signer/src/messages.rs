// Copyright (c) 2018-2022 The Botho Foundation

//! The host ↔ device wire envelope (`spec.md` §6): one `SignTxRequest`
//! carries exactly one of the nine stage sub-messages; one
//! `SignTxResponse` carries the matching reply, or a distinguished
//! error.

use alloc::vec::Vec;

use bth_transaction_core::{TsxData, TxDestinationEntry, TxSourceEntry};

use crate::error::SignError;

/// One request to the signing engine. Exactly one variant is valid from
/// any given session stage; see `state::SigningState::handle`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignTxRequest {
    /// Start a session (§4.5.1).
    Init(TsxData),
    /// Present one input, first presentation (§4.5.2).
    SetInput(TxSourceEntry),
    /// Apply the host's key-image sort permutation (§4.5.3).
    InputsPermutation(Vec<usize>),
    /// Re-present one input in permuted order (§4.5.4).
    InputVinI {
        /// The input being re-presented.
        source: TxSourceEntry,
        /// The device-emitted `vin_i` bytes, unchanged.
        vin_bytes: Vec<u8>,
        /// The HMAC the device computed when it first emitted `vin_i`.
        hmac_vin: [u8; 32],
        /// The device-emitted pseudo-out, unchanged (Simple RCT only).
        pseudo_out: Option<[u8; 32]>,
        /// The HMAC over `pseudo_out` (Simple RCT only).
        pseudo_out_hmac: Option<[u8; 32]>,
    },
    /// Present one destination (§4.5.5).
    SetOutput {
        /// The destination entry.
        destination: TxDestinationEntry,
        /// The HMAC the device emitted for this destination at `Init`.
        hmac_dest: [u8; 32],
    },
    /// All destinations presented (§4.5.6).
    AllOutputsSet,
    /// MLSAG message finalized (§4.5.7).
    MlsagDone,
    /// Sign one input, in permuted order (§4.5.8).
    SignInput {
        /// The input being signed.
        source: TxSourceEntry,
        /// The device-emitted `vin_i` bytes, unchanged.
        vin_bytes: Vec<u8>,
        /// The HMAC over `vin_bytes`.
        hmac_vin: [u8; 32],
        /// The device-emitted pseudo-out (Simple RCT only).
        pseudo_out: Option<[u8; 32]>,
        /// The HMAC over `pseudo_out` (Simple RCT only).
        pseudo_out_hmac: Option<[u8; 32]>,
        /// The AEAD-sealed `alpha_i` blob the device emitted at
        /// `SetInput`.
        alpha_enc: Vec<u8>,
    },
    /// Finalize the session (§4.5.9).
    Final,
}

/// The engine's response to a [`SignTxRequest`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignTxResponse {
    /// Reply to `Init`: per-output HMACs pinning each destination entry,
    /// in declared order.
    InitAck {
        /// `HMAC(K_txdest(j), serialize(TxDestinationEntry_j))` for
        /// every declared output.
        dest_hmacs: Vec<[u8; 32]>,
    },
    /// Reply to `SetInput`.
    SetInputAck {
        /// The canonical `vin_i` bytes.
        vin_bytes: Vec<u8>,
        /// `HMAC(K_txin(i), …)`.
        hmac_vin: [u8; 32],
        /// The pseudo-out commitment (Simple RCT only).
        pseudo_out: Option<[u8; 32]>,
        /// `HMAC(K_txin-comm(i), pseudo_out)` (Simple RCT only).
        pseudo_out_hmac: Option<[u8; 32]>,
        /// AEAD-sealed `alpha_i` (Simple RCT only).
        alpha_enc: Option<Vec<u8>>,
    },
    /// Reply to `InputsPermutation`: nothing to report, stage advanced.
    InputsPermutationAck,
    /// Reply to `InputVinI`.
    InputVinIAck,
    /// Reply to `SetOutput`.
    SetOutputAck {
        /// The canonical `tx_out_j` bytes.
        tx_out_bytes: Vec<u8>,
        /// `HMAC(K_txout(j), …)`.
        hmac_vout: [u8; 32],
        /// The Borromean range-proof bytes.
        rsig_bytes: Vec<u8>,
        /// `(stealth_pub, commitment)`, serialized.
        out_pk_bytes: Vec<u8>,
        /// The 8-byte masked-amount ECDH blob.
        ecdh_bytes: [u8; 8],
    },
    /// Reply to `AllOutputsSet`.
    AllOutputsSetAck {
        /// The finalized `extra` bytes.
        extra_bytes: Vec<u8>,
        /// `tx_prefix_hash`.
        tx_prefix_hash: [u8; 32],
        /// The RCT signature base header byte (`RctType::wire_byte`).
        rct_sig_base_header: u8,
    },
    /// Reply to `MlsagDone`: the finalized RingCT signing digest.
    MlsagDoneAck {
        /// The "full message" every MLSAG proves against.
        full_message: [u8; 32],
    },
    /// Reply to `SignInput`.
    SignInputAck {
        /// The canonically encoded `MgSig`.
        signature_bytes: Vec<u8>,
        /// AEAD-sealed multisig `c_out`, if this is a multisig session.
        cout_encrypted: Option<Vec<u8>>,
    },
    /// Reply to `Final`.
    FinalAck {
        /// AEAD-sealed multisig `c_out` key, if applicable.
        cout_key: Option<Vec<u8>>,
        /// Fresh salt disclosed so the host can later recompute
        /// `tx_key` together with the spend secret.
        salt: [u8; 32],
        /// Fresh randomizer disclosed alongside `salt`.
        rand_mult: [u8; 32],
        /// `enc(r) ‖ enc(additional_tx_private_keys)`, sealed under
        /// `tx_key`.
        tx_enc_keys: Vec<u8>,
    },
    /// A fatal error. The session is already purged by the time this is
    /// returned.
    Error {
        /// Distinguished status for prefix-hash mismatches, so a
        /// multisig flow can recover by restarting with consistent
        /// data. `None` for every other error kind.
        status: Option<u32>,
        /// A human-readable description of `error`.
        description: alloc::string::String,
    },
}

impl From<SignError> for SignTxResponse {
    fn from(error: SignError) -> Self {
        let status = matches!(error, SignError::PrefixHashMismatch).then_some(10);
        SignTxResponse::Error {
            status,
            description: alloc::format!("{error}"),
        }
    }
}

/// One `TransferDetails`-shaped record the host streams to the
/// key-image sync engine (`spec.md` §4.6).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyImageSyncRequest {
    /// The output's one-time destination key.
    pub out_key: bth_crypto_keys::Point,
    /// The transaction public key it was created under.
    pub tx_pub_key: bth_crypto_keys::Point,
    /// Additional per-destination transaction public keys, if any.
    pub additional_tx_pub_keys: Vec<bth_crypto_keys::Point>,
    /// The output's position within its transaction's output list.
    pub internal_output_index: u64,
}

/// The key-image sync engine's per-record response.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyImageSyncResponse {
    /// The output's key image.
    pub key_image: bth_crypto_ring_signature::KeyImage,
    /// A proof of knowledge of the discrete log of `key_image` with
    /// respect to `H_p(out_key)`.
    pub signature: crate::key_image_sync::KeyImageProof,
}
