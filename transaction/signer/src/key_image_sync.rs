// Copyright (c) 2018-2022 The Botho Foundation

//! Key-image export (`spec.md` §4.6). For each previously received
//! output the host names, the device re-derives the spend secret,
//! computes the key image, and proves knowledge of its discrete log
//! relative to `H_p(out_key)` without revealing the secret itself.
//!
//! Grounded on the Trezor firmware's `xmr/key_image.py` export flow: a
//! session hash ties every `(ki, sig)` reply to the record it answers,
//! the same role `compute_hash` plays there.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use bth_account_keys::{Credentials, SubaddressIndex};
use bth_crypto_keys::{keccak256, Point, Scalar, G};
use bth_crypto_ring_signature::KeyImage;
use bth_transaction_core::Writer;
use rand_core::{CryptoRng, RngCore};

use crate::error::SignError;
use crate::messages::{KeyImageSyncRequest, KeyImageSyncResponse};
use crate::stealth::{derivation, derivation_to_scalar, recover_onetime_private_key};

/// A Schnorr-style proof of knowledge of the discrete log of a key image
/// relative to `H_p(out_key)`, i.e. of the spend secret `x` such that
/// `key_image = x · H_p(out_key)` and `x · G` is the output's one-time
/// public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyImageProof {
    /// `c = H_s(out_key ‖ L ‖ R)`.
    pub c: Scalar,
    /// `r = alpha - c·x`.
    pub r: Scalar,
}

fn hash_to_scalar(data: &[u8]) -> Scalar {
    Scalar::from_hash_bytes(&keccak256(data))
}

fn prove_key_image<R: RngCore + CryptoRng>(
    out_key: Point,
    x: Scalar,
    key_image: KeyImage,
    rng: &mut R,
) -> KeyImageProof {
    let h_p = out_key.hash_to_point();
    let alpha = Scalar::random(rng);
    let l = alpha * G;
    let r_point = alpha * h_p;

    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(&out_key.to_bytes());
    buf.extend_from_slice(&l.to_bytes());
    buf.extend_from_slice(&r_point.to_bytes());
    let c = hash_to_scalar(&buf);
    let r = alpha - (c * x);
    KeyImageProof { c, r }
}

/// Verify a [`KeyImageProof`] against the claimed `out_key` and
/// `key_image`.
pub fn verify_key_image_proof(
    out_key: Point,
    key_image: KeyImage,
    proof: &KeyImageProof,
) -> bool {
    let h_p = out_key.hash_to_point();
    let l = (proof.r * G) + (proof.c * out_key);
    let r_point = (proof.r * h_p) + (proof.c * key_image.as_point());

    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(&out_key.to_bytes());
    buf.extend_from_slice(&l.to_bytes());
    buf.extend_from_slice(&r_point.to_bytes());
    hash_to_scalar(&buf) == proof.c
}

/// A key-image export session: the user confirms once, then every
/// subsequent record is answered without further interaction.
pub struct KiSync<'a> {
    credentials: &'a Credentials,
    subaddresses: &'a BTreeMap<[u8; 32], SubaddressIndex>,
    session_hash: [u8; 32],
}

impl<'a> KiSync<'a> {
    /// Start a session. `confirmed` stands in for the external
    /// user-interaction collaborator (`spec.md` §1): the caller has
    /// already obtained the user's go-ahead.
    pub fn start(
        credentials: &'a Credentials,
        subaddresses: &'a BTreeMap<[u8; 32], SubaddressIndex>,
        confirmed: bool,
    ) -> Result<Self, SignError> {
        if !confirmed {
            return Err(SignError::UserRejected);
        }
        Ok(KiSync {
            credentials,
            subaddresses,
            session_hash: [0u8; 32],
        })
    }

    /// Answer one record: derive its key image and proof, and fold its
    /// session hash into the running session digest.
    pub fn export<R: RngCore + CryptoRng>(
        &mut self,
        record: &KeyImageSyncRequest,
        rng: &mut R,
    ) -> Result<KeyImageSyncResponse, SignError> {
        let record_hash = compute_record_hash(record);
        let mut chained = Vec::with_capacity(64);
        chained.extend_from_slice(&self.session_hash);
        chained.extend_from_slice(&record_hash);
        self.session_hash = keccak256(&chained);

        let (x, key_image) = recover_spend_secret(
            self.credentials,
            self.subaddresses,
            record.out_key,
            record.tx_pub_key,
            &record.additional_tx_pub_keys,
            record.internal_output_index,
        )?;

        let signature = prove_key_image(record.out_key, x, key_image, rng);
        Ok(KeyImageSyncResponse {
            key_image,
            signature,
        })
    }

    /// The running Keccak over every record's hash seen so far, tying
    /// every reply to the inputs it answered.
    pub fn session_hash(&self) -> [u8; 32] {
        self.session_hash
    }
}

fn compute_record_hash(record: &KeyImageSyncRequest) -> [u8; 32] {
    let mut buf = Vec::new();
    buf.extend_from_slice(&record.out_key.to_bytes());
    buf.extend_from_slice(&record.tx_pub_key.to_bytes());
    for key in &record.additional_tx_pub_keys {
        buf.extend_from_slice(&key.to_bytes());
    }
    let mut w = Writer::new();
    w.write_varint(record.internal_output_index);
    buf.extend_from_slice(w.as_bytes());
    keccak256(&buf)
}

/// Shared by `SetInput` (`spec.md` §4.5.2) and key-image export (§4.6):
/// recover the one-time spend secret and key image of an output this
/// device's credentials own, trying the primary derivation and then
/// each additional transaction public key in turn.
pub fn recover_spend_secret(
    credentials: &Credentials,
    subaddresses: &BTreeMap<[u8; 32], SubaddressIndex>,
    dest_pub: Point,
    tx_pub: Point,
    additional_tx_pubs: &[Point],
    output_index: u64,
) -> Result<(Scalar, KeyImage), SignError> {
    let try_pub = |candidate_tx_pub: Point| -> Option<(Scalar, SubaddressIndex)> {
        let d = derivation(*credentials.view_secret(), candidate_tx_pub);
        let scalar = derivation_to_scalar(d, output_index);
        let candidate_spend = dest_pub - (scalar * G);
        subaddresses
            .get(&candidate_spend.to_bytes())
            .map(|idx| (scalar, *idx))
    };

    let found = try_pub(tx_pub).or_else(|| {
        additional_tx_pubs
            .get(output_index as usize)
            .copied()
            .and_then(try_pub)
    });

    let (scalar, index) = found.ok_or(SignError::UnknownDestination)?;

    let subaddress_secret = if index.is_primary() {
        *credentials.spend_secret()
    } else {
        *credentials.spend_secret() + bth_account_keys::subaddress_scalar(credentials.view_secret(), &index)
    };

    let x = recover_onetime_private_key(scalar, subaddress_secret);
    if x * G != dest_pub {
        return Err(SignError::OnetimeKeyMismatch);
    }
    let key_image = KeyImage::from_spend_secret(&x);
    Ok((x, key_image))
}
