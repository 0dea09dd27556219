// Copyright (c) 2018-2022 The Botho Foundation

//! The nine-stage transaction signing state machine (`spec.md` §4.5).
//! One [`SigningState`] drives exactly one transaction from `Init`
//! through `Final`; any fatal error is terminal, and re-entering a
//! completed stage is rejected.
//!
//! Grounded stage by stage on the Trezor firmware's
//! `TransactionSigningState`/`TProcessor` dispatch in `tsx_sign.py` and
//! `tsx_sign_builder.py`.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use bth_account_keys::{Credentials, SubaddressIndex, PRIMARY_ADDRESS_INDEX};
use bth_crypto_keys::{keccak256, Point, Scalar, G};
use bth_crypto_ring_signature::{gen_c, mlsag_sign, prove_range, sum_points, KeyImage, MlsagRing};
use bth_transaction_core::{
    DestinationAddress, ExtraField, PreMlsagHasher, RctType, TsxData, TxDestinationEntry,
    TxPrefixHasher, TxSourceEntry, TxinToKey, TxoutToKey, Writer,
};
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::SignerConfig;
use crate::error::SignError;
use crate::key_image_sync::recover_spend_secret;
use crate::key_schedule::KeySchedule;
use crate::messages::{SignTxRequest, SignTxResponse};
use crate::stealth::{derivation, derivation_to_scalar, encode_ecdh_amount, stealth_public_key};

/// Monero's domain-separating suffix byte for encrypted payment IDs
/// (`get_payment_id_key`'s `ENCRYPTED_PAYMENT_ID_TAIL`).
const ENCRYPTED_PAYMENT_ID_TAIL: u8 = 0x8d;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    Start,
    InputsLoading,
    InputsDone,
    InputsVinIHashed,
    OutputsLoading,
    OutputsDone,
    MlsagDone,
    Signing,
    Final,
    Terminal,
}

/// Per-input state carried from `SetInput` (first presentation) through
/// `SignInput`, re-indexed by the host's key-image sort permutation at
/// `InputsPermutation`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct InputSecret {
    x: Scalar,
    #[zeroize(skip)]
    key_image: KeyImage,
    mask: Scalar,
    #[zeroize(skip)]
    amount: u64,
}

/// Per-output secret recorded at `SetOutput`, needed to build Full RCT's
/// mix-ring columns at `SignInput` (single-input sessions only).
#[derive(Clone, Copy, Zeroize, ZeroizeOnDrop)]
struct OutputSecret {
    mask: Scalar,
    #[zeroize(skip)]
    stealth_pub: Point,
    #[zeroize(skip)]
    commitment: Point,
    #[zeroize(skip)]
    ecdh: [u8; 8],
}

/// The live transaction-signing session. Owns every per-transaction
/// secret; dropped (and zeroized) on completion or fatal error.
pub struct SigningState<'a> {
    config: SignerConfig,
    credentials: &'a Credentials,
    stage: Stage,

    num_inputs: usize,
    num_outputs: usize,
    fee: u64,
    unlock_time: u64,
    use_simple_rct: bool,
    need_additional_txkeys: bool,
    change_address: Option<DestinationAddress>,
    exp_tx_prefix_hash: Option<[u8; 32]>,

    r: Scalar,
    tx_public_key: Point,
    additional_tx_private_keys: Vec<Option<Scalar>>,
    additional_tx_public_keys: Vec<Point>,
    payment_id_nonce: Option<Vec<u8>>,

    schedule: KeySchedule,
    subaddresses: BTreeMap<[u8; 32], SubaddressIndex>,

    prefix_hasher: TxPrefixHasher,
    mlsag_hasher: PreMlsagHasher,

    inp_idx: Option<usize>,
    out_idx: Option<usize>,
    input_secrets: Vec<InputSecret>,
    source_permutation: Option<Vec<usize>>,
    sum_pouts_alphas: Scalar,
    sum_input_amounts: u64,

    sum_out_masks: Scalar,
    sum_output_amounts: u64,
    output_secrets: Vec<OutputSecret>,

    extra: ExtraField,
    tx_prefix_hash: Option<[u8; 32]>,
    full_message: Option<[u8; 32]>,
}

impl<'a> SigningState<'a> {
    /// Start a fresh session. `confirmed` stands in for the external
    /// user-confirmation collaborator having already approved the
    /// transaction's declared destinations and fee.
    pub fn init<R: RngCore + CryptoRng>(
        config: SignerConfig,
        credentials: &'a Credentials,
        tsx_data: TsxData,
        confirmed: bool,
        tx_counter: u32,
        rng: &mut R,
    ) -> Result<(Self, SignTxResponse), SignError> {
        if !confirmed {
            return Err(SignError::UserRejected);
        }
        if tsx_data.num_inputs > config.max_inputs {
            return Err(SignError::IndexOutOfBounds {
                index: tsx_data.num_inputs,
                declared: config.max_inputs,
            });
        }
        if tsx_data.outputs.len() > config.max_outputs {
            return Err(SignError::IndexOutOfBounds {
                index: tsx_data.outputs.len(),
                declared: config.max_outputs,
            });
        }

        let change_address = tsx_data.change_dts.map(|d| d.address);
        if let Some(change) = change_address {
            if !tsx_data.outputs.iter().any(|o| o.address == change) {
                return Err(SignError::ChangeAddressNotFound);
            }
        }

        let use_simple_rct = tsx_data.num_inputs > 1;

        let (num_std, num_sub, single_sub_dest) = classify_destinations(&tsx_data.outputs, change_address);
        let need_additional_txkeys = num_sub > 0 && (num_std > 0 || num_sub > 1);

        let (r, additional_tx_private_keys) = if !tsx_data.use_tx_keys.is_empty() {
            let supplied = tsx_data.use_tx_keys.len() - 1;
            if need_additional_txkeys && supplied < tsx_data.outputs.len() {
                return Err(SignError::NotEnoughTxKeys(supplied, tsx_data.outputs.len()));
            }
            let r = tsx_data.use_tx_keys[0];
            let mut rest: Vec<Option<Scalar>> = tsx_data.use_tx_keys[1..]
                .iter()
                .map(|s| Some(*s))
                .collect();
            rest.resize(tsx_data.outputs.len(), None);
            (r, rest)
        } else {
            (Scalar::random(rng), vec![None; tsx_data.outputs.len()])
        };

        let tx_public_key = if num_std == 0 && num_sub == 1 {
            r * single_sub_dest.expect("single_sub_dest set when num_sub == 1").spend_public
        } else {
            r * G
        };

        let mut extra = ExtraField {
            tx_public_key: Some(tx_public_key),
            ..Default::default()
        };

        let payment_id_nonce = match &tsx_data.payment_id {
            None => None,
            Some(payment_id) => {
                let eligible: Vec<&TxDestinationEntry> = tsx_data
                    .outputs
                    .iter()
                    .filter(|d| Some(d.address) != change_address)
                    .collect();
                if eligible.len() != 1 {
                    return Err(SignError::AmbiguousPaymentIdDestination(eligible.len()));
                }
                Some(encrypt_payment_id(payment_id, eligible[0].address.view_public, r))
            }
        };
        if let Some(nonce) = &payment_id_nonce {
            extra.nonce = Some(nonce.clone());
        }

        let mut tsx_data_for_schedule = Writer::new();
        tsx_data_for_schedule.write_varint(tsx_data.num_inputs as u64);
        tsx_data_for_schedule.write_varint(tsx_data.fee);
        tsx_data_for_schedule.write_varint(tsx_data.unlock_time);
        for out in &tsx_data.outputs {
            tsx_data_for_schedule.write_varint(out.amount);
            tsx_data_for_schedule.write_bytes32(&out.address.spend_public.to_bytes());
            tsx_data_for_schedule.write_bytes32(&out.address.view_public.to_bytes());
        }
        let schedule = KeySchedule::derive(
            tsx_data_for_schedule.as_bytes(),
            &r,
            tx_counter,
            rng,
        );

        let mut prefix_hasher = TxPrefixHasher::new(tsx_data.num_inputs, tsx_data.outputs.len());
        prefix_hasher.set_header(2, tsx_data.unlock_time);

        let rct_type = if use_simple_rct {
            RctType::Simple
        } else {
            RctType::Full
        };
        let mut mlsag_hasher = PreMlsagHasher::init(use_simple_rct);
        mlsag_hasher.set_type_fee(rct_type, tsx_data.fee);

        let mut subaddresses = BTreeMap::new();
        subaddresses.insert(
            credentials.primary_address().spend_public_key().to_bytes(),
            PRIMARY_ADDRESS_INDEX,
        );
        if let Some(account) = tsx_data.account {
            for &minor in &tsx_data.minor_indices {
                let index = SubaddressIndex::new(account, minor);
                let sub = credentials
                    .primary_address()
                    .subaddress(credentials.view_secret(), &index);
                subaddresses.insert(sub.spend_public_key().to_bytes(), index);
            }
        }

        let dest_hmacs = tsx_data
            .outputs
            .iter()
            .enumerate()
            .map(|(idx, dest)| hmac_dest(&schedule, idx, dest))
            .collect();

        let state = SigningState {
            config,
            credentials,
            stage: Stage::InputsLoading,
            num_inputs: tsx_data.num_inputs,
            num_outputs: tsx_data.outputs.len(),
            fee: tsx_data.fee,
            unlock_time: tsx_data.unlock_time,
            use_simple_rct,
            need_additional_txkeys,
            change_address,
            exp_tx_prefix_hash: tsx_data.exp_tx_prefix_hash,
            r,
            tx_public_key,
            additional_tx_private_keys,
            additional_tx_public_keys: Vec::new(),
            payment_id_nonce,
            schedule,
            subaddresses,
            prefix_hasher,
            mlsag_hasher,
            inp_idx: None,
            out_idx: None,
            input_secrets: Vec::new(),
            source_permutation: None,
            sum_pouts_alphas: Scalar::zero(),
            sum_input_amounts: 0,
            sum_out_masks: Scalar::zero(),
            sum_output_amounts: 0,
            output_secrets: Vec::new(),
            extra,
            tx_prefix_hash: None,
            full_message: None,
        };

        log::debug!(
            "session initialized: {} inputs, {} outputs, simple_rct={}",
            state.num_inputs,
            state.num_outputs,
            state.use_simple_rct
        );
        Ok((state, SignTxResponse::InitAck { dest_hmacs }))
    }

    /// Dispatch one protocol message. Every variant is only valid from a
    /// specific `stage`; a mismatch is a fatal [`SignError::WrongStage`].
    pub fn handle<R: RngCore + CryptoRng>(
        &mut self,
        request: SignTxRequest,
        rng: &mut R,
    ) -> Result<SignTxResponse, SignError> {
        log::debug!("stage {:?}: handling {:?}", self.stage, request);
        match request {
            SignTxRequest::Init(_) => Err(SignError::WrongStage("Init")),
            SignTxRequest::SetInput(source) => self.set_input(source, rng),
            SignTxRequest::InputsPermutation(perm) => self.inputs_permutation(perm),
            SignTxRequest::InputVinI {
                source,
                vin_bytes,
                hmac_vin,
                pseudo_out,
                pseudo_out_hmac,
            } => self.input_vin_i(source, vin_bytes, hmac_vin, pseudo_out, pseudo_out_hmac),
            SignTxRequest::SetOutput {
                destination,
                hmac_dest,
            } => self.set_output(destination, hmac_dest, rng),
            SignTxRequest::AllOutputsSet => self.all_outputs_set(),
            SignTxRequest::MlsagDone => self.mlsag_done(),
            SignTxRequest::SignInput {
                source,
                vin_bytes,
                hmac_vin,
                pseudo_out,
                pseudo_out_hmac,
                alpha_enc,
            } => self.sign_input(source, vin_bytes, hmac_vin, pseudo_out, pseudo_out_hmac, alpha_enc, rng),
            SignTxRequest::Final => self.finalize(rng),
        }
    }

    /// Whether this session has reached a state the dispatcher should
    /// purge (terminal, whether by success or by error).
    pub fn is_terminal(&self) -> bool {
        self.stage == Stage::Terminal
    }

    fn fail(&mut self, error: SignError) -> Result<SignTxResponse, SignError> {
        log::warn!("stage {:?} failed, session terminated: {}", self.stage, error);
        self.stage = Stage::Terminal;
        Err(error)
    }

    fn set_input<R: RngCore + CryptoRng>(
        &mut self,
        source: TxSourceEntry,
        rng: &mut R,
    ) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::InputsLoading {
            return self.fail(SignError::WrongStage("SetInput"));
        }
        let inp_idx = self.inp_idx.map_or(0, |i| i + 1);
        if inp_idx >= self.num_inputs {
            return self.fail(SignError::IndexOutOfBounds {
                index: inp_idx,
                declared: self.num_inputs,
            });
        }
        if source.real_output >= source.outputs.len() {
            return self.fail(SignError::IndexOutOfBounds {
                index: source.real_output,
                declared: source.outputs.len(),
            });
        }

        let real = source.outputs[source.real_output];
        let (x, key_image) = match recover_spend_secret(
            self.credentials,
            &self.subaddresses,
            real.dest_pub,
            source.real_out_tx_key,
            &source.real_out_additional_tx_keys,
            source.real_output_in_tx_index as u64,
        ) {
            Ok(found) => found,
            Err(e) => return self.fail(e),
        };

        let global_indices: Vec<u64> = source.outputs.iter().map(|m| m.global_index).collect();
        let vin = TxinToKey {
            amount: 0,
            key_offsets: TxinToKey::delta_encode_offsets(&global_indices),
            key_image,
        };

        let mut vin_writer = Writer::new();
        vin.write_tagged(&mut vin_writer);
        let hmac_vin = hmac_txin(&self.schedule, inp_idx, &source, vin_writer.as_bytes());

        let amount = source.amount;
        self.sum_input_amounts += amount;

        let (pseudo_out, pseudo_out_hmac, alpha_enc) = if self.use_simple_rct {
            let alpha = Scalar::random(rng);
            self.sum_pouts_alphas = self.sum_pouts_alphas + alpha;
            let pseudo_out = gen_c(&alpha, amount);
            let pseudo_out_bytes = pseudo_out.to_bytes();
            let pseudo_out_hmac = bth_crypto_keys::compute_hmac(
                &self.schedule.k_txin_comm(inp_idx),
                &pseudo_out_bytes,
            );
            let alpha_enc = bth_crypto_keys::seal(&self.schedule.k_txin_alpha(inp_idx), &alpha.to_bytes(), rng);
            (Some(pseudo_out_bytes), Some(pseudo_out_hmac), Some(alpha_enc))
        } else {
            (None, None, None)
        };

        self.input_secrets.push(InputSecret {
            x,
            key_image,
            mask: source.mask,
            amount,
        });
        self.inp_idx = Some(inp_idx);
        if inp_idx + 1 == self.num_inputs {
            self.stage = Stage::InputsDone;
            self.subaddresses.clear();
        }

        Ok(SignTxResponse::SetInputAck {
            vin_bytes: vin_writer.into_bytes(),
            hmac_vin,
            pseudo_out,
            pseudo_out_hmac,
            alpha_enc,
        })
    }

    fn inputs_permutation(&mut self, perm: Vec<usize>) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::InputsDone {
            return self.fail(SignError::WrongStage("InputsPermutation"));
        }
        if perm.len() != self.num_inputs {
            return self.fail(SignError::IndexOutOfBounds {
                index: perm.len(),
                declared: self.num_inputs,
            });
        }
        let mut permuted = Vec::with_capacity(self.num_inputs);
        for &p in &perm {
            if p >= self.input_secrets.len() {
                return self.fail(SignError::IndexOutOfBounds {
                    index: p,
                    declared: self.input_secrets.len(),
                });
            }
            permuted.push(self.input_secrets[p].clone());
        }
        self.input_secrets = permuted;
        self.source_permutation = Some(perm);
        self.inp_idx = None;
        self.stage = Stage::InputsVinIHashed;
        Ok(SignTxResponse::InputsPermutationAck)
    }

    fn input_vin_i(
        &mut self,
        source: TxSourceEntry,
        vin_bytes: Vec<u8>,
        hmac_vin: [u8; 32],
        pseudo_out: Option<[u8; 32]>,
        pseudo_out_hmac: Option<[u8; 32]>,
    ) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::InputsVinIHashed && self.stage != Stage::InputsDone {
            return self.fail(SignError::WrongStage("InputVinI"));
        }
        let inp_idx = self.inp_idx.map_or(0, |i| i + 1);
        let perm = self
            .source_permutation
            .as_ref()
            .ok_or(SignError::WrongStage("InputVinI"))?;
        let original_index = perm[inp_idx];

        let expected_hmac = hmac_txin(&self.schedule, original_index, &source, &vin_bytes);
        if !bth_crypto_keys::ct_eq(&expected_hmac, &hmac_vin) {
            return self.fail(SignError::HmacMismatch);
        }
        self.prefix_hasher.absorb_vin(&decode_vin(&vin_bytes)?);

        if self.use_simple_rct {
            let pseudo_out = pseudo_out.ok_or(SignError::HmacMismatch)?;
            let pseudo_out_hmac = pseudo_out_hmac.ok_or(SignError::HmacMismatch)?;
            let expected = bth_crypto_keys::compute_hmac(
                &self.schedule.k_txin_comm(original_index),
                &pseudo_out,
            );
            if !bth_crypto_keys::ct_eq(&expected, &pseudo_out_hmac) {
                return self.fail(SignError::HmacMismatch);
            }
            let point = Point::from_bytes(&pseudo_out)?;
            self.mlsag_hasher.set_pseudo_out(point);
        }

        if inp_idx + 1 == self.num_inputs {
            if self.use_simple_rct {
                self.mlsag_hasher.pseudo_outs_done();
            }
            self.inp_idx = None;
            self.stage = Stage::OutputsLoading;
        } else {
            self.inp_idx = Some(inp_idx);
        }
        Ok(SignTxResponse::InputVinIAck)
    }

    fn set_output<R: RngCore + CryptoRng>(
        &mut self,
        destination: TxDestinationEntry,
        dest_hmac: [u8; 32],
        rng: &mut R,
    ) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::OutputsLoading && self.stage != Stage::InputsVinIHashed {
            return self.fail(SignError::WrongStage("SetOutput"));
        }
        let out_idx = self.out_idx.map_or(0, |i| i + 1);
        if out_idx >= self.num_outputs {
            return self.fail(SignError::IndexOutOfBounds {
                index: out_idx,
                declared: self.num_outputs,
            });
        }
        let expected = hmac_dest(&self.schedule, out_idx, &destination);
        if !bth_crypto_keys::ct_eq(&expected, &dest_hmac) {
            return self.fail(SignError::HmacMismatch);
        }

        let is_change = Some(destination.address) == self.change_address;
        let derivation_point = if self.need_additional_txkeys {
            let rp = self.additional_tx_private_keys[out_idx].unwrap_or_else(|| Scalar::random(rng));
            self.additional_tx_private_keys[out_idx] = Some(rp);
            let pub_rp = if destination.is_subaddress {
                rp * destination.address.spend_public
            } else {
                rp * G
            };
            self.additional_tx_public_keys.push(pub_rp);
            if is_change {
                derivation(self.r, destination.address.view_public)
            } else {
                derivation(rp, destination.address.view_public)
            }
        } else {
            derivation(self.r, destination.address.view_public)
        };

        let scalar = derivation_to_scalar(derivation_point, out_idx as u64);
        let stealth_pub = stealth_public_key(destination.address.spend_public, scalar);

        let tx_out = TxoutToKey {
            amount: 0,
            target_key: stealth_pub,
        };
        self.prefix_hasher.absorb_vout(&tx_out);

        let mut tx_out_writer = Writer::new();
        tx_out.write_tagged(&mut tx_out_writer);
        let hmac_vout = hmac_txout(&self.schedule, out_idx, &destination, tx_out_writer.as_bytes());

        let is_last = out_idx + 1 == self.num_outputs;
        let mask = if is_last {
            self.sum_pouts_alphas - self.sum_out_masks
        } else {
            Scalar::random(rng)
        };
        let (commitment_point, rsig) = prove_range(mask, destination.amount, rng);
        if commitment_point != gen_c(&mask, destination.amount) {
            return self.fail(SignError::CommitmentMismatch);
        }
        self.sum_out_masks = self.sum_out_masks + mask;
        self.sum_output_amounts += destination.amount;

        let mut rsig_writer = Writer::new();
        for s in &rsig.s0 {
            rsig_writer.write_bytes32(&s.to_bytes());
        }
        for s in &rsig.s1 {
            rsig_writer.write_bytes32(&s.to_bytes());
        }
        rsig_writer.write_bytes32(&rsig.ee.to_bytes());
        for c in &rsig.ci {
            rsig_writer.write_bytes32(&c.to_bytes());
        }
        let amount_key = scalar;
        let ecdh_bytes = encode_ecdh_amount(destination.amount, amount_key);
        self.output_secrets.push(OutputSecret {
            mask,
            stealth_pub,
            commitment: commitment_point,
            ecdh: ecdh_bytes,
        });

        let mut out_pk_writer = Writer::new();
        out_pk_writer.write_bytes32(&stealth_pub.to_bytes());
        out_pk_writer.write_bytes32(&commitment_point.to_bytes());

        self.out_idx = Some(out_idx);
        if is_last {
            self.stage = Stage::OutputsDone;
        }

        Ok(SignTxResponse::SetOutputAck {
            tx_out_bytes: tx_out_writer.into_bytes(),
            hmac_vout,
            rsig_bytes: rsig_writer.into_bytes(),
            out_pk_bytes: out_pk_writer.into_bytes(),
            ecdh_bytes,
        })
    }

    fn all_outputs_set(&mut self) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::OutputsDone {
            return self.fail(SignError::WrongStage("AllOutputsSet"));
        }
        if self.out_idx.map_or(0, |i| i + 1) != self.num_outputs {
            return self.fail(SignError::IndexOutOfBounds {
                index: self.out_idx.map_or(0, |i| i + 1),
                declared: self.num_outputs,
            });
        }
        if self.use_simple_rct && self.sum_out_masks != self.sum_pouts_alphas {
            return self.fail(SignError::MaskSumMismatch);
        }
        if self.sum_input_amounts < self.sum_output_amounts
            || self.sum_input_amounts - self.sum_output_amounts != self.fee
        {
            return self.fail(SignError::FeeMismatch);
        }

        if !self.additional_tx_public_keys.is_empty() {
            self.extra.additional_public_keys = self.additional_tx_public_keys.clone();
        }
        let extra_bytes = self.extra.to_bytes();

        let prefix_hasher = core::mem::take(&mut self.prefix_hasher);
        let tx_prefix_hash = prefix_hasher.finalize(&self.extra);
        self.tx_prefix_hash = Some(tx_prefix_hash);
        self.mlsag_hasher.set_message(&tx_prefix_hash);
        for secret in &self.output_secrets {
            self.mlsag_hasher.set_ecdh(&secret.ecdh);
        }
        self.mlsag_hasher.ecdh_done();
        for secret in &self.output_secrets {
            self.mlsag_hasher.set_out_pk(secret.commitment);
        }

        match self.exp_tx_prefix_hash {
            Some(expected) => {
                if !bth_crypto_keys::ct_eq(&expected, &tx_prefix_hash) {
                    return self.fail(SignError::PrefixHashMismatch);
                }
            }
            None if self.config.require_exp_tx_prefix_hash => {
                return self.fail(SignError::PrefixHashMismatch);
            }
            None => {}
        }

        let rct_sig_base_header = if self.use_simple_rct {
            RctType::Simple.wire_byte()
        } else {
            RctType::Full.wire_byte()
        };
        self.stage = Stage::MlsagDone;

        Ok(SignTxResponse::AllOutputsSetAck {
            extra_bytes,
            tx_prefix_hash,
            rct_sig_base_header,
        })
    }

    fn mlsag_done(&mut self) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::MlsagDone {
            return self.fail(SignError::WrongStage("MlsagDone"));
        }
        let full_message = self.mlsag_hasher.get_digest();
        self.full_message = Some(full_message);
        self.stage = Stage::Signing;
        Ok(SignTxResponse::MlsagDoneAck { full_message })
    }

    #[allow(clippy::too_many_arguments)]
    fn sign_input<R: RngCore + CryptoRng>(
        &mut self,
        source: TxSourceEntry,
        vin_bytes: Vec<u8>,
        hmac_vin: [u8; 32],
        pseudo_out: Option<[u8; 32]>,
        pseudo_out_hmac: Option<[u8; 32]>,
        alpha_enc: Vec<u8>,
        rng: &mut R,
    ) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::Signing {
            return self.fail(SignError::WrongStage("SignInput"));
        }
        let inp_idx = self.inp_idx.map_or(0, |i| i + 1);
        let perm = self
            .source_permutation
            .as_ref()
            .ok_or(SignError::WrongStage("SignInput"))?;
        let original_index = perm[inp_idx];

        let expected_hmac = hmac_txin(&self.schedule, original_index, &source, &vin_bytes);
        if !bth_crypto_keys::ct_eq(&expected_hmac, &hmac_vin) {
            return self.fail(SignError::HmacMismatch);
        }

        let full_message = self.full_message.ok_or(SignError::WrongStage("SignInput"))?;
        let secret = self.input_secrets[inp_idx].clone();

        let real = source.outputs[source.real_output];
        if secret.x * G != real.dest_pub {
            return self.fail(SignError::OnetimeKeyMismatch);
        }
        if gen_c(&secret.mask, secret.amount) != real.mask_commitment {
            return self.fail(SignError::CommitmentMismatch);
        }

        let signature_bytes = if self.use_simple_rct {
            let pseudo_out = pseudo_out.ok_or(SignError::HmacMismatch)?;
            let pseudo_out_hmac = pseudo_out_hmac.ok_or(SignError::HmacMismatch)?;
            let expected = bth_crypto_keys::compute_hmac(
                &self.schedule.k_txin_comm(original_index),
                &pseudo_out,
            );
            if !bth_crypto_keys::ct_eq(&expected, &pseudo_out_hmac) {
                return self.fail(SignError::HmacMismatch);
            }
            let alpha_bytes = bth_crypto_keys::open(&self.schedule.k_txin_alpha(original_index), &alpha_enc)
                .map_err(|_| SignError::AeadOpenFailed)?;
            let alpha_arr: [u8; 32] = alpha_bytes
                .as_slice()
                .try_into()
                .map_err(|_| SignError::AeadOpenFailed)?;
            let alpha = Scalar::from_bytes_mod_order(&alpha_arr);

            let pseudo_out_point = Point::from_bytes(&pseudo_out)?;
            let columns: Vec<Vec<Point>> = source
                .outputs
                .iter()
                .map(|m| vec![m.dest_pub, m.mask_commitment - pseudo_out_point])
                .collect();
            let ring = MlsagRing::new(columns)?;
            let commitment_secret = secret.mask - alpha;
            let secrets = vec![secret.x, commitment_secret];
            let key_images = vec![Some(secret.key_image), None];
            let nonces = vec![Scalar::random(rng), Scalar::random(rng)];
            let sig = mlsag_sign(
                &full_message,
                &ring,
                source.real_output,
                &secrets,
                &key_images,
                &nonces,
                rng,
            )?;
            encode_mg_sig(&sig)
        } else {
            let fee_h = Scalar::from(self.fee) * Point::pedersen_h();
            let out_commit_sum = sum_points(
                &self
                    .output_secrets
                    .iter()
                    .map(|o| o.commitment)
                    .collect::<Vec<_>>(),
            );
            let columns: Vec<Vec<Point>> = source
                .outputs
                .iter()
                .map(|m| vec![m.dest_pub, m.mask_commitment - (out_commit_sum + fee_h)])
                .collect();
            let ring = MlsagRing::new(columns)?;
            let out_mask_sum: Scalar = self
                .output_secrets
                .iter()
                .fold(Scalar::zero(), |acc, o| acc + o.mask);
            let commitment_secret = secret.mask - out_mask_sum;
            let secrets = vec![secret.x, commitment_secret];
            let key_images = vec![Some(secret.key_image), None];
            let nonces = vec![Scalar::random(rng), Scalar::random(rng)];
            let sig = mlsag_sign(
                &full_message,
                &ring,
                source.real_output,
                &secrets,
                &key_images,
                &nonces,
                rng,
            )?;
            encode_mg_sig(&sig)
        };

        self.inp_idx = Some(inp_idx);
        if inp_idx + 1 == self.num_inputs {
            self.stage = Stage::Final;
        }

        Ok(SignTxResponse::SignInputAck {
            signature_bytes,
            cout_encrypted: None,
        })
    }

    fn finalize<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<SignTxResponse, SignError> {
        if self.stage != Stage::Final {
            return self.fail(SignError::WrongStage("Final"));
        }
        let tx_prefix_hash = self
            .tx_prefix_hash
            .ok_or(SignError::WrongStage("Final"))?;

        let mut salt = [0u8; 32];
        let mut rand_mult = [0u8; 32];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut rand_mult);

        let rand_mult_scalar = Scalar::from_bytes_mod_order(&rand_mult);
        let prefix_scalar = Scalar::from_hash_bytes(&tx_prefix_hash);
        let point = rand_mult_scalar * (prefix_scalar * G);

        let mut preimage = Vec::with_capacity(96);
        preimage.extend_from_slice(&self.credentials.spend_secret().to_bytes());
        preimage.extend_from_slice(&salt);
        preimage.extend_from_slice(&point.to_bytes());
        let tx_key = keccak256(&preimage);

        let mut key_buf = Vec::with_capacity(32 + 32 * self.additional_tx_private_keys.len());
        key_buf.extend_from_slice(&self.r.to_bytes());
        for maybe in &self.additional_tx_private_keys {
            if let Some(k) = maybe {
                key_buf.extend_from_slice(&k.to_bytes());
            }
        }
        let tx_enc_keys = bth_crypto_keys::seal(&tx_key, &key_buf, rng);

        self.stage = Stage::Terminal;
        Ok(SignTxResponse::FinalAck {
            cout_key: None,
            salt,
            rand_mult,
            tx_enc_keys,
        })
    }
}

fn classify_destinations(
    outputs: &[TxDestinationEntry],
    change_address: Option<DestinationAddress>,
) -> (usize, usize, Option<DestinationAddress>) {
    let mut num_std = 0usize;
    let mut num_sub = 0usize;
    let mut single_sub = None;
    for out in outputs {
        if Some(out.address) == change_address {
            continue;
        }
        if out.is_subaddress {
            num_sub += 1;
            single_sub = Some(out.address);
        } else {
            num_std += 1;
        }
    }
    (num_std, num_sub, single_sub)
}

fn encrypt_payment_id(payment_id: &[u8], view_public: Point, r: Scalar) -> Vec<u8> {
    let d = derivation(r, view_public);
    let mut buf = Vec::with_capacity(33);
    buf.extend_from_slice(&d.to_bytes());
    buf.push(ENCRYPTED_PAYMENT_ID_TAIL);
    let mask = keccak256(&buf);
    payment_id
        .iter()
        .zip(mask.iter())
        .map(|(p, m)| p ^ m)
        .collect()
}

fn hmac_dest(schedule: &KeySchedule, index: usize, dest: &TxDestinationEntry) -> [u8; 32] {
    let mut w = Writer::new();
    write_destination(&mut w, dest);
    bth_crypto_keys::compute_hmac(&schedule.k_txdest(index), w.as_bytes())
}

fn write_destination(w: &mut Writer, dest: &TxDestinationEntry) {
    w.write_varint(dest.amount);
    w.write_bytes32(&dest.address.spend_public.to_bytes());
    w.write_bytes32(&dest.address.view_public.to_bytes());
    w.write_u8(dest.is_subaddress as u8);
}

fn hmac_txin(schedule: &KeySchedule, index: usize, source: &TxSourceEntry, vin_bytes: &[u8]) -> [u8; 32] {
    let mut w = Writer::new();
    write_source_entry(&mut w, source);
    w.write_blob(vin_bytes);
    bth_crypto_keys::compute_hmac(&schedule.k_txin(index), w.as_bytes())
}

fn write_source_entry(w: &mut Writer, source: &TxSourceEntry) {
    w.write_container_len(source.outputs.len());
    for member in &source.outputs {
        w.write_varint(member.global_index);
        w.write_bytes32(&member.dest_pub.to_bytes());
        w.write_bytes32(&member.mask_commitment.to_bytes());
    }
    w.write_varint(source.real_output as u64);
    w.write_bytes32(&source.real_out_tx_key.to_bytes());
    w.write_container_len(source.real_out_additional_tx_keys.len());
    for key in &source.real_out_additional_tx_keys {
        w.write_bytes32(&key.to_bytes());
    }
    w.write_varint(source.real_output_in_tx_index as u64);
    w.write_varint(source.amount);
}

fn hmac_txout(
    schedule: &KeySchedule,
    index: usize,
    dest: &TxDestinationEntry,
    vout_bytes: &[u8],
) -> [u8; 32] {
    let mut w = Writer::new();
    write_destination(&mut w, dest);
    w.write_blob(vout_bytes);
    bth_crypto_keys::compute_hmac(&schedule.k_txout(index), w.as_bytes())
}

fn decode_vin(bytes: &[u8]) -> Result<TxinToKey, SignError> {
    let mut reader = bth_transaction_core::Reader::new(bytes);
    let variant = reader.read_u8().map_err(bth_transaction_core::TxCoreError::from)?;
    if variant != bth_transaction_core::TXIN_TO_KEY_VARIANT_CODE {
        return Err(SignError::UnsupportedRctType);
    }
    let amount = reader.read_varint().map_err(bth_transaction_core::TxCoreError::from)?;
    let len = reader.read_container_len().map_err(bth_transaction_core::TxCoreError::from)?;
    let mut key_offsets = Vec::with_capacity(len);
    for _ in 0..len {
        key_offsets.push(reader.read_varint().map_err(bth_transaction_core::TxCoreError::from)?);
    }
    let key_image_bytes = reader.read_bytes32().map_err(bth_transaction_core::TxCoreError::from)?;
    let key_image = KeyImage::from_bytes(&key_image_bytes).map_err(|_| SignError::InvalidCurvePoint)?;
    Ok(TxinToKey {
        amount,
        key_offsets,
        key_image,
    })
}

fn encode_mg_sig(sig: &bth_crypto_ring_signature::MgSig) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_container_len(sig.ss.len());
    for row in &sig.ss {
        w.write_container_len(row.len());
        for s in row {
            w.write_bytes32(&s.to_bytes());
        }
    }
    w.write_bytes32(&sig.cc.to_bytes());
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_account_keys::NetworkTag;
    use bth_transaction_core::RingMember;
    use rand::{rngs::StdRng, SeedableRng};

    fn creds(seed: u8) -> Credentials {
        let mut rng = StdRng::from_seed([seed; 32]);
        Credentials::new(
            Scalar::random(&mut rng),
            Scalar::random(&mut rng),
            NetworkTag::Mainnet,
        )
    }

    /// Drives a single-input, two-output (destination + self-change)
    /// Full RCT session through every stage and checks each reply shape
    /// along the way.
    #[test]
    fn single_input_session_reaches_final() {
        let mut rng = StdRng::from_seed([7u8; 32]);
        let own = creds(1);
        let payee = creds(2);

        // The output this session spends: built as if `own` had
        // received it from some earlier transaction under fresh `r`.
        let r_sender = Scalar::random(&mut rng);
        let tx_pub = r_sender * G;
        let fund_derivation = derivation(r_sender, own.view_public());
        let fund_scalar = derivation_to_scalar(fund_derivation, 0);
        let real_dest_pub = stealth_public_key(own.spend_public(), fund_scalar);
        let input_amount = 1_000_000u64;
        let input_mask = Scalar::from(42u64);
        let real_mask_commitment = gen_c(&input_mask, input_amount);

        let decoy = RingMember {
            global_index: 1,
            dest_pub: Scalar::random(&mut rng) * G,
            mask_commitment: Scalar::random(&mut rng) * G,
        };
        let real = RingMember {
            global_index: 2,
            dest_pub: real_dest_pub,
            mask_commitment: real_mask_commitment,
        };
        let source = TxSourceEntry {
            outputs: vec![decoy, real],
            real_output: 1,
            real_out_tx_key: tx_pub,
            real_out_additional_tx_keys: Vec::new(),
            real_output_in_tx_index: 0,
            amount: input_amount,
            rct: true,
            mask: input_mask,
        };

        let fee = 1_000u64;
        let destination = TxDestinationEntry {
            amount: 700_000,
            address: DestinationAddress {
                spend_public: payee.spend_public(),
                view_public: payee.view_public(),
            },
            is_subaddress: false,
        };
        let change = TxDestinationEntry {
            amount: 299_000,
            address: DestinationAddress {
                spend_public: own.spend_public(),
                view_public: own.view_public(),
            },
            is_subaddress: false,
        };

        let tsx_data = TsxData {
            num_inputs: 1,
            mixin: 1,
            fee,
            unlock_time: 0,
            is_multisig: false,
            outputs: vec![destination.clone(), change.clone()],
            change_dts: Some(change.clone()),
            payment_id: None,
            account: None,
            minor_indices: Vec::new(),
            exp_tx_prefix_hash: None,
            use_tx_keys: Vec::new(),
        };

        let (mut state, init_ack) = SigningState::init(
            SignerConfig::default(),
            &own,
            tsx_data,
            true,
            0,
            &mut rng,
        )
        .unwrap();
        let dest_hmacs = match init_ack {
            SignTxResponse::InitAck { dest_hmacs } => dest_hmacs,
            _ => panic!("expected InitAck"),
        };
        assert_eq!(dest_hmacs.len(), 2);

        let set_input_ack = state.set_input(source.clone(), &mut rng).unwrap();
        let (vin_bytes, hmac_vin) = match set_input_ack {
            SignTxResponse::SetInputAck {
                vin_bytes,
                hmac_vin,
                pseudo_out,
                ..
            } => {
                assert!(pseudo_out.is_none(), "single-input session is Full RCT");
                (vin_bytes, hmac_vin)
            }
            _ => panic!("expected SetInputAck"),
        };

        assert!(matches!(
            state.inputs_permutation(vec![0]).unwrap(),
            SignTxResponse::InputsPermutationAck
        ));
        assert!(matches!(
            state
                .input_vin_i(source.clone(), vin_bytes.clone(), hmac_vin, None, None)
                .unwrap(),
            SignTxResponse::InputVinIAck
        ));

        assert!(matches!(
            state
                .set_output(destination.clone(), dest_hmacs[0], &mut rng)
                .unwrap(),
            SignTxResponse::SetOutputAck { .. }
        ));
        assert!(matches!(
            state
                .set_output(change.clone(), dest_hmacs[1], &mut rng)
                .unwrap(),
            SignTxResponse::SetOutputAck { .. }
        ));

        let all_outputs_ack = state.all_outputs_set().unwrap();
        assert!(matches!(
            all_outputs_ack,
            SignTxResponse::AllOutputsSetAck { .. }
        ));

        assert!(matches!(
            state.mlsag_done().unwrap(),
            SignTxResponse::MlsagDoneAck { .. }
        ));

        let sign_input_ack = state
            .sign_input(source, vin_bytes, hmac_vin, None, None, Vec::new(), &mut rng)
            .unwrap();
        match sign_input_ack {
            SignTxResponse::SignInputAck { signature_bytes, .. } => {
                assert!(!signature_bytes.is_empty());
            }
            _ => panic!("expected SignInputAck"),
        }

        let final_ack = state.finalize(&mut rng).unwrap();
        assert!(matches!(final_ack, SignTxResponse::FinalAck { .. }));
        assert!(state.is_terminal());
    }

    #[test]
    fn mismatched_fee_is_rejected_at_all_outputs_set() {
        let mut rng = StdRng::from_seed([9u8; 32]);
        let own = creds(3);

        let r_sender = Scalar::random(&mut rng);
        let tx_pub = r_sender * G;
        let fund_derivation = derivation(r_sender, own.view_public());
        let fund_scalar = derivation_to_scalar(fund_derivation, 0);
        let real_dest_pub = stealth_public_key(own.spend_public(), fund_scalar);
        let input_amount = 1_000_000u64;
        let input_mask = Scalar::from(11u64);
        let real = RingMember {
            global_index: 1,
            dest_pub: real_dest_pub,
            mask_commitment: gen_c(&input_mask, input_amount),
        };
        let source = TxSourceEntry {
            outputs: vec![real],
            real_output: 0,
            real_out_tx_key: tx_pub,
            real_out_additional_tx_keys: Vec::new(),
            real_output_in_tx_index: 0,
            amount: input_amount,
            rct: true,
            mask: input_mask,
        };

        // Destination claims the entire input with no fee left over.
        let destination = TxDestinationEntry {
            amount: input_amount,
            address: DestinationAddress {
                spend_public: own.spend_public(),
                view_public: own.view_public(),
            },
            is_subaddress: false,
        };
        let tsx_data = TsxData {
            num_inputs: 1,
            mixin: 0,
            fee: 1_000,
            unlock_time: 0,
            is_multisig: false,
            outputs: vec![destination.clone()],
            change_dts: None,
            payment_id: None,
            account: None,
            minor_indices: Vec::new(),
            exp_tx_prefix_hash: None,
            use_tx_keys: Vec::new(),
        };

        let (mut state, init_ack) =
            SigningState::init(SignerConfig::default(), &own, tsx_data, true, 0, &mut rng).unwrap();
        let dest_hmacs = match init_ack {
            SignTxResponse::InitAck { dest_hmacs } => dest_hmacs,
            _ => panic!("expected InitAck"),
        };

        let set_input_ack = state.set_input(source.clone(), &mut rng).unwrap();
        let (vin_bytes, hmac_vin) = match set_input_ack {
            SignTxResponse::SetInputAck {
                vin_bytes,
                hmac_vin,
                ..
            } => (vin_bytes, hmac_vin),
            _ => panic!("expected SetInputAck"),
        };
        state.inputs_permutation(vec![0]).unwrap();
        state
            .input_vin_i(source, vin_bytes, hmac_vin, None, None)
            .unwrap();
        state
            .set_output(destination, dest_hmacs[0], &mut rng)
            .unwrap();

        assert_eq!(
            state.all_outputs_set(),
            Err(SignError::FeeMismatch)
        );
        assert!(state.is_terminal());
    }

    /// Three outputs (one subaddress destination, one standard
    /// destination, one standard self-change): once any subaddress
    /// destination is present alongside a standard one, every
    /// destination gets an additional tx public key, not just the
    /// subaddress ones.
    #[test]
    fn additional_tx_public_keys_cover_every_destination() {
        let mut rng = StdRng::from_seed([13u8; 32]);
        let own = creds(4);
        let payee_std = creds(5);
        let payee_sub_base = creds(6);
        let sub_index = bth_account_keys::SubaddressIndex::new(0, 1);
        let payee_sub = payee_sub_base
            .primary_address()
            .subaddress(payee_sub_base.view_secret(), &sub_index);

        let destination_sub = TxDestinationEntry {
            amount: 400_000,
            address: DestinationAddress {
                spend_public: payee_sub.spend_public_key(),
                view_public: payee_sub.view_public_key(),
            },
            is_subaddress: true,
        };
        let destination_std = TxDestinationEntry {
            amount: 300_000,
            address: DestinationAddress {
                spend_public: payee_std.spend_public(),
                view_public: payee_std.view_public(),
            },
            is_subaddress: false,
        };
        let change = TxDestinationEntry {
            amount: 299_000,
            address: DestinationAddress {
                spend_public: own.spend_public(),
                view_public: own.view_public(),
            },
            is_subaddress: false,
        };

        let r_sender = Scalar::random(&mut rng);
        let tx_pub = r_sender * G;
        let fund_derivation = derivation(r_sender, own.view_public());
        let fund_scalar = derivation_to_scalar(fund_derivation, 0);
        let real_dest_pub = stealth_public_key(own.spend_public(), fund_scalar);
        let input_amount = 1_000_000u64;
        let input_mask = Scalar::from(42u64);
        let real = RingMember {
            global_index: 1,
            dest_pub: real_dest_pub,
            mask_commitment: gen_c(&input_mask, input_amount),
        };
        let source = TxSourceEntry {
            outputs: vec![real],
            real_output: 0,
            real_out_tx_key: tx_pub,
            real_out_additional_tx_keys: Vec::new(),
            real_output_in_tx_index: 0,
            amount: input_amount,
            rct: true,
            mask: input_mask,
        };

        let tsx_data = TsxData {
            num_inputs: 1,
            mixin: 0,
            fee: 1_000,
            unlock_time: 0,
            is_multisig: false,
            outputs: vec![destination_sub.clone(), destination_std.clone(), change.clone()],
            change_dts: Some(change.clone()),
            payment_id: None,
            account: None,
            minor_indices: Vec::new(),
            exp_tx_prefix_hash: None,
            use_tx_keys: Vec::new(),
        };

        let (mut state, init_ack) =
            SigningState::init(SignerConfig::default(), &own, tsx_data, true, 0, &mut rng).unwrap();
        assert!(state.need_additional_txkeys);
        let dest_hmacs = match init_ack {
            SignTxResponse::InitAck { dest_hmacs } => dest_hmacs,
            _ => panic!("expected InitAck"),
        };

        let set_input_ack = state.set_input(source.clone(), &mut rng).unwrap();
        let (vin_bytes, hmac_vin) = match set_input_ack {
            SignTxResponse::SetInputAck { vin_bytes, hmac_vin, .. } => (vin_bytes, hmac_vin),
            _ => panic!("expected SetInputAck"),
        };
        state.inputs_permutation(vec![0]).unwrap();
        state
            .input_vin_i(source, vin_bytes, hmac_vin, None, None)
            .unwrap();

        state
            .set_output(destination_sub, dest_hmacs[0], &mut rng)
            .unwrap();
        state
            .set_output(destination_std, dest_hmacs[1], &mut rng)
            .unwrap();
        state.set_output(change, dest_hmacs[2], &mut rng).unwrap();

        assert_eq!(state.additional_tx_public_keys.len(), 3);
    }

    /// A host that declares a short `use_tx_keys` for a session that
    /// needs additional tx keys must be rejected at `init`, never index
    /// out of bounds later in `set_output`.
    #[test]
    fn short_use_tx_keys_is_rejected_at_init() {
        let mut rng = StdRng::from_seed([14u8; 32]);
        let own = creds(7);
        let payee_sub_base = creds(8);
        let sub_index = bth_account_keys::SubaddressIndex::new(0, 1);
        let payee_sub = payee_sub_base
            .primary_address()
            .subaddress(payee_sub_base.view_secret(), &sub_index);

        let destination_sub = TxDestinationEntry {
            amount: 400_000,
            address: DestinationAddress {
                spend_public: payee_sub.spend_public_key(),
                view_public: payee_sub.view_public_key(),
            },
            is_subaddress: true,
        };
        let destination_std = TxDestinationEntry {
            amount: 300_000,
            address: DestinationAddress {
                spend_public: own.spend_public(),
                view_public: own.view_public(),
            },
            is_subaddress: false,
        };

        let tsx_data = TsxData {
            num_inputs: 2,
            mixin: 0,
            fee: 1_000,
            unlock_time: 0,
            is_multisig: false,
            outputs: vec![destination_sub.clone(), destination_std.clone()],
            change_dts: None,
            payment_id: None,
            account: None,
            minor_indices: Vec::new(),
            exp_tx_prefix_hash: None,
            // Only the main `r` plus one additional key for two outputs
            // that both need one once `need_additional_txkeys` is set.
            use_tx_keys: vec![Scalar::random(&mut rng), Scalar::random(&mut rng)],
        };

        let err = SigningState::init(SignerConfig::default(), &own, tsx_data, true, 0, &mut rng)
            .unwrap_err();
        assert_eq!(err, SignError::NotEnoughTxKeys(1, 2));
    }
}
