// Copyright (c) 2018-2022 The Botho Foundation

//! Borromean range proofs: for each output, proves `0 <= amount < 2^64`
//! without revealing `amount`, by decomposing it into 64 bits and proving
//! each bit's commitment opens to either `0` or `2^i` via a linked
//! (Borromean) OR-proof. Bulletproofs are out of scope; this crate only
//! implements the pre-Bulletproof construction.

use alloc::vec::Vec;

use bth_crypto_keys::{keccak256, Point, Scalar, G};
use rand_core::{CryptoRng, RngCore};

use crate::Error;

/// Number of bits a range proof covers (a full 64-bit amount).
pub const RANGE_PROOF_BITS: usize = 64;

/// A Borromean range proof over a 64-bit amount.
///
/// Wire layout (bit-exact with the pre-Bulletproof reference format):
/// `s0[64] ‖ s1[64] ‖ ee ‖ Ci[64]`, i.e. `64*(64+32)` bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BorromeanRangeProof {
    /// Branch-0 ("bit is 0") response scalars, one per bit.
    pub s0: [Scalar; RANGE_PROOF_BITS],
    /// Branch-1 ("bit is 1") response scalars, one per bit.
    pub s1: [Scalar; RANGE_PROOF_BITS],
    /// The shared challenge closing every bit's ring.
    pub ee: Scalar,
    /// Per-bit commitments; `Ci[i] = a_i*G + b_i*2^i*H`. Their sum is the
    /// output's full commitment `C`.
    pub ci: [Point; RANGE_PROOF_BITS],
}

fn hash_to_scalar(bytes: &[u8]) -> Scalar {
    Scalar::from_hash_bytes(&keccak256(bytes))
}

fn bit_of(amount: u64, i: usize) -> bool {
    (amount >> i) & 1 == 1
}

fn scale_h(i: usize, h: Point) -> Point {
    Scalar::from(1u64 << i) * h
}

/// Generate a range proof that `amount < 2^64` under the given overall
/// blinding `mask`. The per-bit masks are sampled freely except the last,
/// which is fixed so they sum to `mask` exactly — mirroring how the
/// signing state machine pins an output's overall mask to satisfy the
/// cross-input/output balance invariant.
pub fn prove_range<R: RngCore + CryptoRng>(
    mask: Scalar,
    amount: u64,
    rng: &mut R,
) -> (Point, BorromeanRangeProof) {
    let h = Point::pedersen_h();
    let mut a = [Scalar::zero(); RANGE_PROOF_BITS];
    let mut running = Scalar::zero();
    for i in 0..RANGE_PROOF_BITS - 1 {
        a[i] = Scalar::random(rng);
        running = running + a[i];
    }
    a[RANGE_PROOF_BITS - 1] = mask - running;

    let mut ci = [Point::identity(); RANGE_PROOF_BITS];
    let mut p0 = [Point::identity(); RANGE_PROOF_BITS];
    let mut p1 = [Point::identity(); RANGE_PROOF_BITS];
    for i in 0..RANGE_PROOF_BITS {
        let bit_value = scale_h(i, h);
        ci[i] = (a[i] * G) + if bit_of(amount, i) { bit_value } else { Point::identity() };
        p0[i] = ci[i];
        p1[i] = ci[i] - bit_value;
    }

    let mut alpha = [Scalar::zero(); RANGE_PROOF_BITS];
    let mut s0 = [Scalar::zero(); RANGE_PROOF_BITS];
    let mut s1 = [Scalar::zero(); RANGE_PROOF_BITS];
    let mut chk = [Point::identity(); RANGE_PROOF_BITS];

    for i in 0..RANGE_PROOF_BITS {
        alpha[i] = Scalar::random(rng);
        if !bit_of(amount, i) {
            let nonce_commit = alpha[i] * G;
            s1[i] = Scalar::random(rng);
            let e1 = hash_to_scalar(&nonce_commit.to_bytes());
            let l1 = (s1[i] * G) + (e1 * p1[i]);
            chk[i] = l1;
        } else {
            chk[i] = alpha[i] * G;
        }
    }

    let chk_bytes: Vec<u8> = chk.iter().flat_map(|p| p.to_bytes()).collect();
    let ee = hash_to_scalar(&chk_bytes);

    for i in 0..RANGE_PROOF_BITS {
        if !bit_of(amount, i) {
            s0[i] = alpha[i] - (ee * a[i]);
        } else {
            s0[i] = Scalar::random(rng);
            let l0 = (s0[i] * G) + (ee * p0[i]);
            let e1 = hash_to_scalar(&l0.to_bytes());
            s1[i] = alpha[i] - (e1 * a[i]);
        }
    }

    let commitment = ci.iter().copied().fold(Point::identity(), |acc, p| acc + p);
    (commitment, BorromeanRangeProof { s0, s1, ee, ci })
}

/// Verify a [`BorromeanRangeProof`] for commitment `commitment`.
pub fn verify_range(commitment: Point, proof: &BorromeanRangeProof) -> Result<(), Error> {
    let h = Point::pedersen_h();
    let sum_ci = proof
        .ci
        .iter()
        .copied()
        .fold(Point::identity(), |acc, p| acc + p);
    if sum_ci != commitment {
        return Err(Error::ValueNotConserved);
    }

    let mut chk = [Point::identity(); RANGE_PROOF_BITS];
    for i in 0..RANGE_PROOF_BITS {
        let bit_value = scale_h(i, h);
        let p0 = proof.ci[i];
        let p1 = proof.ci[i] - bit_value;
        let l0 = (proof.s0[i] * G) + (proof.ee * p0);
        let e1 = hash_to_scalar(&l0.to_bytes());
        let l1 = (proof.s1[i] * G) + (e1 * p1);
        chk[i] = l1;
    }
    let chk_bytes: Vec<u8> = chk.iter().flat_map(|p| p.to_bytes()).collect();
    let ee = hash_to_scalar(&chk_bytes);

    if ee == proof.ee {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn prove_then_verify_round_trip() {
        let mut rng = StdRng::from_seed([30u8; 32]);
        let mask = Scalar::random(&mut rng);
        let (commitment, proof) = prove_range(mask, 1_000_000, &mut rng);
        verify_range(commitment, &proof).unwrap();
    }

    #[test]
    fn commitment_matches_gen_c() {
        let mut rng = StdRng::from_seed([31u8; 32]);
        let mask = Scalar::random(&mut rng);
        let amount = 2_000_000u64;
        let (commitment, _proof) = prove_range(mask, amount, &mut rng);
        assert_eq!(commitment, crate::commitment::gen_c(&mask, amount));
    }

    #[test]
    fn tampered_proof_fails() {
        let mut rng = StdRng::from_seed([32u8; 32]);
        let mask = Scalar::random(&mut rng);
        let (commitment, mut proof) = prove_range(mask, 42, &mut rng);
        proof.s0[0] = proof.s0[0] + Scalar::one();
        assert!(verify_range(commitment, &proof).is_err());
    }

    #[test]
    fn zero_amount_proves_and_verifies() {
        let mut rng = StdRng::from_seed([33u8; 32]);
        let mask = Scalar::random(&mut rng);
        let (commitment, proof) = prove_range(mask, 0, &mut rng);
        verify_range(commitment, &proof).unwrap();
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prove_then_verify_round_trips_for_arbitrary_amount(
            seed in any::<[u8; 32]>(),
            amount in any::<u64>(),
        ) {
            let mut rng = StdRng::from_seed(seed);
            let mask = Scalar::random(&mut rng);
            let (commitment, proof) = prove_range(mask, amount, &mut rng);
            prop_assert_eq!(commitment, crate::commitment::gen_c(&mask, amount));
            prop_assert!(verify_range(commitment, &proof).is_ok());
        }

        #[test]
        fn flipping_any_s0_scalar_breaks_verification(
            seed in any::<[u8; 32]>(),
            amount in any::<u64>(),
            bit in 0usize..RANGE_PROOF_BITS,
        ) {
            let mut rng = StdRng::from_seed(seed);
            let mask = Scalar::random(&mut rng);
            let (commitment, mut proof) = prove_range(mask, amount, &mut rng);
            proof.s0[bit] = proof.s0[bit] + Scalar::one();
            prop_assert!(verify_range(commitment, &proof).is_err());
        }
    }
}
