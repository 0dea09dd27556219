// Copyright (c) 2018-2022 The Botho Foundation

//! Pedersen amount commitments, `C = mask·G + amount·H`, and the
//! mask/pseudo-out bookkeeping Simple RCT balance checking needs.

use bth_crypto_keys::{Point, PointDecodingError, Scalar, G};
use zeroize::Zeroize;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `gen_c(mask, amount) = mask·G + amount·H`.
///
/// `H` is the alternate Pedersen generator, `H_p(G)`; it has no known
/// discrete log relative to `G`, so nobody can adjust `amount` without
/// also breaking the binding of `mask`.
pub fn gen_c(mask: &Scalar, amount: u64) -> Point {
    let h = Point::pedersen_h();
    (*mask * G) + (Scalar::from(amount) * h)
}

/// A Pedersen commitment to an amount, together with the blinding mask
/// used to open it. Kept alongside the mask only transiently (e.g. while
/// building `pseudo_out_i`); the mask itself is zeroized once it's
/// consumed into an HMAC/offload step.
#[derive(Clone, Copy, Debug, Zeroize)]
pub struct Commitment {
    /// The blinding mask (a.k.a. `a_i`), secret.
    pub mask: Scalar,
    /// `C = mask·G + amount·H`, not secret.
    #[zeroize(skip)]
    pub point: Point,
}

impl Commitment {
    /// Build a new commitment to `amount` under `mask`.
    pub fn new(mask: Scalar, amount: u64) -> Self {
        Commitment {
            mask,
            point: gen_c(&mask, amount),
        }
    }

    /// Encode the commitment point (the mask is never serialized on its
    /// own; it only ever leaves the device AEAD-sealed).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.to_bytes()
    }
}

/// A commitment as it appears on the wire: just the point, no mask.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct CompressedCommitment(
    #[cfg_attr(feature = "serde", serde(with = "point_bytes"))] Point,
);

impl CompressedCommitment {
    /// Wrap a commitment point for wire transport.
    pub fn new(point: Point) -> Self {
        CompressedCommitment(point)
    }

    /// Decode from a canonical 32-byte encoding.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, PointDecodingError> {
        Ok(CompressedCommitment(Point::from_bytes(bytes)?))
    }

    /// Encode to the canonical 32-byte representation.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The underlying curve point.
    pub fn as_point(&self) -> Point {
        self.0
    }
}

#[cfg(feature = "serde")]
mod point_bytes {
    use bth_crypto_keys::Point;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(point: &Point, serializer: S) -> Result<S::Ok, S::Error> {
        point.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
        Point::deserialize(deserializer)
    }
}

/// Sum of a slice of commitment points, used to check that
/// `sum(pseudo_out) == sum(output commitments) + fee·H`.
pub fn sum_points(points: &[Point]) -> Point {
    points
        .iter()
        .copied()
        .fold(Point::identity(), |acc, p| acc + p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn commitment_to_zero_amount_with_zero_mask_is_identity() {
        let c = Commitment::new(Scalar::zero(), 0);
        assert_eq!(c.point, Point::identity());
    }

    #[test]
    fn mask_sum_balances_amount_sum() {
        let mut rng = StdRng::from_seed([4u8; 32]);
        let m1 = Scalar::random(&mut rng);
        let m2 = Scalar::random(&mut rng);
        let a1 = 2_000_000u64;
        let a2 = 995_000u64;
        let fee = 5_000u64;

        // Balance: amount_in = amount_out + fee, masks chosen so
        // mask_in == mask_out (standard Simple RCT construction).
        let mask_in = m1 + m2;
        let pseudo_out = gen_c(&mask_in, a1 + a2 - fee + fee); // a1+a2 == in amount
        let out1 = gen_c(&m1, a1);
        let out2 = gen_c(&m2, a2);
        let fee_commitment = Scalar::from(fee) * Point::pedersen_h();

        assert_eq!(pseudo_out, out1 + out2 + fee_commitment);
    }

    #[test]
    fn compressed_commitment_roundtrip() {
        let mut rng = StdRng::from_seed([6u8; 32]);
        let mask = Scalar::random(&mut rng);
        let c = Commitment::new(mask, 42);
        let wire = CompressedCommitment::new(c.point);
        let bytes = wire.to_bytes();
        assert_eq!(CompressedCommitment::from_bytes(&bytes).unwrap(), wire);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn mask_sum_balances_for_arbitrary_amounts(
            seed in any::<[u8; 32]>(),
            a1 in 0u64..1_000_000_000,
            a2 in 0u64..1_000_000_000,
            fee in 0u64..1_000_000,
        ) {
            let mut rng = StdRng::from_seed(seed);
            let m1 = Scalar::random(&mut rng);
            let m2 = Scalar::random(&mut rng);
            let mask_in = m1 + m2;
            let pseudo_out = gen_c(&mask_in, a1 + a2 + fee);
            let out1 = gen_c(&m1, a1);
            let out2 = gen_c(&m2, a2);
            let fee_commitment = Scalar::from(fee) * Point::pedersen_h();
            prop_assert_eq!(pseudo_out, out1 + out2 + fee_commitment);
        }

        #[test]
        fn compressed_commitment_roundtrips_for_arbitrary_input(
            seed in any::<[u8; 32]>(),
            amount in any::<u64>(),
        ) {
            let mut rng = StdRng::from_seed(seed);
            let mask = Scalar::random(&mut rng);
            let c = Commitment::new(mask, amount);
            let wire = CompressedCommitment::new(c.point);
            let bytes = wire.to_bytes();
            prop_assert_eq!(CompressedCommitment::from_bytes(&bytes).unwrap(), wire);
        }
    }
}
