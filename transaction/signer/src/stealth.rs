// Copyright (c) 2018-2022 The Botho Foundation

//! One-time (stealth) key derivation: the `H_s(rA ‖ i)·G + B` output
//! addressing scheme, and the matching secret-key/key-image recovery
//! used to spend a previously received output.

use bth_crypto_keys::{keccak256, Point, Scalar, G};
use bth_transaction_core::Writer;

/// `derivation = secret · pub`, the shared Diffie-Hellman point a
/// transaction's stealth addressing is built from.
pub fn derivation(secret: Scalar, public: Point) -> Point {
    secret * public
}

fn hash_to_scalar(data: &[u8]) -> Scalar {
    Scalar::from_hash_bytes(&keccak256(data))
}

/// `H_s(derivation ‖ varint(index))`, the scalar every stealth key and
/// amount mask is built from.
pub fn derivation_to_scalar(derivation: Point, index: u64) -> Scalar {
    let mut w = Writer::new();
    w.write_bytes32(&derivation.to_bytes());
    w.write_varint(index);
    hash_to_scalar(w.as_bytes())
}

/// `stealth_pub = H_s(derivation ‖ i)·G + spend_pub`.
pub fn stealth_public_key(spend_pub: Point, derivation_scalar: Scalar) -> Point {
    (derivation_scalar * G) + spend_pub
}

/// `x = H_s(derivation ‖ i) + spend_secret`, the one-time private key
/// for a previously received output.
pub fn recover_onetime_private_key(derivation_scalar: Scalar, spend_secret: Scalar) -> Scalar {
    derivation_scalar + spend_secret
}

/// `amount_j XOR lo8(Keccak(amount_key ‖ "amount"))`, Monero's
/// pre-Bulletproof 8-byte amount obfuscation. `amount_key` is the same
/// `H_s(derivation ‖ i)` scalar the stealth key is built from.
pub fn encode_ecdh_amount(amount: u64, amount_key: Scalar) -> [u8; 8] {
    let mut buf = alloc::vec::Vec::with_capacity(32 + 6);
    buf.extend_from_slice(&amount_key.to_bytes());
    buf.extend_from_slice(b"amount");
    let mask = keccak256(&buf);
    let mut out = amount.to_le_bytes();
    for (o, m) in out.iter_mut().zip(mask.iter()) {
        *o ^= m;
    }
    out
}

/// Inverse of [`encode_ecdh_amount`] (XOR is its own inverse).
pub fn decode_ecdh_amount(ecdh: [u8; 8], amount_key: Scalar) -> u64 {
    u64::from_le_bytes(encode_ecdh_amount(u64::from_le_bytes(ecdh), amount_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn stealth_key_recovers_to_same_scalar_as_was_encoded() {
        let mut rng = StdRng::from_seed([5u8; 32]);
        let spend_secret = Scalar::random(&mut rng);
        let spend_pub = spend_secret * G;
        let view_secret = Scalar::random(&mut rng);
        let view_pub = view_secret * G;
        let r = Scalar::random(&mut rng);
        let tx_pub = r * G;

        let sender_side = derivation(r, view_pub);
        let scalar = derivation_to_scalar(sender_side, 0);
        let stealth_pub = stealth_public_key(spend_pub, scalar);

        let receiver_side = derivation(view_secret, tx_pub);
        assert_eq!(sender_side, receiver_side);
        let recovered_scalar = derivation_to_scalar(receiver_side, 0);
        let onetime_secret = recover_onetime_private_key(recovered_scalar, spend_secret);
        assert_eq!(onetime_secret * G, stealth_pub);
    }

    #[test]
    fn ecdh_amount_round_trips() {
        let key = Scalar::from(99u64);
        let amount = 1_234_567_890u64;
        let encoded = encode_ecdh_amount(amount, key);
        assert_ne!(u64::from_le_bytes(encoded), amount);
        assert_eq!(decode_ecdh_amount(encoded, key), amount);
    }
}
