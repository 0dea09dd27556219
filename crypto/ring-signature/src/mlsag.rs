// Copyright (c) 2018-2022 The Botho Foundation

//! MLSAG (Multilayered Linkable Spontaneous Anonymous Group) ring
//! signatures. Each input is proved by a matrix of rows: a "spend key"
//! row (which carries the linkable key image) and, for Simple RCT, a
//! "commitment" row proving the pseudo-out and the real output's
//! commitment open to the same amount, without revealing which ring
//! member is real.

use alloc::vec;
use alloc::vec::Vec;

use bth_crypto_keys::{keccak256, Point, Scalar, G};
use rand_core::{CryptoRng, RngCore};

use crate::key_image::KeyImage;
use crate::Error;

/// The public ring for an MLSAG signature: `columns[col][row]` is the
/// public key standing in row `row` of ring member `col`.
#[derive(Clone, Debug)]
pub struct MlsagRing {
    columns: Vec<Vec<Point>>,
}

impl MlsagRing {
    /// Build a ring from its columns. Every column must have the same
    /// number of rows.
    pub fn new(columns: Vec<Vec<Point>>) -> Result<Self, Error> {
        let rows = columns.first().ok_or(Error::IndexOutOfBounds)?.len();
        if rows == 0 {
            return Err(Error::IndexOutOfBounds);
        }
        if columns.iter().any(|c| c.len() != rows) {
            return Err(Error::LengthMismatch(0, rows));
        }
        Ok(MlsagRing { columns })
    }

    /// Number of ring members (the mixin count plus one).
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the ring has no members.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of rows (2 for Simple RCT: spend key + commitment).
    pub fn rows(&self) -> usize {
        self.columns[0].len()
    }
}

/// A complete MLSAG signature over one input's ring.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MgSig {
    /// `ss[col][row]`, serialized without leading sizes on the wire
    /// (`mixin+1` columns of `rows` scalars each).
    pub ss: Vec<Vec<Scalar>>,
    /// The challenge that closes the ring, `cc = c_0`.
    pub cc: Scalar,
}

fn challenge_hash(message: &[u8; 32], ls: &[Point], rs: &[Option<Point>]) -> Scalar {
    let mut buf = Vec::with_capacity(32 + 32 * (ls.len() + rs.len()));
    buf.extend_from_slice(message);
    for (l, r) in ls.iter().zip(rs.iter()) {
        buf.extend_from_slice(&l.to_bytes());
        if let Some(r) = r {
            buf.extend_from_slice(&r.to_bytes());
        }
    }
    Scalar::from_hash_bytes(&keccak256(&buf))
}

fn row_lr(pubkey: Point, key_image: Option<&KeyImage>, s: Scalar, c: Scalar) -> (Point, Option<Point>) {
    let l = (s * G) + (c * pubkey);
    let r = key_image.map(|ki| (s * pubkey.hash_to_point()) + (c * ki.as_point()));
    (l, r)
}

/// Sign `message` (typically the RingCT "full message") over `ring`,
/// proving knowledge of `secrets[row]` at `real_index` for every row,
/// and that the key-image rows' key images are correctly derived.
///
/// `key_images[row]` is `Some` for rows that carry a linkable key image
/// (the spend-key row) and `None` for rows that are a plain Schnorr-style
/// proof of knowledge with no linkability (the commitment row in Simple
/// RCT). `nonces[row]` are the per-row random scalars (`alpha`) sampled
/// for the real index; the caller supplies them so the device can derive
/// them deterministically from its key schedule rather than holding
/// fresh entropy across a host round-trip.
pub fn mlsag_sign<R: RngCore + CryptoRng>(
    message: &[u8; 32],
    ring: &MlsagRing,
    real_index: usize,
    secrets: &[Scalar],
    key_images: &[Option<KeyImage>],
    nonces: &[Scalar],
    rng: &mut R,
) -> Result<MgSig, Error> {
    let cols = ring.len();
    let rows = ring.rows();
    if real_index >= cols {
        return Err(Error::IndexOutOfBounds);
    }
    if secrets.len() != rows || key_images.len() != rows || nonces.len() != rows {
        return Err(Error::LengthMismatch(secrets.len(), rows));
    }

    let mut ss: Vec<Vec<Scalar>> = vec![vec![Scalar::zero(); rows]; cols];
    let mut c: Vec<Scalar> = vec![Scalar::zero(); cols];

    // Seed the ring just past the real index using the true nonces.
    let real_ls: Vec<Point> = (0..rows)
        .map(|r| (nonces[r] * G))
        .collect();
    let real_rs: Vec<Option<Point>> = (0..rows)
        .map(|r| key_images[r].as_ref().map(|_| nonces[r] * ring.columns[real_index][r].hash_to_point()))
        .collect();
    let mut idx = (real_index + 1) % cols;
    c[idx] = challenge_hash(message, &real_ls, &real_rs);

    while idx != real_index {
        for r in 0..rows {
            ss[idx][r] = Scalar::random(rng);
        }
        let lrs: Vec<(Point, Option<Point>)> = (0..rows)
            .map(|r| row_lr(ring.columns[idx][r], key_images[r].as_ref(), ss[idx][r], c[idx]))
            .collect();
        let ls: Vec<Point> = lrs.iter().map(|(l, _)| *l).collect();
        let rs: Vec<Option<Point>> = lrs.iter().map(|(_, r)| *r).collect();
        let next = (idx + 1) % cols;
        c[next] = challenge_hash(message, &ls, &rs);
        idx = next;
    }

    for r in 0..rows {
        ss[real_index][r] = nonces[r] - (c[real_index] * secrets[r]);
    }

    Ok(MgSig { ss, cc: c[0] })
}

/// Verify an [`MgSig`] produced by [`mlsag_sign`].
pub fn mlsag_verify(
    message: &[u8; 32],
    ring: &MlsagRing,
    key_images: &[Option<KeyImage>],
    sig: &MgSig,
) -> Result<(), Error> {
    let cols = ring.len();
    let rows = ring.rows();
    if sig.ss.len() != cols || key_images.len() != rows {
        return Err(Error::InvalidSignature);
    }
    if sig.ss.iter().any(|row| row.len() != rows) {
        return Err(Error::InvalidSignature);
    }

    let mut c = sig.cc;
    for col in 0..cols {
        let lrs: Vec<(Point, Option<Point>)> = (0..rows)
            .map(|r| row_lr(ring.columns[col][r], key_images[r].as_ref(), sig.ss[col][r], c))
            .collect();
        let ls: Vec<Point> = lrs.iter().map(|(l, _)| *l).collect();
        let rs: Vec<Option<Point>> = lrs.iter().map(|(_, r)| *r).collect();
        c = challenge_hash(message, &ls, &rs);
    }

    if c == sig.cc {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}
