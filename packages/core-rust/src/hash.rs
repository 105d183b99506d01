//! Consistent-hash utilities for the ring.
//!
//! `consistent_hash` maps an arbitrary byte string onto `[0, 1)`: it MD5s the
//! input, folds the digest's sixteen bytes into eight base-13 weighted digit
//! pairs, and reduces modulo 32497. The exact algorithm is a substitutable
//! implementation detail; what matters is that it is deterministic and
//! approximately uniform over repeated calls.

use md5::{Digest, Md5};

const BASE: u64 = 13;
const MODULO: u64 = 32_497;

/// Computes the consistent hash of `msg`, returning a value in `[0, 1)`.
///
/// Deterministic and stable across processes: the same bytes always hash
/// to the same float, on any machine, in any process.
#[must_use]
pub fn consistent_hash(msg: &[u8]) -> f64 {
    let digest = Md5::digest(msg);

    let mut sum: u64 = 0;
    let mut base: u64 = 1;
    let mut i = 0;
    while i < digest.len() - 1 {
        let pair = u64::from(digest[i]) + u64::from(digest[i + 1]) * 16;
        sum += base * pair;
        base *= BASE;
        i += 2;
    }

    (sum % MODULO) as f64 / MODULO as f64
}

/// Hashes a string key, a thin wrapper over [`consistent_hash`].
#[must_use]
pub fn hash_str(key: &str) -> f64 {
    consistent_hash(key.as_bytes())
}

/// Modulus for integral keys: integers are already uniform under a simple
/// modulo, so there is no need to route them through MD5.
const INT_MODULO: i64 = 33_457;

/// Hashes a signed integer key into `[0, 1)`.
#[must_use]
pub fn hash_int(key: i64) -> f64 {
    let m = key.rem_euclid(INT_MODULO);
    m as f64 / INT_MODULO as f64
}
