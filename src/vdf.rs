#![forbid(unsafe_code)]

//! Wesolowski VDF over an RSA group.
//!
//! A claim `(x, y, T, v)` states `y = x^(2^T) mod n`. The verifier derives a
//! 256-bit prime challenge `l = H(x, y, T)`, sets `r = 2^T mod l` and checks
//!
//! ```text
//! v^l * x^r == y  (mod n)
//! ```
//!
//! which costs two exponentiations by numbers smaller than `l`, independent
//! of `T`. The prover side ([`eval`], [`prove`]) needs `T` sequential
//! squarings and is used by recoverers and tests.
//!
//! Every check fails closed; [`verify`] collapses all failures to `false`
//! and [`check`] reports which one fired.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bignum::BigNumber;
use crate::crypto::kmac::kmac256_hash;
use crate::modarith::{pow2_mod, pow_mod, ArithError};

const CHALLENGE_LABEL: &[u8] = b"CR.vdf.challenge.v1";

/// Bit length of the Fiat-Shamir prime `l`.
pub const CHALLENGE_BITS: u32 = 256;

/// Miller-Rabin witnesses; also used for trial division.
const SMALL_PRIMES: [u32; 24] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VdfError {
    #[error("modulus must be greater than one")]
    InvalidModulus,

    #[error("delay parameter T must be positive")]
    ZeroDelay,

    #[error("claim field `{0}` is not reduced modulo n")]
    OutOfRange(&'static str),

    #[error("claim base does not match the expected base")]
    BaseMismatch,

    #[error("claim output does not match the expected output")]
    OutputMismatch,

    #[error("claim delay {actual} does not match expected delay {expected}")]
    DelayMismatch { expected: u64, actual: u64 },

    #[error("base is degenerate (0 or 1)")]
    DegenerateBase,

    #[error("setup segments do not chain: segment {0} starts where the previous one did not end")]
    BrokenChain(usize),

    #[error("no claims supplied")]
    Empty,

    #[error("proof equation does not hold")]
    Rejected,
}

impl From<ArithError> for VdfError {
    fn from(_: ArithError) -> Self {
        VdfError::InvalidModulus
    }
}

/// Wesolowski claim `y = x^(2^T) mod n` with witness `v`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdfClaim {
    pub x: BigNumber,
    pub y: BigNumber,
    #[serde(rename = "T")]
    pub t: u64,
    pub v: BigNumber,
}

impl VdfClaim {
    pub fn new(x: &BigUint, y: &BigUint, t: u64, v: &BigUint) -> Self {
        Self { x: x.into(), y: y.into(), t, v: v.into() }
    }
}

pub fn is_probable_prime(n: &BigUint) -> bool {
    let one = BigUint::one();
    if n <= &one {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let n_minus_1 = n - &one;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;

    'witness: for a in SMALL_PRIMES {
        let mut x = BigUint::from(a).modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Deterministic Fiat-Shamir prime for `(x, y, T)`.
///
/// Hashes with an increasing nonce until the candidate (top and bottom bits
/// forced on) passes Miller-Rabin.
pub fn hash_to_prime(x: &BigUint, y: &BigUint, t: u64) -> BigUint {
    let x = BigNumber::from(x);
    let y = BigNumber::from(y);
    let t_be = t.to_be_bytes();
    let high = BigUint::one() << (CHALLENGE_BITS - 1);
    let mut nonce = 0u64;
    loop {
        let h = kmac256_hash(
            CHALLENGE_LABEL,
            &[x.as_bytes(), y.as_bytes(), &t_be, &nonce.to_be_bytes()],
        );
        let candidate = BigUint::from_bytes_be(&h) | &high | BigUint::one();
        if is_probable_prime(&candidate) {
            return candidate;
        }
        nonce += 1;
    }
}

#[inline]
fn check_modulus(n: &BigUint) -> Result<(), VdfError> {
    if n <= &BigUint::one() {
        return Err(VdfError::InvalidModulus);
    }
    Ok(())
}

/// `x^(2^T) mod n` by sequential squaring.
pub fn eval(x: &BigUint, t: u64, n: &BigUint) -> Result<BigUint, VdfError> {
    check_modulus(n)?;
    Ok(pow2_mod(x, t, n)?)
}

/// Evaluate and produce a Wesolowski proof for `x`.
///
/// The witness `v = x^floor(2^T / l)` is built bit by bit from the long
/// division of `2^T` by `l`, so `2^T` is never materialised.
pub fn prove(x: &BigUint, t: u64, n: &BigUint) -> Result<VdfClaim, VdfError> {
    check_modulus(n)?;
    if t == 0 {
        return Err(VdfError::ZeroDelay);
    }
    let x = x % n;
    let y = pow2_mod(&x, t, n)?;
    let l = hash_to_prime(&x, &y, t);

    let mut r = BigUint::one();
    let mut v = BigUint::one();
    for _ in 0..t {
        let doubled = &r << 1u32;
        let bit = doubled >= l;
        r = if bit { doubled - &l } else { doubled };
        v = (&v * &v) % n;
        if bit {
            v = (v * &x) % n;
        }
    }

    Ok(VdfClaim::new(&x, &y, t, &v))
}

/// Check a claim on its own terms: ranges and the proof equation.
pub fn check_claim(claim: &VdfClaim, n: &BigUint) -> Result<(), VdfError> {
    check_modulus(n)?;
    if claim.t == 0 {
        return Err(VdfError::ZeroDelay);
    }
    let x = claim.x.decode();
    let y = claim.y.decode();
    let v = claim.v.decode();
    if &x >= n {
        return Err(VdfError::OutOfRange("x"));
    }
    if &y >= n {
        return Err(VdfError::OutOfRange("y"));
    }
    if &v >= n {
        return Err(VdfError::OutOfRange("v"));
    }

    let l = hash_to_prime(&x, &y, claim.t);
    let r = BigUint::from(2u8).modpow(&BigUint::from(claim.t), &l);
    let lhs = (pow_mod(&v, &l, n)? * pow_mod(&x, &r, n)?) % n;
    if lhs != y {
        return Err(VdfError::Rejected);
    }
    Ok(())
}

/// Check that `claim` proves `expected_output = base^(2^T) mod modulus`.
pub fn check(
    claim: &VdfClaim,
    base: &BigUint,
    expected_output: &BigUint,
    modulus: &BigUint,
) -> Result<(), VdfError> {
    if &claim.x.decode() != base {
        return Err(VdfError::BaseMismatch);
    }
    if &claim.y.decode() != expected_output {
        return Err(VdfError::OutputMismatch);
    }
    check_claim(claim, modulus)
}

/// Fail-closed boolean form of [`check`].
pub fn verify(
    claim: &VdfClaim,
    base: &BigUint,
    expected_output: &BigUint,
    modulus: &BigUint,
) -> bool {
    check(claim, base, expected_output, modulus).is_ok()
}

/// Verify an ordered chain of segments proving `g -> h`.
///
/// Returns `(g, h, total T)` when every segment verifies and each segment
/// starts at the previous segment's output.
pub fn check_chain(claims: &[VdfClaim], n: &BigUint) -> Result<(BigUint, BigUint, u64), VdfError> {
    let first = claims.first().ok_or(VdfError::Empty)?;
    let mut total_t = 0u64;
    for (i, claim) in claims.iter().enumerate() {
        if i > 0 && claims[i - 1].y.decode() != claim.x.decode() {
            return Err(VdfError::BrokenChain(i));
        }
        check_claim(claim, n)?;
        total_t = total_t.checked_add(claim.t).ok_or(VdfError::Rejected)?;
    }
    let last = &claims[claims.len() - 1];
    Ok((first.x.decode(), last.y.decode(), total_t))
}
