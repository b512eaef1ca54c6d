#![forbid(unsafe_code)]

//! Modular arithmetic over a public RSA-style modulus.
//!
//! Two layers: `*_mod` functions on raw `BigUint` used by the hot VDF paths,
//! and `mod_*` functions on canonical [`BigNumber`] values for callers that
//! hold encoded operands. All results lie in `[0, n)`.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use thiserror::Error;

use crate::bignum::BigNumber;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    #[error("modulus must be non-zero")]
    InvalidModulus,
}

#[inline]
fn check_modulus(n: &BigUint) -> Result<(), ArithError> {
    if n.is_zero() {
        return Err(ArithError::InvalidModulus);
    }
    Ok(())
}

/// `a * b mod n`
pub fn mul_mod(a: &BigUint, b: &BigUint, n: &BigUint) -> Result<BigUint, ArithError> {
    check_modulus(n)?;
    Ok((a * b) % n)
}

/// `base ^ exponent mod n` with an exponent of any width.
pub fn pow_mod(base: &BigUint, exponent: &BigUint, n: &BigUint) -> Result<BigUint, ArithError> {
    check_modulus(n)?;
    if n.is_one() {
        return Ok(BigUint::zero());
    }
    Ok(base.modpow(exponent, n))
}

/// `base ^ (2 ^ squarings) mod n` by `squarings` sequential squarings.
///
/// This is the delay function itself; it cannot be shortcut without the
/// factorization of `n`.
pub fn pow2_mod(base: &BigUint, squarings: u64, n: &BigUint) -> Result<BigUint, ArithError> {
    check_modulus(n)?;
    let mut acc = base % n;
    for _ in 0..squarings {
        acc = (&acc * &acc) % n;
    }
    Ok(acc)
}

pub fn mod_mul(a: &BigNumber, b: &BigNumber, n: &BigNumber) -> Result<BigNumber, ArithError> {
    mul_mod(&a.decode(), &b.decode(), &n.decode()).map(BigNumber::from)
}

pub fn mod_exp(base: &BigNumber, exponent: &BigNumber, n: &BigNumber) -> Result<BigNumber, ArithError> {
    pow_mod(&base.decode(), &exponent.decode(), &n.decode()).map(BigNumber::from)
}

/// [`mod_exp`] for the exponent `2^squarings`, where the number of squarings
/// is known up front.
pub fn mod_exp_with_known_squarings(
    base: &BigNumber,
    squarings: u64,
    n: &BigNumber,
) -> Result<BigNumber, ArithError> {
    pow2_mod(&base.decode(), squarings, &n.decode()).map(BigNumber::from)
}
