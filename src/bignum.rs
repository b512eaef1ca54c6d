#![forbid(unsafe_code)]

//! Block-padded big-endian encoding of arbitrary-precision unsigned integers.
//!
//! A [`BigNumber`] is the `(bytes, bit length)` pair that goes into
//! commitments, proofs and round records. The byte form is canonical: the
//! shortest multiple of the block size able to hold the value (at least one
//! block), zero-padded on the left. Two encoders of the same value always
//! produce identical bytes, so hashes over encoded values agree everywhere.

use core::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default block granularity in bytes.
pub const BLOCK_SIZE: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("block size must be non-zero")]
    ZeroBlockSize,

    #[error("{len} bytes cannot hold a {bitlen}-bit value")]
    Truncated { len: usize, bitlen: u32 },

    #[error("byte length {len} is not a multiple of the {block_size}-byte block")]
    Misaligned { len: usize, block_size: usize },

    #[error("declared bit length {declared} but value has {actual} bits")]
    BitLengthMismatch { declared: u32, actual: u32 },

    #[error("padding is not minimal: {len} bytes for a {bitlen}-bit value")]
    ExcessPadding { len: usize, bitlen: u32 },

    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Byte length of the canonical encoding of a `bitlen`-bit value.
#[inline]
pub fn padded_len(bitlen: u32, block_size: usize) -> usize {
    let bytes = (bitlen as usize + 7) / 8;
    bytes.div_ceil(block_size).max(1) * block_size
}

#[inline]
fn bit_length(value: &BigUint) -> u32 {
    value.bits() as u32
}

/// Arbitrary-precision unsigned integer in canonical block-padded form.
///
/// Immutable; every constructor validates the layout so a `BigNumber` in hand
/// always satisfies `bitlen == bits(value)` and `len == padded_len(bitlen)`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBigNumber", into = "RawBigNumber")]
pub struct BigNumber {
    val: Vec<u8>,
    bitlen: u32,
}

impl BigNumber {
    /// Encode `value` with the given block granularity.
    pub fn encode(value: &BigUint, block_size: usize) -> Result<Self, EncodingError> {
        if block_size == 0 {
            return Err(EncodingError::ZeroBlockSize);
        }
        Ok(Self::pad(value, block_size))
    }

    /// Encode with the default 32-byte block.
    pub fn from_biguint(value: &BigUint) -> Self {
        Self::pad(value, BLOCK_SIZE)
    }

    // block_size > 0
    fn pad(value: &BigUint, block_size: usize) -> Self {
        let bitlen = bit_length(value);
        let mut val = vec![0u8; padded_len(bitlen, block_size)];
        if !value.is_zero() {
            let raw = value.to_bytes_be();
            let offset = val.len() - raw.len();
            val[offset..].copy_from_slice(&raw);
        }
        Self { val, bitlen }
    }

    /// Rebuild from an externally supplied `(bytes, bitlen)` pair.
    ///
    /// Rejects anything that is not exactly what [`BigNumber::encode`] would
    /// produce for the same value and block size.
    pub fn from_parts(val: Vec<u8>, bitlen: u32, block_size: usize) -> Result<Self, EncodingError> {
        if block_size == 0 {
            return Err(EncodingError::ZeroBlockSize);
        }
        if val.len() % block_size != 0 || val.is_empty() {
            return Err(EncodingError::Misaligned { len: val.len(), block_size });
        }
        decode_parts(&val, bitlen)?;
        if val.len() != padded_len(bitlen, block_size) {
            return Err(EncodingError::ExcessPadding { len: val.len(), bitlen });
        }
        Ok(Self { val, bitlen })
    }

    pub fn decode(&self) -> BigUint {
        BigUint::from_bytes_be(&self.val)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.val
    }

    #[inline]
    pub fn bitlen(&self) -> u32 {
        self.bitlen
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.val.len()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.bitlen == 0
    }

    /// `0x`-prefixed hex of the padded bytes.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.val))
    }

    /// Parse a hex string (optional `0x`, any padding) and re-encode canonically.
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        Ok(Self::from_biguint(&parse_hex(s)?))
    }
}

/// Decode a raw `(bytes, bitlen)` pair, checking the declared bit length.
pub fn decode_parts(val: &[u8], bitlen: u32) -> Result<BigUint, EncodingError> {
    if (val.len() as u64) * 8 < u64::from(bitlen) {
        return Err(EncodingError::Truncated { len: val.len(), bitlen });
    }
    let value = BigUint::from_bytes_be(val);
    let actual = bit_length(&value);
    if actual != bitlen {
        return Err(EncodingError::BitLengthMismatch { declared: bitlen, actual });
    }
    Ok(value)
}

pub fn parse_hex(s: &str) -> Result<BigUint, EncodingError> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| EncodingError::Hex(s.to_string()))
}

impl From<&BigUint> for BigNumber {
    fn from(value: &BigUint) -> Self {
        Self::from_biguint(value)
    }
}

impl From<BigUint> for BigNumber {
    fn from(value: BigUint) -> Self {
        Self::from_biguint(&value)
    }
}

impl From<u64> for BigNumber {
    fn from(value: u64) -> Self {
        Self::from_biguint(&BigUint::from(value))
    }
}

impl From<&BigNumber> for BigUint {
    fn from(value: &BigNumber) -> Self {
        value.decode()
    }
}

impl fmt::Debug for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigNumber({}, bitlen={})", self.to_hex(), self.bitlen)
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Wire form: `{ "val": "0x…", "bitlen": n }`.
#[derive(Serialize, Deserialize)]
struct RawBigNumber {
    val: String,
    bitlen: u32,
}

impl TryFrom<RawBigNumber> for BigNumber {
    type Error = EncodingError;

    fn try_from(raw: RawBigNumber) -> Result<Self, Self::Error> {
        let digits = raw.val.trim_start_matches("0x");
        let val = hex::decode(digits).map_err(|e| EncodingError::Hex(e.to_string()))?;
        BigNumber::from_parts(val, raw.bitlen, BLOCK_SIZE)
    }
}

impl From<BigNumber> for RawBigNumber {
    fn from(n: BigNumber) -> Self {
        RawBigNumber { val: n.to_hex(), bitlen: n.bitlen }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;
    use proptest::prelude::*;

    #[test]
    fn zero_takes_one_block() {
        let z = BigNumber::from_biguint(&BigUint::zero());
        assert_eq!(z.bitlen(), 0);
        assert_eq!(z.as_bytes(), &[0u8; 32][..]);
        assert!(z.is_zero());
        assert_eq!(z.decode(), BigUint::zero());
    }

    #[test]
    fn block_boundaries() {
        let full = (BigUint::one() << 256u32) - BigUint::one();
        let n = BigNumber::from_biguint(&full);
        assert_eq!(n.bitlen(), 256);
        assert_eq!(n.byte_len(), 32);

        let over = BigUint::one() << 256u32;
        let n = BigNumber::from_biguint(&over);
        assert_eq!(n.bitlen(), 257);
        assert_eq!(n.byte_len(), 64);
        assert_eq!(n.as_bytes()[31], 1);
        assert!(n.as_bytes()[..31].iter().all(|b| *b == 0));
        assert_eq!(n.decode(), over);
    }

    #[test]
    fn custom_block_size() {
        let v = BigUint::from(0x1_0000u32);
        let n = BigNumber::encode(&v, 2).unwrap();
        assert_eq!(n.as_bytes(), &[0, 1, 0, 0]);
        assert_eq!(n.bitlen(), 17);
        assert_eq!(BigNumber::encode(&v, 0), Err(EncodingError::ZeroBlockSize));
    }

    #[test]
    fn encoders_agree_byte_for_byte() {
        let v = BigUint::parse_bytes(b"deadbeef", 16).unwrap();
        let a = BigNumber::encode(&v, BLOCK_SIZE).unwrap();
        let b = BigNumber::from_hex("0x00000000deadbeef").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(BigNumber::from_biguint(&v), a);
        assert_eq!(BigNumber::encode(&v, 0), Err(EncodingError::ZeroBlockSize));
    }

    #[test]
    fn from_parts_rejects_malformed() {
        let ok = BigNumber::from_biguint(&BigUint::from(5u8));
        let back = BigNumber::from_parts(ok.as_bytes().to_vec(), 3, BLOCK_SIZE).unwrap();
        assert_eq!(back, ok);

        assert!(matches!(
            BigNumber::from_parts(vec![0u8; 31], 3, BLOCK_SIZE),
            Err(EncodingError::Misaligned { .. })
        ));
        let mut padded = vec![0u8; 64];
        padded[63] = 5;
        assert!(matches!(
            BigNumber::from_parts(padded, 3, BLOCK_SIZE),
            Err(EncodingError::ExcessPadding { .. })
        ));
        assert!(matches!(
            BigNumber::from_parts(ok.as_bytes().to_vec(), 4, BLOCK_SIZE),
            Err(EncodingError::BitLengthMismatch { declared: 4, actual: 3 })
        ));
    }

    #[test]
    fn decode_parts_rejects_short_bytes() {
        assert_eq!(
            decode_parts(&[0xff; 2], 17),
            Err(EncodingError::Truncated { len: 2, bitlen: 17 })
        );
    }

    #[test]
    fn json_wire_form() {
        let n = BigNumber::from(0x0102u64);
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("\"bitlen\":9"));
        let back: BigNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);

        let bad = r#"{"val":"0x0102","bitlen":9}"#;
        assert!(serde_json::from_str::<BigNumber>(bad).is_err());
    }

    #[test]
    fn parse_hex_accepts_prefix_and_empty() {
        assert_eq!(parse_hex("0x10").unwrap(), BigUint::from(16u8));
        assert_eq!(parse_hex("ff").unwrap(), BigUint::from(255u8));
        assert_eq!(parse_hex("0x").unwrap(), BigUint::zero());
        assert!(parse_hex("0xzz").is_err());
    }

    proptest! {
        #[test]
        fn encode_decode_identity(bytes in prop::collection::vec(any::<u8>(), 0..130)) {
            let v = BigUint::from_bytes_be(&bytes);
            let n = BigNumber::from_biguint(&v);
            prop_assert_eq!(n.byte_len() % BLOCK_SIZE, 0);
            prop_assert_eq!(n.byte_len(), padded_len(n.bitlen(), BLOCK_SIZE));
            prop_assert_eq!(n.decode(), v);
        }
    }
}
