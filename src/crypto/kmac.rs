//! KMAC256 helpers built on top of SHAKE256.
//!
//! Every hash in the beacon goes through here: Wesolowski challenges,
//! aggregation weights, the commitment digest (`bStar`) and event digests.
//! Each input is length-prefixed so `["ab", "c"]` and `["a", "bc"]` never
//! collide.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};

const KMAC_DOMAIN: &[u8] = b"CR-KMAC256.v1";

fn write_len_prefixed(hasher: &mut Shake256, data: &[u8]) {
    let len = data.len() as u64;
    hasher.update(&len.to_le_bytes());
    hasher.update(data);
}

fn kmac256_fill(label: &[u8], inputs: &[&[u8]], out: &mut [u8]) {
    let mut hasher = Shake256::default();
    hasher.update(KMAC_DOMAIN);
    write_len_prefixed(&mut hasher, label);
    hasher.update(&(inputs.len() as u64).to_le_bytes());
    for input in inputs {
        write_len_prefixed(&mut hasher, input);
    }

    let mut reader = hasher.finalize_xof();
    reader.read(out);
}

/// KMAC256 hash (domain label, length-prefixed inputs) with 32-byte output.
#[inline]
pub fn kmac256_hash(label: &[u8], inputs: &[&[u8]]) -> [u8; 32] {
    let mut out = [0u8; 32];
    kmac256_fill(label, inputs, &mut out);
    out
}

/// Variable-length output in XOF mode.
pub fn kmac256_xof(label: &[u8], inputs: &[&[u8]], out_len: usize) -> Vec<u8> {
    if out_len == 0 {
        return Vec::new();
    }
    let mut out = vec![0u8; out_len];
    kmac256_fill(label, inputs, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let h1 = kmac256_hash(b"CR-TEST", &[b"hello", b"world"]);
        let h2 = kmac256_hash(b"CR-TEST", &[b"hello", b"world"]);
        assert_eq!(h1, h2);
        assert_ne!(h1, [0u8; 32]);
    }

    #[test]
    fn hash_changes_with_label() {
        let h1 = kmac256_hash(b"CR-TEST-A", &[b"data"]);
        let h2 = kmac256_hash(b"CR-TEST-B", &[b"data"]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn inputs_are_length_prefixed() {
        let h1 = kmac256_hash(b"CR-TEST", &[b"ab", b"c"]);
        let h2 = kmac256_hash(b"CR-TEST", &[b"a", b"bc"]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn xof_prefix_matches_hash() {
        let long = kmac256_xof(b"CR-TEST", &[b"x"], 64);
        assert_eq!(long.len(), 64);
        assert_eq!(&long[..32], &kmac256_hash(b"CR-TEST", &[b"x"])[..]);
    }

    #[test]
    fn xof_zero_len_is_empty() {
        assert!(kmac256_xof(b"CR-TEST", &[b"x"], 0).is_empty());
    }
}
