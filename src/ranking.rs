#![forbid(unsafe_code)]

//! Winner selection over a finalised round.
//!
//! Each participant scores `|address mod n - output|`; the smallest score
//! wins and ties go to the lower commit index.

use num_bigint::BigUint;

use crate::round::{Address, RoundState};

/// Distance between `address mod n` and the round output.
pub fn point(address: &Address, output: &BigUint, n: &BigUint) -> BigUint {
    let a = BigUint::from_bytes_be(address) % n;
    if a >= *output {
        a - output
    } else {
        output - a
    }
}

/// Scores in commit-index order, or `None` while the round is not finalised.
pub fn rank_points(round: &RoundState) -> Option<Vec<(Address, BigUint)>> {
    let output = round.output()?.decode();
    let n = round.setup.n.decode();
    Some(
        round
            .participants
            .iter()
            .map(|p| (p.address, point(&p.address, &output, &n)))
            .collect(),
    )
}

pub fn winner(round: &RoundState) -> Option<Address> {
    rank_points(round)?
        .into_iter()
        .enumerate()
        .min_by(|(i, (_, a)), (j, (_, b))| a.cmp(b).then(i.cmp(j)))
        .map(|(_, (addr, _))| addr)
}
