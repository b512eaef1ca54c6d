#![forbid(unsafe_code)]

//! Per-round state and the commit / reveal / recover transitions.
//!
//! Commitments are `c = g^a mod n` for a secret `a`. Because the setup proves
//! `h = g^(2^T)`, a participant's contribution `h^a` equals `c^(2^T)`, which a
//! recoverer can compute from the commitment alone with `T` squarings. The
//! round output is
//!
//! ```text
//! omega = prod_i contribution_i ^ w_i  (mod n)
//! w_i   = H("weight", c_i, bStar),  bStar = H("bstar", c_0, c_1, ...)
//! ```
//!
//! The stage is a pure function of the setup and `now`; every transition
//! validates first and mutates last, so a failed call leaves no trace.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::bignum::BigNumber;
use crate::crypto::kmac::kmac256_hash;
use crate::error::{BeaconError, RecoveryFault, Result};
use crate::modarith::{mul_mod, pow_mod};
use crate::vdf::{self, VdfClaim, VdfError};

const BSTAR_LABEL: &[u8] = b"CR.round.bstar.v1";
const WEIGHT_LABEL: &[u8] = b"CR.round.weight.v1";

/// 20-byte account address.
pub type Address = [u8; 20];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Commit,
    Reveal,
    /// Reveal window closed: eligible for (or already past) finalisation.
    Completed,
}

/// Immutable public parameters of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRecord {
    pub n: BigNumber,
    pub g: BigNumber,
    pub h: BigNumber,
    #[serde(rename = "T")]
    pub t: u64,
    pub start_time: u64,
    pub commit_duration: u64,
    pub commit_reveal_duration: u64,
    #[serde(with = "hex_address")]
    pub recoverer: Address,
}

impl SetupRecord {
    #[inline]
    pub fn commit_deadline(&self) -> u64 {
        self.start_time.saturating_add(self.commit_duration)
    }

    #[inline]
    pub fn reveal_deadline(&self) -> u64 {
        self.start_time.saturating_add(self.commit_reveal_duration)
    }
}

/// Stage of a round at time `now`.
pub fn derive_stage(setup: &SetupRecord, now: u64) -> Stage {
    if now < setup.commit_deadline() {
        Stage::Commit
    } else if now < setup.reveal_deadline() {
        Stage::Reveal
    } else {
        Stage::Completed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    #[serde(with = "hex_address")]
    pub address: Address,
    pub commitment: BigNumber,
    /// The secret `a` for a direct reveal, or the VDF output `c^(2^T)` for a
    /// recovered participant.
    pub revealed_value: Option<BigNumber>,
    pub committed: bool,
    pub revealed: bool,
    pub recovered: bool,
    pub index: u32,
}

/// `userInfosAtRound` view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub index: u32,
    pub committed: bool,
    pub revealed: bool,
}

/// `valuesAtRound` view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundValues {
    pub n: BigNumber,
    pub g: BigNumber,
    pub h: BigNumber,
    #[serde(rename = "T")]
    pub t: u64,
    pub omega: Option<BigNumber>,
    pub recovered_omega: Option<BigNumber>,
    #[serde(with = "hex_opt32")]
    pub b_star: Option<[u8; 32]>,
    pub num_of_participants: u32,
    pub is_completed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundState {
    pub round: u64,
    pub setup: SetupRecord,
    pub participants: Vec<ParticipantRecord>,
    pub omega: Option<BigNumber>,
    pub recovered_omega: Option<BigNumber>,
    #[serde(with = "hex_opt32")]
    pub b_star: Option<[u8; 32]>,
    pub is_completed: bool,
    #[serde(skip)]
    index_of: HashMap<Address, u32>,
}

impl RoundState {
    pub fn new(round: u64, setup: SetupRecord) -> Self {
        Self {
            round,
            setup,
            participants: Vec::new(),
            omega: None,
            recovered_omega: None,
            b_star: None,
            is_completed: false,
            index_of: HashMap::new(),
        }
    }

    #[inline]
    pub fn stage(&self, now: u64) -> Stage {
        derive_stage(&self.setup, now)
    }

    #[inline]
    pub fn num_of_participants(&self) -> u32 {
        self.participants.len() as u32
    }

    pub fn participant(&self, who: &Address) -> Option<&ParticipantRecord> {
        self.index_of.get(who).map(|&i| &self.participants[i as usize])
    }

    pub fn user_info(&self, who: &Address) -> UserInfo {
        self.participant(who)
            .map(|p| UserInfo { index: p.index, committed: p.committed, revealed: p.revealed })
            .unwrap_or_default()
    }

    pub fn values(&self) -> RoundValues {
        RoundValues {
            n: self.setup.n.clone(),
            g: self.setup.g.clone(),
            h: self.setup.h.clone(),
            t: self.setup.t,
            omega: self.omega.clone(),
            recovered_omega: self.recovered_omega.clone(),
            b_star: self.b_star,
            num_of_participants: self.num_of_participants(),
            is_completed: self.is_completed,
        }
    }

    /// Finalised output: `omega`, or `recoveredOmega` for a recovered round.
    pub fn output(&self) -> Option<&BigNumber> {
        self.omega.as_ref().or(self.recovered_omega.as_ref())
    }

    /// Participants that have not revealed, in commit-index order.
    pub fn missing(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.participants.iter().filter(|p| !p.revealed)
    }

    fn require_stage(&self, expected: Stage, now: u64) -> Result<()> {
        let actual = self.stage(now);
        if actual != expected {
            return Err(BeaconError::FunctionInvalidAtThisStage { expected, actual });
        }
        Ok(())
    }

    fn require_finalizable(&self, now: u64) -> Result<()> {
        self.require_stage(Stage::Completed, now)?;
        if self.is_completed {
            return Err(BeaconError::AlreadyFinalized(self.round));
        }
        Ok(())
    }

    pub fn commit(&mut self, who: Address, commitment: BigNumber, now: u64) -> Result<u32> {
        self.require_stage(Stage::Commit, now)?;
        if self.index_of.contains_key(&who) {
            return Err(BeaconError::AlreadyCommitted);
        }
        let c = commitment.decode();
        if c.is_zero() || c >= self.setup.n.decode() {
            return Err(BeaconError::InvalidCommitment);
        }

        let index = self.num_of_participants();
        self.participants.push(ParticipantRecord {
            address: who,
            commitment: BigNumber::from(&c),
            revealed_value: None,
            committed: true,
            revealed: false,
            recovered: false,
            index,
        });
        self.index_of.insert(who, index);
        Ok(index)
    }

    pub fn reveal(&mut self, who: Address, value: BigNumber, now: u64) -> Result<()> {
        self.require_stage(Stage::Reveal, now)?;
        let index = *self.index_of.get(&who).ok_or(BeaconError::NotCommitted)? as usize;
        let record = &self.participants[index];
        if record.revealed {
            return Err(BeaconError::AlreadyRevealed);
        }
        let a = value.decode();
        let bound = pow_mod(&self.setup.g.decode(), &a, &self.setup.n.decode())?;
        if bound != record.commitment.decode() {
            return Err(BeaconError::CommitmentMismatch);
        }

        let record = &mut self.participants[index];
        record.revealed_value = Some(BigNumber::from(a));
        record.revealed = true;
        Ok(())
    }

    pub fn calculate_omega(&mut self, now: u64) -> Result<BigNumber> {
        self.require_finalizable(now)?;
        if self.participants.is_empty() {
            return Err(BeaconError::NoParticipants);
        }
        let missing = self.missing().count();
        if missing > 0 {
            return Err(BeaconError::IncompleteReveals { missing });
        }

        let n = self.setup.n.decode();
        let h = self.setup.h.decode();
        let contributions = self
            .participants
            .iter()
            .map(|p| {
                let a = p.revealed_value.as_ref().map(BigNumber::decode).unwrap_or_default();
                pow_mod(&h, &a, &n)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let b_star = b_star(&self.participants);
        let omega = BigNumber::from(fold_omega(&self.participants, &contributions, &b_star, &n)?);

        self.b_star = Some(b_star);
        self.omega = Some(omega.clone());
        self.is_completed = true;
        Ok(omega)
    }

    /// Finalise with one proof per non-revealed participant, in commit-index
    /// order. Either every proof verifies and the round completes, or nothing
    /// changes.
    pub fn recover(&mut self, proofs: &[VdfClaim], now: u64) -> Result<BigNumber> {
        self.require_finalizable(now)?;
        let missing: Vec<usize> = self.missing().map(|p| p.index as usize).collect();
        if missing.is_empty() {
            return Err(BeaconError::NothingToRecover);
        }
        if proofs.len() > missing.len() {
            return Err(BeaconError::RecoveryProofMismatch {
                index: missing.len(),
                reason: RecoveryFault::Extra(proofs.len() - missing.len()),
            });
        }

        let n = self.setup.n.decode();
        let mut recovered = Vec::with_capacity(missing.len());
        for (k, &i) in missing.iter().enumerate() {
            let claim = proofs
                .get(k)
                .ok_or(BeaconError::RecoveryProofMismatch { index: k, reason: RecoveryFault::Missing })?;
            self.check_recovery_claim(&self.participants[i], claim, &n)
                .map_err(|e| BeaconError::RecoveryProofMismatch { index: k, reason: e.into() })?;
            recovered.push(BigNumber::from(claim.y.decode()));
        }

        let h = self.setup.h.decode();
        let mut contributions = Vec::with_capacity(self.participants.len());
        let mut next = recovered.iter();
        for p in &self.participants {
            let c = if p.revealed {
                let a = p.revealed_value.as_ref().map(BigNumber::decode).unwrap_or_default();
                pow_mod(&h, &a, &n)?
            } else {
                next.next().map(BigNumber::decode).unwrap_or_default()
            };
            contributions.push(c);
        }

        let b_star = b_star(&self.participants);
        let omega = BigNumber::from(fold_omega(&self.participants, &contributions, &b_star, &n)?);

        for (&i, y) in missing.iter().zip(recovered) {
            let record = &mut self.participants[i];
            record.revealed_value = Some(y);
            record.revealed = true;
            record.recovered = true;
        }
        self.b_star = Some(b_star);
        self.recovered_omega = Some(omega.clone());
        self.is_completed = true;
        Ok(omega)
    }

    fn check_recovery_claim(
        &self,
        participant: &ParticipantRecord,
        claim: &VdfClaim,
        n: &BigUint,
    ) -> std::result::Result<(), VdfError> {
        if claim.t != self.setup.t {
            return Err(VdfError::DelayMismatch { expected: self.setup.t, actual: claim.t });
        }
        if claim.x.decode() != participant.commitment.decode() {
            return Err(VdfError::BaseMismatch);
        }
        vdf::check_claim(claim, n)
    }
}

/// Digest binding every commitment of the round, in commit-index order.
pub fn b_star(participants: &[ParticipantRecord]) -> [u8; 32] {
    let parts: Vec<&[u8]> = participants.iter().map(|p| p.commitment.as_bytes()).collect();
    kmac256_hash(BSTAR_LABEL, &parts)
}

pub fn weight(commitment: &BigNumber, b_star: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_be(&kmac256_hash(WEIGHT_LABEL, &[commitment.as_bytes(), b_star]))
}

fn fold_omega(
    participants: &[ParticipantRecord],
    contributions: &[BigUint],
    b_star: &[u8; 32],
    n: &BigUint,
) -> std::result::Result<BigUint, crate::modarith::ArithError> {
    let mut acc = BigUint::one();
    for (p, contribution) in participants.iter().zip(contributions) {
        let term = pow_mod(contribution, &weight(&p.commitment, b_star), n)?;
        acc = mul_mod(&acc, &term, n)?;
    }
    Ok(acc)
}

mod hex_address {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Address;

    pub fn serialize<S: Serializer>(addr: &Address, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(addr)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("address must be 20 bytes"))
    }
}

mod hex_opt32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(b) => s.serialize_some(&format!("0x{}", hex::encode(b))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("digest must be 32 bytes"))
    }
}
