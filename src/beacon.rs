#![forbid(unsafe_code)]

//! Commit-reveal-recover beacon controller.
//!
//! [`CommitRecover`] owns the [`RoundLedger`] and a [`Clock`]. Every entry
//! point reads the clock once, derives the stage of the active round from
//! it, and either applies the whole operation or returns an error with the
//! ledger unchanged.

use num_traits::One;
use tracing::{debug, info, warn};

use crate::bignum::BigNumber;
use crate::clock::{Clock, SystemClock};
use crate::error::{BeaconError, Result};
use crate::ledger::{RoundLedger, StartEvent};
use crate::ranking;
use crate::round::{Address, ParticipantRecord, RoundState, RoundValues, SetupRecord, Stage, UserInfo};
use crate::vdf::{self, VdfClaim, VdfError};

fn logged<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(op, kind = ?e.kind(), retryable = e.is_retryable(), "rejected: {e}");
    }
    result
}

pub struct CommitRecover<C: Clock = SystemClock> {
    clock: C,
    ledger: RoundLedger,
}

impl CommitRecover<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for CommitRecover<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> CommitRecover<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, ledger: RoundLedger::new() }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    /* ===== entry points ===== */

    /// Open a new round.
    ///
    /// `setup_proofs` must prove `h = g^(2^T) mod n`; `g` is the first
    /// segment's base, `h` the last segment's output and `T` the sum of the
    /// segment delays.
    pub fn start(
        &mut self,
        commit_duration: u64,
        commit_reveal_duration: u64,
        n: BigNumber,
        recoverer: Address,
        setup_proofs: &[VdfClaim],
    ) -> Result<StartEvent> {
        let now = self.clock.now();
        logged("start", self.try_start(now, commit_duration, commit_reveal_duration, n, recoverer, setup_proofs))
    }

    fn try_start(
        &mut self,
        now: u64,
        commit_duration: u64,
        commit_reveal_duration: u64,
        n: BigNumber,
        recoverer: Address,
        setup_proofs: &[VdfClaim],
    ) -> Result<StartEvent> {
        if commit_duration == 0 || commit_reveal_duration <= commit_duration {
            return Err(BeaconError::InvalidDuration {
                commit: commit_duration,
                commit_reveal: commit_reveal_duration,
            });
        }
        if let Some(active) = self.ledger.active() {
            let actual = active.stage(now);
            if actual != Stage::Completed {
                return Err(BeaconError::FunctionInvalidAtThisStage { expected: Stage::Completed, actual });
            }
        }

        let modulus = n.decode();
        let (g, h, t) = vdf::check_chain(setup_proofs, &modulus).map_err(BeaconError::InvalidSetupProof)?;
        if g <= num_bigint::BigUint::one() {
            return Err(BeaconError::InvalidSetupProof(VdfError::DegenerateBase));
        }

        let setup = SetupRecord {
            n,
            g: g.into(),
            h: h.into(),
            t,
            start_time: now,
            commit_duration,
            commit_reveal_duration,
            recoverer,
        };
        let (round, event) = self.ledger.append(setup);
        info!(
            round,
            start_time = now,
            commit_duration,
            commit_reveal_duration,
            n_bits = event.n.bitlen(),
            T = event.t,
            segments = setup_proofs.len(),
            "round started"
        );
        Ok(event)
    }

    pub fn commit(&mut self, commitment: BigNumber, participant: Address) -> Result<u32> {
        let now = self.clock.now();
        let result = self.active_mut().and_then(|r| {
            let index = r.commit(participant, commitment, now)?;
            debug!(round = r.round, index, participant = %hex::encode(participant), "committed");
            Ok(index)
        });
        logged("commit", result)
    }

    pub fn reveal(&mut self, revealed_value: BigNumber, participant: Address) -> Result<()> {
        let now = self.clock.now();
        let result = self.active_mut().and_then(|r| {
            r.reveal(participant, revealed_value, now)?;
            debug!(round = r.round, participant = %hex::encode(participant), "revealed");
            Ok(())
        });
        logged("reveal", result)
    }

    pub fn calculate_omega(&mut self) -> Result<BigNumber> {
        let now = self.clock.now();
        let result = self.active_mut().and_then(|r| {
            let omega = r.calculate_omega(now)?;
            info!(round = r.round, participants = r.num_of_participants(), omega = %omega, "omega calculated");
            Ok(omega)
        });
        logged("calculate_omega", result)
    }

    /// Finalise `round` with one proof per non-revealed participant, in
    /// commit-index order. Only the round's designated recoverer may call it.
    pub fn recover(&mut self, round: u64, recovery_proofs: &[VdfClaim], caller: Address) -> Result<BigNumber> {
        let now = self.clock.now();
        let current = self.ledger.current_round();
        let result = if round == 0 || round > current {
            Err(BeaconError::RoundNotFound(round))
        } else if round < current {
            Err(BeaconError::RoundSuperseded(round))
        } else {
            self.active_mut().and_then(|r| {
                if caller != r.setup.recoverer {
                    return Err(BeaconError::NotRecoverer);
                }
                let missing = r.missing().count();
                let omega = r.recover(recovery_proofs, now)?;
                info!(round, recovered = missing, omega = %omega, "round recovered");
                Ok(omega)
            })
        };
        logged("recover", result)
    }

    /* ===== read accessors ===== */

    /// Latest round number (0 before any round).
    pub fn round(&self) -> u64 {
        self.ledger.current_round()
    }

    /// Stage of the active round right now.
    pub fn stage(&self) -> Option<Stage> {
        self.ledger.active().map(|r| r.stage(self.clock.now()))
    }

    pub fn round_state(&self, round: u64) -> Result<&RoundState> {
        self.ledger.get(round).ok_or(BeaconError::RoundNotFound(round))
    }

    pub fn values_at_round(&self, round: u64) -> Result<RoundValues> {
        self.round_state(round).map(RoundState::values)
    }

    pub fn user_infos_at_round(&self, participant: &Address, round: u64) -> Result<UserInfo> {
        self.round_state(round).map(|r| r.user_info(participant))
    }

    /// The [`StartEvent`] stored when `round` was opened.
    pub fn set_up_values_at_round(&self, round: u64) -> Result<&StartEvent> {
        self.ledger.event(round).ok_or(BeaconError::RoundNotFound(round))
    }

    /// Participant record by commit index.
    pub fn participant_at(&self, round: u64, index: u32) -> Result<Option<&ParticipantRecord>> {
        self.round_state(round).map(|r| r.participants.get(index as usize))
    }

    /// Participant closest to the finalised output, if the round is finalised.
    pub fn winner_at_round(&self, round: u64) -> Result<Option<Address>> {
        self.round_state(round).map(ranking::winner)
    }

    fn active_mut(&mut self) -> Result<&mut RoundState> {
        self.ledger.active_mut().ok_or(BeaconError::RoundNotFound(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use num_bigint::BigUint;

    const T: u64 = 32;

    fn modulus() -> BigUint {
        let p = (BigUint::one() << 61u32) - BigUint::one();
        let q = (BigUint::one() << 89u32) - BigUint::one();
        p * q
    }

    fn started(clock: &ManualClock) -> (CommitRecover<ManualClock>, BigUint, BigUint) {
        let n = modulus();
        let g = BigUint::from(3u8);
        let proof = vdf::prove(&g, T, &n).unwrap();
        let mut beacon = CommitRecover::with_clock(clock.clone());
        beacon.start(10, 20, (&n).into(), [0xaa; 20], &[proof]).unwrap();
        (beacon, n, g)
    }

    #[test]
    fn start_validates_durations() {
        let clock = ManualClock::new(0);
        let n = modulus();
        let proof = vdf::prove(&BigUint::from(3u8), T, &n).unwrap();
        let mut beacon = CommitRecover::with_clock(clock);
        for (c, cr) in [(0, 10), (10, 10), (10, 5)] {
            assert_eq!(
                beacon.start(c, cr, (&n).into(), [0; 20], &[proof.clone()]),
                Err(BeaconError::InvalidDuration { commit: c, commit_reveal: cr })
            );
        }
        assert_eq!(beacon.round(), 0);
    }

    #[test]
    fn start_rejects_bad_setup_proof() {
        let n = modulus();
        let mut proof = vdf::prove(&BigUint::from(3u8), T, &n).unwrap();
        proof.v = BigNumber::from(&(proof.v.decode() ^ BigUint::one()));
        let mut beacon = CommitRecover::with_clock(ManualClock::new(0));
        assert!(matches!(
            beacon.start(10, 20, (&n).into(), [0; 20], &[proof]),
            Err(BeaconError::InvalidSetupProof(_))
        ));
        assert_eq!(
            beacon.start(10, 20, (&n).into(), [0; 20], &[]),
            Err(BeaconError::InvalidSetupProof(VdfError::Empty))
        );
        let trivial = vdf::prove(&BigUint::one(), T, &n).unwrap();
        assert_eq!(
            beacon.start(10, 20, (&n).into(), [0; 20], &[trivial]),
            Err(BeaconError::InvalidSetupProof(VdfError::DegenerateBase))
        );
        assert_eq!(beacon.round(), 0);
        assert_eq!(beacon.stage(), None);
    }

    #[test]
    fn next_round_waits_for_window() {
        let clock = ManualClock::new(50);
        let (mut beacon, n, g) = started(&clock);
        let proof = vdf::prove(&g, T, &n).unwrap();
        assert_eq!(
            beacon.start(10, 20, (&n).into(), [0xaa; 20], &[proof.clone()]),
            Err(BeaconError::FunctionInvalidAtThisStage { expected: Stage::Completed, actual: Stage::Commit })
        );
        clock.advance(20);
        let event = beacon.start(10, 20, (&n).into(), [0xaa; 20], &[proof]).unwrap();
        assert_eq!(event.round, 2);
        assert_eq!(event.start_time, 70);
        assert_eq!(beacon.stage(), Some(Stage::Commit));
    }

    #[test]
    fn calls_without_round_fail() {
        let mut beacon = CommitRecover::with_clock(ManualClock::new(0));
        assert_eq!(beacon.commit(BigNumber::from(4u64), [1; 20]), Err(BeaconError::RoundNotFound(0)));
        assert_eq!(beacon.calculate_omega(), Err(BeaconError::RoundNotFound(0)));
        assert_eq!(beacon.recover(1, &[], [0; 20]), Err(BeaconError::RoundNotFound(1)));
        assert!(beacon.values_at_round(1).is_err());
    }

    #[test]
    fn only_recoverer_may_recover() {
        let clock = ManualClock::new(0);
        let (mut beacon, n, g) = started(&clock);
        let c = g.modpow(&BigUint::from(77u8), &n);
        beacon.commit((&c).into(), [1; 20]).unwrap();
        clock.advance(20);
        let proof = vdf::prove(&c, T, &n).unwrap();

        assert_eq!(beacon.recover(1, &[proof.clone()], [0xbb; 20]), Err(BeaconError::NotRecoverer));
        assert_eq!(beacon.recover(2, &[proof.clone()], [0xaa; 20]), Err(BeaconError::RoundNotFound(2)));
        let omega = beacon.recover(1, &[proof], [0xaa; 20]).unwrap();
        assert_eq!(beacon.values_at_round(1).unwrap().recovered_omega, Some(omega));
        assert_eq!(beacon.winner_at_round(1).unwrap(), Some([1; 20]));
    }

    #[test]
    fn superseded_round_is_read_only() {
        let clock = ManualClock::new(0);
        let (mut beacon, n, g) = started(&clock);
        let c = g.modpow(&BigUint::from(5u8), &n);
        beacon.commit((&c).into(), [1; 20]).unwrap();
        clock.advance(20);
        let setup = vdf::prove(&g, T, &n).unwrap();
        beacon.start(10, 20, (&n).into(), [0xaa; 20], &[setup]).unwrap();

        let proof = vdf::prove(&c, T, &n).unwrap();
        assert_eq!(beacon.recover(1, &[proof], [0xaa; 20]), Err(BeaconError::RoundSuperseded(1)));
        assert_eq!(beacon.user_infos_at_round(&[1; 20], 1).unwrap().committed, true);
        assert_eq!(beacon.user_infos_at_round(&[1; 20], 2).unwrap(), UserInfo::default());
    }
}
