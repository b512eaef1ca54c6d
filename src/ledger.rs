#![forbid(unsafe_code)]

//! Append-only store of rounds keyed by round number.
//!
//! Rounds are numbered from 1. Only the newest round is mutable; earlier ones
//! are reachable read-only. Each round is stored together with the
//! [`StartEvent`] snapshot returned when it was opened.

use serde::{Deserialize, Serialize};

use crate::bignum::BigNumber;
use crate::crypto::kmac::kmac256_hash;
use crate::round::{RoundState, SetupRecord};

const EVENT_LABEL: &[u8] = b"CR.event.start.v1";

/// Public parameters announced when a round opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
    pub start_time: u64,
    pub commit_duration: u64,
    pub commit_reveal_duration: u64,
    pub n: BigNumber,
    pub g: BigNumber,
    pub h: BigNumber,
    #[serde(rename = "T")]
    pub t: u64,
    pub round: u64,
}

impl StartEvent {
    pub fn new(round: u64, setup: &SetupRecord) -> Self {
        Self {
            start_time: setup.start_time,
            commit_duration: setup.commit_duration,
            commit_reveal_duration: setup.commit_reveal_duration,
            n: setup.n.clone(),
            g: setup.g.clone(),
            h: setup.h.clone(),
            t: setup.t,
            round,
        }
    }

    /// Digest of the canonical bincode encoding.
    pub fn digest(&self) -> [u8; 32] {
        let bin = bincode::serialize(self).expect("event->bin");
        kmac256_hash(EVENT_LABEL, &[&bin])
    }

    /// True when every announced field matches the stored setup.
    pub fn matches(&self, setup: &SetupRecord) -> bool {
        self.start_time == setup.start_time
            && self.commit_duration == setup.commit_duration
            && self.commit_reveal_duration == setup.commit_reveal_duration
            && self.n == setup.n
            && self.g == setup.g
            && self.h == setup.h
            && self.t == setup.t
    }
}

#[derive(Debug, Default)]
pub struct RoundLedger {
    rounds: Vec<RoundState>,
    events: Vec<StartEvent>,
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest round number; 0 before the first round.
    #[inline]
    pub fn current_round(&self) -> u64 {
        self.rounds.len() as u64
    }

    #[inline]
    fn slot(round: u64) -> Option<usize> {
        round.checked_sub(1).map(|i| i as usize)
    }

    /// Open the next round; returns its number and the announced event.
    pub fn append(&mut self, setup: SetupRecord) -> (u64, StartEvent) {
        let round = self.current_round() + 1;
        let event = StartEvent::new(round, &setup);
        self.rounds.push(RoundState::new(round, setup));
        self.events.push(event.clone());
        (round, event)
    }

    pub fn get(&self, round: u64) -> Option<&RoundState> {
        Self::slot(round).and_then(|i| self.rounds.get(i))
    }

    pub fn event(&self, round: u64) -> Option<&StartEvent> {
        Self::slot(round).and_then(|i| self.events.get(i))
    }

    pub fn active(&self) -> Option<&RoundState> {
        self.rounds.last()
    }

    pub fn active_mut(&mut self) -> Option<&mut RoundState> {
        self.rounds.last_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoundState> {
        self.rounds.iter()
    }
}
