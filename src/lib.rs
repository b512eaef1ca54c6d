//! Commit-reveal-recover randomness beacon
//!
//! Participants commit to `g^a mod n` during a commit window and reveal `a`
//! during a reveal window. When everybody reveals, the round output `omega`
//! is computed directly; when somebody withholds, a designated recoverer
//! supplies Wesolowski VDF proofs that reconstruct the missing contributions,
//! and the recovered output equals the honest one.
//!
//! Modules:
//! - bignum: block-padded big-endian integer codec
//! - modarith: modular arithmetic over the public modulus
//! - crypto: KMAC256 hashing
//! - vdf: Wesolowski verifier and prover
//! - round: per-round state machine
//! - ledger: append-only round store and start events
//! - beacon: the `CommitRecover` controller
//! - ranking: winner selection
//! - clock, config, error, logging: plumbing

pub mod bignum;
pub mod beacon;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod modarith;
pub mod ranking;
pub mod round;
pub mod vdf;

pub use beacon::CommitRecover;
pub use bignum::{BigNumber, EncodingError, BLOCK_SIZE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BeaconConfig, ConfigError};
pub use error::{BeaconError, ErrorKind, RecoveryFault};
pub use ledger::{RoundLedger, StartEvent};
pub use round::{Address, ParticipantRecord, RoundState, RoundValues, SetupRecord, Stage, UserInfo};
pub use vdf::{VdfClaim, VdfError};
