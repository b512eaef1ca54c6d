#![forbid(unsafe_code)]

//! Errors returned by the beacon entry points.

use thiserror::Error;

use crate::modarith::ArithError;
use crate::round::Stage;
use crate::vdf::VdfError;

/// Coarse classification of a [`BeaconError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Call made outside its time window.
    Stage,
    /// Duplicate or unauthorised participant action, or a broken binding.
    Protocol,
    /// Setup or recovery proof rejected.
    Proof,
    /// Finalisation attempted with reveals or proofs missing.
    Completeness,
    /// Malformed call parameters.
    Input,
}

/// Why a recovery proof list was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryFault {
    #[error("proof missing")]
    Missing,

    #[error("{0} unexpected extra proof(s)")]
    Extra(usize),

    #[error(transparent)]
    Invalid(#[from] VdfError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BeaconError {
    #[error("FunctionInvalidAtThisStage: expected {expected:?}, round is in {actual:?}")]
    FunctionInvalidAtThisStage { expected: Stage, actual: Stage },

    #[error("round {0} is already finalized")]
    AlreadyFinalized(u64),

    #[error("round {0} has been superseded by a newer round and is read-only")]
    RoundSuperseded(u64),

    #[error("InvalidDuration: need commit_reveal_duration > commit_duration > 0 (got {commit}, {commit_reveal})")]
    InvalidDuration { commit: u64, commit_reveal: u64 },

    #[error("InvalidSetupProof: {0}")]
    InvalidSetupProof(VdfError),

    #[error("AlreadyCommitted")]
    AlreadyCommitted,

    #[error("NotCommitted")]
    NotCommitted,

    #[error("AlreadyRevealed")]
    AlreadyRevealed,

    #[error("commitment must lie in [1, n)")]
    InvalidCommitment,

    #[error("CommitmentMismatch")]
    CommitmentMismatch,

    #[error("IncompleteReveals: {missing} participant(s) have not revealed")]
    IncompleteReveals { missing: usize },

    #[error("no participants committed in this round")]
    NoParticipants,

    #[error("every participant revealed; use calculate_omega")]
    NothingToRecover,

    #[error("RecoveryProofMismatch at proof {index}: {reason}")]
    RecoveryProofMismatch { index: usize, reason: RecoveryFault },

    #[error("caller is not the designated recoverer")]
    NotRecoverer,

    #[error("round {0} not found")]
    RoundNotFound(u64),

    #[error(transparent)]
    Arith(#[from] ArithError),
}

impl BeaconError {
    pub fn kind(&self) -> ErrorKind {
        use BeaconError::*;
        match self {
            FunctionInvalidAtThisStage { .. } | AlreadyFinalized(_) | RoundSuperseded(_) => {
                ErrorKind::Stage
            }
            AlreadyCommitted | NotCommitted | AlreadyRevealed | InvalidCommitment
            | CommitmentMismatch | NotRecoverer => ErrorKind::Protocol,
            InvalidSetupProof(_) | RecoveryProofMismatch { reason: RecoveryFault::Invalid(_), .. } => {
                ErrorKind::Proof
            }
            IncompleteReveals { .. } | NoParticipants | NothingToRecover => ErrorKind::Completeness,
            RecoveryProofMismatch { .. } => ErrorKind::Completeness,
            InvalidDuration { .. } | RoundNotFound(_) | Arith(_) => ErrorKind::Input,
        }
    }

    /// True when the same call can succeed later without changing its
    /// arguments: the round has not yet reached the required stage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BeaconError::FunctionInvalidAtThisStage { expected, actual } if actual < expected)
    }
}

pub type Result<T> = std::result::Result<T, BeaconError>;
