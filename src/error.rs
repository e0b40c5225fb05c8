//! Engine error type

use crate::domain::{DuelId, DuelStatus, UserId};
use crate::store::StoreError;

/// The only failure text the UI layer ever shows
pub const GENERIC_FAILURE: &str = "Something went wrong, try again.";

/// Errors from duel lifecycle, settlement and progression operations
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("duel {0} is unavailable")]
    DuelUnavailable(DuelId),

    #[error("user {user} is not a participant of duel {duel}")]
    NotParticipant { duel: DuelId, user: UserId },

    #[error("user {0} owns neither of the compared results")]
    UnknownPlayer(UserId),

    #[error("duel {0} is already completed")]
    AlreadyCompleted(DuelId),

    #[error("invalid duel transition {from} -> {to}")]
    InvalidTransition { from: DuelStatus, to: DuelStatus },

    #[error("user {user} already submitted a different result for duel {duel}")]
    ResultConflict { duel: DuelId, user: UserId },

    #[error("user {0} has no score to compare")]
    MissingScore(UserId),

    #[error("duel {0} does not have both results")]
    ResultsIncomplete(DuelId),

    #[error("user {0} cannot challenge themselves")]
    SelfChallenge(UserId),

    #[error("gave up on {doc} after {attempts} conflicting attempts")]
    RetriesExhausted { doc: String, attempts: u32 },
}

impl DuelError {
    /// Soft failures are logged and retried on the next change notification
    pub fn is_soft(&self) -> bool {
        match self {
            DuelError::RetriesExhausted { .. } => true,
            DuelError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// User-visible text. Deliberately identical for every variant.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE
    }
}
