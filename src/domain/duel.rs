use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::UserId;

/// Opaque identifier of a duel document (`duels/{id}`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuelId(pub String);

impl DuelId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DuelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DuelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a duel. Ordered: a duel only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelStatus {
    /// Challenge issued, opponent has not accepted yet
    Pending,
    /// Both players may play
    Active,
    /// Settled; results are frozen
    Completed,
}

impl DuelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuelStatus::Pending => "pending",
            DuelStatus::Active => "active",
            DuelStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DuelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One player's submitted quiz result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub score: Option<u32>,
    /// Completion time in seconds
    pub time: Option<u32>,
    pub nickname: String,
}

impl PlayerResult {
    pub fn new(score: u32, time: u32, nickname: impl Into<String>) -> Self {
        Self {
            score: Some(score),
            time: Some(time),
            nickname: nickname.into(),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.score.is_some()
    }
}

/// An asynchronous two-player quiz match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duel {
    pub id: DuelId,
    pub status: DuelStatus,
    /// `players[0]` issued the challenge, `players[1]` received it
    pub players: [UserId; 2],
    pub topic: String,
    pub grade: u8,
    #[serde(default)]
    pub results: HashMap<UserId, PlayerResult>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    /// Whose settlement transaction won the race
    #[serde(default)]
    pub settled_by: Option<UserId>,
}

impl Duel {
    /// Create a freshly issued challenge in `pending`
    pub fn new(
        id: DuelId,
        challenger: UserId,
        opponent: UserId,
        topic: impl Into<String>,
        grade: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: DuelStatus::Pending,
            players: [challenger, opponent],
            topic: topic.into(),
            grade,
            results: HashMap::new(),
            created_at,
            settled_at: None,
            settled_by: None,
        }
    }

    pub fn challenger(&self) -> &UserId {
        &self.players[0]
    }

    pub fn is_participant(&self, uid: &UserId) -> bool {
        self.players.contains(uid)
    }

    pub fn result_of(&self, uid: &UserId) -> Option<&PlayerResult> {
        self.results.get(uid)
    }

    /// Both players have a non-null score
    pub fn has_both_results(&self) -> bool {
        self.players
            .iter()
            .all(|p| self.results.get(p).is_some_and(PlayerResult::is_submitted))
    }

    pub fn is_completed(&self) -> bool {
        self.status == DuelStatus::Completed
    }

    pub fn is_ready_to_settle(&self) -> bool {
        !self.is_completed() && self.has_both_results()
    }

    /// Move the status forward. Regressions are rejected, and so is
    /// `completed` without both results; `pending` may go straight to
    /// `completed` once both are in. Re-applying the current status is fine.
    pub fn advance(&mut self, to: DuelStatus) -> Result<(), crate::DuelError> {
        if to < self.status {
            return Err(crate::DuelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        if to == DuelStatus::Completed && !self.has_both_results() {
            return Err(crate::DuelError::ResultsIncomplete(self.id.clone()));
        }
        self.status = to;
        Ok(())
    }

    /// Freeze the duel. Fails unless both results are present.
    pub fn mark_completed(
        &mut self,
        settled_by: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), crate::DuelError> {
        if self.is_completed() {
            return Err(crate::DuelError::AlreadyCompleted(self.id.clone()));
        }
        self.advance(DuelStatus::Completed)?;
        self.settled_at = Some(at);
        self.settled_by = Some(settled_by.clone());
        Ok(())
    }
}
