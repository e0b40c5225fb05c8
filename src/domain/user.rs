use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Explicit user identity, threaded through every operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-user progression counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub level: u32,
    /// Always strictly below `xp_to_next_level`
    pub xp: u32,
    pub xp_to_next_level: u32,
    pub coins: u64,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            xp_to_next_level: crate::progression::xp_to_next_level(1),
            coins: 0,
        }
    }
}

/// Daily quest counters. Stale state (not touched today) is logically empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuestState {
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub progress: HashMap<String, u32>,
    #[serde(default)]
    pub completed: HashMap<String, bool>,
}

impl DailyQuestState {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            progress: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    /// Whether `last_updated` falls on the same UTC calendar day as `now`
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.last_updated.date_naive() == now.date_naive()
    }

    /// Clear everything if the state belongs to an earlier day.
    /// Returns true if a reset happened.
    pub fn reset_if_stale(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_current(now) {
            return false;
        }
        *self = Self::empty(now);
        true
    }

    /// View of the state as of `now`, with the daily reset applied
    pub fn as_of(&self, now: DateTime<Utc>) -> Self {
        let mut view = self.clone();
        view.reset_if_stale(now);
        view
    }

    pub fn progress_of(&self, quest_id: &str) -> u32 {
        self.progress.get(quest_id).copied().unwrap_or(0)
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.completed.get(quest_id).copied().unwrap_or(false)
    }
}

/// The `users/{uid}` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(flatten)]
    pub progress: UserProgress,
    pub daily_quests: DailyQuestState,
}

impl UserDoc {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            progress: UserProgress::default(),
            daily_quests: DailyQuestState::empty(now),
        }
    }
}
