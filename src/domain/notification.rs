use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a user-facing feed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DuelRequest,
    DuelAccepted,
    DuelResult,
    QuestCompleted,
    FriendRequest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuelRequest => "duel_request",
            Self::DuelAccepted => "duel_accepted",
            Self::DuelResult => "duel_result",
            Self::QuestCompleted => "quest_completed",
            Self::FriendRequest => "friend_request",
        }
    }
}

/// A `users/{uid}/notifications/{id}` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            body: body.into(),
            data,
            read: false,
            created_at,
        }
    }
}
