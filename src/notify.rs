//! User-facing notification fan-out
//!
//! Writes `users/{uid}/notifications/{id}` records. Delivery is best effort:
//! a failed write is logged and never fails the operation that triggered it.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::domain::{Duel, Notification, NotificationKind, UserId};
use crate::duel::Outcome;
use crate::error::DuelError;
use crate::progression::QuestCompletion;
use crate::store::ProgressStore;

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn ProgressStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Tell the challenged player about a new duel
    pub async fn challenge_received(&self, duel: &Duel) -> bool {
        let challenger = duel.challenger();
        let opponent = &duel.players[1];
        let n = Notification::new(
            NotificationKind::DuelRequest,
            "New duel challenge",
            format!("{} challenged you to a {} duel", challenger, duel.topic),
            json!({ "duelId": duel.id, "from": challenger, "topic": duel.topic, "grade": duel.grade }),
            self.clock.now(),
        );
        self.dispatch(opponent, n).await
    }

    /// Tell the challenger that the opponent accepted
    pub async fn challenge_accepted(&self, duel: &Duel) -> bool {
        let challenger = duel.challenger();
        let opponent = &duel.players[1];
        let n = Notification::new(
            NotificationKind::DuelAccepted,
            "Challenge accepted",
            format!("{} accepted your {} duel", opponent, duel.topic),
            json!({ "duelId": duel.id, "by": opponent }),
            self.clock.now(),
        );
        self.dispatch(challenger, n).await
    }

    pub async fn duel_result(&self, duel: &Duel, user: &UserId, outcome: Outcome) -> bool {
        let body = match outcome {
            Outcome::Win => format!("You won the {} duel!", duel.topic),
            Outcome::Lose => format!("You lost the {} duel. Try a rematch!", duel.topic),
            Outcome::Draw => format!("The {} duel ended in a draw", duel.topic),
        };
        let n = Notification::new(
            NotificationKind::DuelResult,
            "Duel finished",
            body,
            json!({ "duelId": duel.id, "outcome": outcome }),
            self.clock.now(),
        );
        self.dispatch(user, n).await
    }

    /// Celebrate a daily quest reaching its target
    pub async fn quest_completed(&self, completion: &QuestCompletion) -> bool {
        let n = Notification::new(
            NotificationKind::QuestCompleted,
            "Quest complete!",
            format!("{} ({})", completion.title, completion.reward),
            json!({ "questId": completion.quest_id, "reward": completion.reward }),
            self.clock.now(),
        );
        self.dispatch(&completion.user, n).await
    }

    async fn dispatch(&self, user: &UserId, notification: Notification) -> bool {
        match self.store.push_notification(user, &notification).await {
            Ok(()) => {
                debug!(%user, kind = notification.kind.as_str(), "notification sent");
                true
            }
            Err(e) => {
                warn!(%user, kind = notification.kind.as_str(), "Failed to send notification: {}", e);
                false
            }
        }
    }

    /// Unread entries of a user's feed, newest first
    pub async fn unread(&self, user: &UserId) -> Result<Vec<Notification>, DuelError> {
        let all = self.store.notifications(user).await?;
        Ok(all.into_iter().filter(|n| !n.read).collect())
    }

    pub async fn mark_read(&self, user: &UserId, id: &str) -> Result<(), DuelError> {
        self.store.mark_notification_read(user, id).await?;
        Ok(())
    }
}
