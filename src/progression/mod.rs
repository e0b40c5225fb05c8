//! Progression: XP levels, coins and daily quests
//!
//! Every mutation of a `users/{uid}` document goes through a single-document
//! transaction, so XP granted from several places at once (a duel win and a
//! mini-game reward, say) is never lost.

mod levels;
mod quests;

pub use levels::{
    apply_xp, grant, progress_to_next, title_for_level, xp_to_next_level, LevelTitle, LevelUp,
    TITLES, XP_PER_LEVEL,
};
pub use quests::{
    advance_quests, default_quests, QuestCompletion, QuestDefinition, QuestEvent,
    QuestProgressTracker,
};

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::domain::{Reward, UserDoc, UserId, UserProgress};
use crate::error::DuelError;
use crate::store::{load_user, transact_user, ProgressStore, RetryPolicy, TxDecision};

/// Events that can happen while progressing a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressionEvent {
    XpAwarded {
        user: UserId,
        reward: Reward,
        reason: String,
    },
    LevelUp {
        user: UserId,
        level_up: LevelUp,
    },
    QuestCompleted(QuestCompletion),
}

/// Result of one committed reward grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardReceipt {
    pub progress: UserProgress,
    pub level_up: Option<LevelUp>,
}

/// Atomic apply side of the leveling engine
#[derive(Clone)]
pub struct Progression {
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl Progression {
    pub fn new(store: Arc<dyn ProgressStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Current progress of a user (defaults for a user never seen before)
    pub async fn progress(&self, user: &UserId) -> Result<UserProgress, DuelError> {
        Ok(load_user(self.store.as_ref(), user)
            .await?
            .map(|doc| doc.value.progress)
            .unwrap_or_default())
    }

    /// Add a reward to `users/{uid}` inside one transaction, leveling up as needed
    pub async fn grant_reward(
        &self,
        user: &UserId,
        reward: &Reward,
    ) -> Result<RewardReceipt, DuelError> {
        let now = self.clock.now();
        let receipt = transact_user(self.store.as_ref(), user, &self.policy, |doc| {
            let mut doc = doc.unwrap_or_else(|| UserDoc::new(now));
            let (progress, level_up) = grant(doc.progress, reward);
            doc.progress = progress;
            Ok(TxDecision::Commit(doc, RewardReceipt { progress, level_up }))
        })
        .await?;

        if let Some(up) = &receipt.level_up {
            info!(
                %user,
                old_level = up.old_level,
                new_level = up.new_level,
                "[LEVEL] {} reached level {} ({})",
                user,
                up.new_level,
                up.new_title
            );
        }
        Ok(receipt)
    }

    /// Collect the events of a grant for reporting
    pub fn events_for(
        user: &UserId,
        reward: &Reward,
        reason: impl Into<String>,
        receipt: &RewardReceipt,
    ) -> Vec<ProgressionEvent> {
        let mut events = vec![ProgressionEvent::XpAwarded {
            user: user.clone(),
            reward: *reward,
            reason: reason.into(),
        }];
        if let Some(up) = &receipt.level_up {
            events.push(ProgressionEvent::LevelUp {
                user: user.clone(),
                level_up: up.clone(),
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_grants_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let progression = Progression::new(
            store.clone(),
            Arc::new(SystemClock),
            RetryPolicy::new(50, Duration::from_millis(1)),
        );
        let user = UserId::from("u1");

        let grants = (0..8).map(|_| {
            let p = progression.clone();
            let user = user.clone();
            tokio::spawn(async move { p.grant_reward(&user, &Reward::xp_coins(50, 10)).await })
        });
        for handle in futures::future::join_all(grants).await {
            handle.unwrap().unwrap();
        }

        // 400 XP from level 1: 100 + 200 consumed, 100 left at level 3
        let progress = progression.progress(&user).await.unwrap();
        assert_eq!(progress.level, 3);
        assert_eq!(progress.xp, 100);
        assert_eq!(progress.coins, 80);
    }

    #[tokio::test]
    async fn test_unknown_user_has_default_progress() {
        let progression = Progression::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            RetryPolicy::default(),
        );
        let p = progression.progress(&UserId::from("nobody")).await.unwrap();
        assert_eq!(p, UserProgress::default());
    }
}
