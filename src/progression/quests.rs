//! Daily quests
//!
//! Counters keyed by gameplay event, reset every calendar day. One event
//! advances every matching quest that is not completed yet.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use super::levels::{self, LevelUp};
use crate::clock::Clock;
use crate::domain::{DailyQuestState, Reward, UserDoc, UserId};
use crate::error::DuelError;
use crate::notify::NotificationDispatcher;
use crate::store::{load_user, transact_user, ProgressStore, RetryPolicy, TxDecision};

/// Gameplay events quests listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestEvent {
    /// A quiz/test was finished
    TestComplete,
    /// A duel was won
    DuelWin,
    /// A duel was settled, whatever the outcome
    DuelPlayed,
    /// An arithmetic mini-game round was finished
    MiniGameComplete,
    /// A matchstick puzzle was solved
    PuzzleSolved,
}

impl QuestEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestComplete => "TEST_COMPLETE",
            Self::DuelWin => "DUEL_WIN",
            Self::DuelPlayed => "DUEL_PLAYED",
            Self::MiniGameComplete => "MINI_GAME_COMPLETE",
            Self::PuzzleSolved => "PUZZLE_SOLVED",
        }
    }
}

/// Quest definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub id: String,
    pub title: String,
    pub event: QuestEvent,
    /// Events needed to complete, at least 1
    #[serde(deserialize_with = "at_least_one")]
    pub target: u32,
    pub reward: Reward,
}

fn at_least_one<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u32::deserialize(deserializer)?.max(1))
}

impl QuestDefinition {
    pub fn new(id: &str, title: &str, event: QuestEvent, target: u32, reward: Reward) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            event,
            target: target.max(1),
            reward,
        }
    }
}

/// Built-in daily quest table
pub fn default_quests() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition::new(
            "daily_test_1",
            "Finish a test",
            QuestEvent::TestComplete,
            1,
            Reward::xp_coins(20, 10),
        ),
        QuestDefinition::new(
            "daily_test_3",
            "Finish 3 tests",
            QuestEvent::TestComplete,
            3,
            Reward::xp_coins(60, 30),
        ),
        QuestDefinition::new(
            "daily_duel_play",
            "Play a duel",
            QuestEvent::DuelPlayed,
            1,
            Reward::xp_coins(15, 5),
        ),
        QuestDefinition::new(
            "daily_duel_win",
            "Win a duel",
            QuestEvent::DuelWin,
            1,
            Reward::xp_coins(50, 25),
        ),
        QuestDefinition::new(
            "daily_minigame_5",
            "Play 5 mini-game rounds",
            QuestEvent::MiniGameComplete,
            5,
            Reward::xp_coins(40, 20),
        ),
        QuestDefinition::new(
            "daily_puzzle_2",
            "Solve 2 matchstick puzzles",
            QuestEvent::PuzzleSolved,
            2,
            Reward::xp_coins(30, 15),
        ),
    ]
}

/// A quest that reached its target, with the reward already applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestCompletion {
    pub user: UserId,
    pub quest_id: String,
    pub title: String,
    pub reward: Reward,
    pub level_up: Option<LevelUp>,
}

/// Advance every open quest listening to `event`.
///
/// Returns whether any counter moved, and the quests that completed.
pub fn advance_quests<'q>(
    state: &mut DailyQuestState,
    quests: &'q [QuestDefinition],
    event: QuestEvent,
) -> (bool, Vec<&'q QuestDefinition>) {
    let mut touched = false;
    let mut completed = Vec::new();

    for quest in quests.iter().filter(|q| q.event == event) {
        if state.is_completed(&quest.id) {
            continue;
        }
        touched = true;

        let count = state.progress.entry(quest.id.clone()).or_insert(0);
        *count += 1;
        if *count >= quest.target {
            state.completed.insert(quest.id.clone(), true);
            completed.push(quest);
        }
    }

    (touched, completed)
}

/// Records gameplay events against a user's daily quests
#[derive(Clone)]
pub struct QuestProgressTracker {
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
    quests: Arc<Vec<QuestDefinition>>,
    policy: RetryPolicy,
}

impl QuestProgressTracker {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        clock: Arc<dyn Clock>,
        quests: Vec<QuestDefinition>,
        policy: RetryPolicy,
    ) -> Self {
        let notifier = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            notifier,
            quests: Arc::new(quests),
            policy,
        }
    }

    pub fn quests(&self) -> &[QuestDefinition] {
        &self.quests
    }

    /// Today's quest state of a user (stale state reads as empty)
    pub async fn daily_state(&self, user: &UserId) -> Result<DailyQuestState, DuelError> {
        let now = self.clock.now();
        Ok(match load_user(self.store.as_ref(), user).await? {
            Some(doc) => doc.value.daily_quests.as_of(now),
            None => DailyQuestState::empty(now),
        })
    }

    /// Count one `event` for `user` and grant rewards for quests it completes
    pub async fn record_event(
        &self,
        user: &UserId,
        event: QuestEvent,
    ) -> Result<Vec<QuestCompletion>, DuelError> {
        let now = self.clock.now();

        // Persist the daily reset before counting. Not atomic with the
        // increment below; a crash in between can drop this one event.
        let reset = transact_user(self.store.as_ref(), user, &self.policy, |doc| {
            let mut doc = match doc {
                Some(doc) => doc,
                None => return Ok(TxDecision::Commit(UserDoc::new(now), false)),
            };
            if doc.daily_quests.reset_if_stale(now) {
                Ok(TxDecision::Commit(doc, true))
            } else {
                Ok(TxDecision::Skip(false))
            }
        })
        .await?;
        if reset {
            debug!(%user, "daily quests reset");
        }

        let quests = Arc::clone(&self.quests);
        let completions = transact_user(self.store.as_ref(), user, &self.policy, |doc| {
            let mut doc = doc.unwrap_or_else(|| UserDoc::new(now));
            // The day may have rolled over since the reset above
            doc.daily_quests.reset_if_stale(now);

            let (touched, completed) = advance_quests(&mut doc.daily_quests, &quests, event);
            if !touched {
                return Ok(TxDecision::Skip(Vec::new()));
            }
            doc.daily_quests.last_updated = now;

            let mut completions = Vec::with_capacity(completed.len());
            for quest in completed {
                let (progress, level_up) = levels::grant(doc.progress, &quest.reward);
                doc.progress = progress;
                completions.push(QuestCompletion {
                    user: user.clone(),
                    quest_id: quest.id.clone(),
                    title: quest.title.clone(),
                    reward: quest.reward,
                    level_up,
                });
            }
            Ok(TxDecision::Commit(doc, completions))
        })
        .await?;

        for completion in &completions {
            info!(
                %user,
                quest = %completion.quest_id,
                reward = %completion.reward,
                "[QUEST] completed"
            );
            self.notifier.quest_completed(completion).await;
        }

        Ok(completions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn two_test_quests() -> Vec<QuestDefinition> {
        vec![
            QuestDefinition::new("t1", "One test", QuestEvent::TestComplete, 1, Reward::xp_coins(10, 1)),
            QuestDefinition::new("t2", "Two tests", QuestEvent::TestComplete, 2, Reward::xp_coins(20, 2)),
            QuestDefinition::new("w1", "Win", QuestEvent::DuelWin, 1, Reward::xp_coins(50, 5)),
        ]
    }

    #[test]
    fn test_one_event_advances_all_matching() {
        let quests = two_test_quests();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let mut state = DailyQuestState::empty(now);

        let (touched, done) = advance_quests(&mut state, &quests, QuestEvent::TestComplete);
        assert!(touched);
        assert_eq!(done.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(), vec!["t1"]);
        assert_eq!(state.progress_of("t1"), 1);
        assert_eq!(state.progress_of("t2"), 1);
        assert!(!state.is_completed("t2"));

        let (_, done) = advance_quests(&mut state, &quests, QuestEvent::TestComplete);
        assert_eq!(done.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(), vec!["t2"]);
        // Completed quests stop counting
        assert_eq!(state.progress_of("t1"), 1);
    }

    #[test]
    fn test_unrelated_event_touches_nothing() {
        let quests = two_test_quests();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let mut state = DailyQuestState::empty(now);

        let (touched, done) = advance_quests(&mut state, &quests, QuestEvent::PuzzleSolved);
        assert!(!touched);
        assert!(done.is_empty());
        assert!(state.progress.is_empty());
    }

    #[test]
    fn test_event_names_match_config_spelling() {
        for e in [
            QuestEvent::TestComplete,
            QuestEvent::DuelWin,
            QuestEvent::DuelPlayed,
            QuestEvent::MiniGameComplete,
            QuestEvent::PuzzleSolved,
        ] {
            assert_eq!(serde_json::to_value(e).unwrap(), e.as_str());
        }
    }

    #[test]
    fn test_default_quest_ids_unique() {
        let quests = default_quests();
        let mut ids: Vec<_> = quests.iter().map(|q| q.id.as_str()).collect();
        ids.sort();
        let count = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }
}
