//! Race-safe duel settlement
//!
//! Both devices observe the same duel and may call [`SettlementCoordinator::settle`]
//! at the same moment. The status flip to `completed` is a compare-and-set on the
//! duel document, so exactly one caller wins it; only that caller applies rewards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Outcome;
use crate::clock::Clock;
use crate::domain::{Duel, DuelId, Reward, UserId};
use crate::error::DuelError;
use crate::notify::NotificationDispatcher;
use crate::progression::{
    Progression, ProgressionEvent, QuestDefinition, QuestEvent, QuestProgressTracker,
};
use crate::store::{transact_duel, ProgressStore, RetryPolicy, TxDecision};

/// Rewards handed out per personal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub duel_win: Reward,
    pub duel_loss: Option<Reward>,
    pub duel_draw: Option<Reward>,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            duel_win: Reward::xp_coins(100, 50),
            duel_loss: None,
            duel_draw: None,
        }
    }
}

impl RewardPolicy {
    pub fn reward_for(&self, outcome: Outcome) -> Option<Reward> {
        let reward = match outcome {
            Outcome::Win => Some(self.duel_win),
            Outcome::Lose => self.duel_loss,
            Outcome::Draw => self.duel_draw,
        };
        reward.filter(|r| !r.is_empty())
    }
}

/// How a settle call ended for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// This caller completed the duel and applied the rewards
    Settled,
    /// Someone else completed it first; nothing was applied
    AlreadySettled,
    /// At least one result is still missing
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub disposition: Disposition,
    pub self_outcome: Option<Outcome>,
    pub events: Vec<ProgressionEvent>,
}

impl SettlementReport {
    fn new(disposition: Disposition, self_outcome: Option<Outcome>) -> Self {
        Self {
            disposition,
            self_outcome,
            events: Vec::new(),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Settled | Disposition::AlreadySettled
        )
    }
}

enum Claim {
    Won(Duel),
    Lost(Duel),
    NotReady,
}

#[derive(Clone)]
pub struct SettlementCoordinator {
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    progression: Progression,
    quests: QuestProgressTracker,
    notifier: NotificationDispatcher,
    rewards: RewardPolicy,
    policy: RetryPolicy,
}

impl SettlementCoordinator {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        clock: Arc<dyn Clock>,
        rewards: RewardPolicy,
        quests: Vec<QuestDefinition>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            progression: Progression::new(Arc::clone(&store), Arc::clone(&clock), policy),
            quests: QuestProgressTracker::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                quests,
                policy,
            ),
            notifier: NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
            rewards,
            policy,
        }
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    pub fn quests(&self) -> &QuestProgressTracker {
        &self.quests
    }

    /// Try to settle `duel_id` on behalf of `self_uid`.
    ///
    /// Safe to call any number of times from any number of tasks: reward side
    /// effects run for at most one caller.
    pub async fn settle(
        &self,
        duel_id: &DuelId,
        self_uid: &UserId,
    ) -> Result<SettlementReport, DuelError> {
        let now = self.clock.now();
        let claim = transact_duel(self.store.as_ref(), duel_id, &self.policy, |duel| {
            let Some(mut duel) = duel else {
                return Err(DuelError::DuelUnavailable(duel_id.clone()));
            };
            if !duel.is_participant(self_uid) {
                return Err(DuelError::NotParticipant {
                    duel: duel_id.clone(),
                    user: self_uid.clone(),
                });
            }
            if duel.is_completed() {
                return Ok(TxDecision::Skip(Claim::Lost(duel)));
            }
            if !duel.has_both_results() {
                return Ok(TxDecision::Skip(Claim::NotReady));
            }
            duel.mark_completed(self_uid, now)?;
            Ok(TxDecision::Commit(duel.clone(), Claim::Won(duel)))
        })
        .await?;

        match claim {
            Claim::NotReady => {
                debug!(duel = %duel_id, "results incomplete, nothing to settle");
                Ok(SettlementReport::new(Disposition::NotReady, None))
            }
            Claim::Lost(duel) => {
                debug!(duel = %duel_id, settled_by = ?duel.settled_by, "duel already settled");
                let outcome = duel.outcome_for(self_uid).ok();
                Ok(SettlementReport::new(Disposition::AlreadySettled, outcome))
            }
            Claim::Won(duel) => {
                info!(duel = %duel_id, by = %self_uid, "[DUEL] settled");
                self.apply_rewards(&duel, self_uid).await
            }
        }
    }

    /// Runs only after this caller committed the `completed` status.
    ///
    /// The duel is already final here, so failures are logged per player and
    /// the remaining side effects still run.
    async fn apply_rewards(
        &self,
        duel: &Duel,
        self_uid: &UserId,
    ) -> Result<SettlementReport, DuelError> {
        let mut report = SettlementReport::new(Disposition::Settled, None);

        for player in &duel.players {
            let outcome = duel.outcome_for(player)?;
            if player == self_uid {
                report.self_outcome = Some(outcome);
            }

            if let Some(reward) = self.rewards.reward_for(outcome) {
                match self.progression.grant_reward(player, &reward).await {
                    Ok(receipt) => report.events.extend(Progression::events_for(
                        player,
                        &reward,
                        format!("duel_{}", outcome),
                        &receipt,
                    )),
                    Err(e) => warn!(
                        duel = %duel.id,
                        %player,
                        "Duel settled but reward was not applied: {}",
                        e
                    ),
                }
            }

            let mut quest_events = vec![QuestEvent::DuelPlayed];
            if outcome == Outcome::Win {
                quest_events.push(QuestEvent::DuelWin);
            }
            for event in quest_events {
                match self.quests.record_event(player, event).await {
                    Ok(completions) => {
                        for completion in completions {
                            if let Some(up) = &completion.level_up {
                                report.events.push(ProgressionEvent::LevelUp {
                                    user: player.clone(),
                                    level_up: up.clone(),
                                });
                            }
                            report.events.push(ProgressionEvent::QuestCompleted(completion));
                        }
                    }
                    Err(e) => warn!(
                        duel = %duel.id,
                        %player,
                        event = event.as_str(),
                        "Failed to record quest progress: {}",
                        e
                    ),
                }
            }

            self.notifier.duel_result(duel, player, outcome).await;
        }

        Ok(report)
    }
}
