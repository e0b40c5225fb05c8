//! Write side of a duel: challenge, accept, submit

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::domain::{Duel, DuelId, DuelStatus, PlayerResult, UserId};
use crate::error::DuelError;
use crate::notify::NotificationDispatcher;
use crate::store::{load_duel, transact_duel, DocPath, ProgressStore, RetryPolicy, TxDecision};

#[derive(Clone)]
pub struct DuelService {
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
    policy: RetryPolicy,
}

impl DuelService {
    pub fn new(store: Arc<dyn ProgressStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            notifier: NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
            policy,
        }
    }

    /// Create a `pending` duel and notify the opponent
    pub async fn issue_challenge(
        &self,
        challenger: &UserId,
        opponent: &UserId,
        topic: &str,
        grade: u8,
    ) -> Result<Duel, DuelError> {
        if challenger == opponent {
            return Err(DuelError::SelfChallenge(challenger.clone()));
        }

        let duel = Duel::new(
            DuelId::generate(),
            challenger.clone(),
            opponent.clone(),
            topic,
            grade,
            self.clock.now(),
        );
        let value = serde_json::to_value(&duel).map_err(crate::store::StoreError::from)?;
        self.store
            .compare_and_set(&DocPath::Duel(duel.id.clone()), None, value)
            .await?;

        info!(duel = %duel.id, %challenger, %opponent, topic, "[DUEL] challenge issued");
        self.notifier.challenge_received(&duel).await;
        Ok(duel)
    }

    /// The challenged player accepts: `pending` -> `active`
    pub async fn accept_challenge(&self, duel_id: &DuelId, user: &UserId) -> Result<Duel, DuelError> {
        let (duel, accepted) = transact_duel(self.store.as_ref(), duel_id, &self.policy, |duel| {
            let mut duel = duel.ok_or_else(|| DuelError::DuelUnavailable(duel_id.clone()))?;
            if &duel.players[1] != user {
                return Err(DuelError::NotParticipant {
                    duel: duel_id.clone(),
                    user: user.clone(),
                });
            }
            match duel.status {
                DuelStatus::Pending => {
                    duel.advance(DuelStatus::Active)?;
                    Ok(TxDecision::Commit(duel.clone(), (duel, true)))
                }
                DuelStatus::Active => Ok(TxDecision::Skip((duel, false))),
                DuelStatus::Completed => Err(DuelError::AlreadyCompleted(duel_id.clone())),
            }
        })
        .await?;

        if accepted {
            info!(duel = %duel_id, %user, "[DUEL] challenge accepted");
            self.notifier.challenge_accepted(&duel).await;
        }
        Ok(duel)
    }

    /// Write `user`'s own result. Resubmitting the same result is a no-op.
    pub async fn submit_result(
        &self,
        duel_id: &DuelId,
        user: &UserId,
        score: u32,
        time: u32,
        nickname: &str,
    ) -> Result<Duel, DuelError> {
        let result = PlayerResult::new(score, time, nickname);
        let duel = transact_duel(self.store.as_ref(), duel_id, &self.policy, |duel| {
            let mut duel = duel.ok_or_else(|| DuelError::DuelUnavailable(duel_id.clone()))?;
            if !duel.is_participant(user) {
                return Err(DuelError::NotParticipant {
                    duel: duel_id.clone(),
                    user: user.clone(),
                });
            }
            if duel.is_completed() {
                return Err(DuelError::AlreadyCompleted(duel_id.clone()));
            }
            let previous = duel.result_of(user).filter(|r| r.is_submitted()).cloned();
            match previous {
                Some(existing) if existing == result => return Ok(TxDecision::Skip(duel)),
                Some(_) => {
                    return Err(DuelError::ResultConflict {
                        duel: duel_id.clone(),
                        user: user.clone(),
                    });
                }
                None => {}
            }
            duel.results.insert(user.clone(), result.clone());
            Ok(TxDecision::Commit(duel.clone(), duel))
        })
        .await?;

        info!(duel = %duel_id, %user, score, time, "[DUEL] result submitted");
        Ok(duel)
    }

    pub async fn get_duel(&self, duel_id: &DuelId) -> Result<Duel, DuelError> {
        load_duel(self.store.as_ref(), duel_id)
            .await?
            .map(|d| d.value)
            .ok_or_else(|| DuelError::DuelUnavailable(duel_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;

    fn service() -> DuelService {
        DuelService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            RetryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_self_challenge_rejected() {
        let svc = service();
        let me = UserId::from("alice");
        let res = svc.issue_challenge(&me, &me, "math", 5).await;
        assert!(matches!(res, Err(DuelError::SelfChallenge(_))));
    }

    #[tokio::test]
    async fn test_only_opponent_accepts() {
        let svc = service();
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));
        let duel = svc.issue_challenge(&alice, &bob, "math", 5).await.unwrap();
        assert_eq!(duel.status, DuelStatus::Pending);

        let res = svc.accept_challenge(&duel.id, &alice).await;
        assert!(matches!(res, Err(DuelError::NotParticipant { .. })));

        let accepted = svc.accept_challenge(&duel.id, &bob).await.unwrap();
        assert_eq!(accepted.status, DuelStatus::Active);
        // Accepting twice is harmless
        let again = svc.accept_challenge(&duel.id, &bob).await.unwrap();
        assert_eq!(again.status, DuelStatus::Active);
    }

    #[tokio::test]
    async fn test_resubmission_rules() {
        let svc = service();
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));
        let duel = svc.issue_challenge(&alice, &bob, "math", 5).await.unwrap();

        svc.submit_result(&duel.id, &alice, 9, 42, "Alice").await.unwrap();
        svc.submit_result(&duel.id, &alice, 9, 42, "Alice").await.unwrap();
        let res = svc.submit_result(&duel.id, &alice, 10, 42, "Alice").await;
        assert!(matches!(res, Err(DuelError::ResultConflict { .. })));

        let res = svc
            .submit_result(&duel.id, &UserId::from("carol"), 1, 1, "Carol")
            .await;
        assert!(matches!(res, Err(DuelError::NotParticipant { .. })));
    }
}
