//! Wiring of all services over one store and clock

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::domain::{DuelId, UserId};
use crate::duel::{DuelService, DuelWatcher, SettlementCoordinator};
use crate::notify::NotificationDispatcher;
use crate::progression::{Progression, QuestProgressTracker};
use crate::store::ProgressStore;

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn ProgressStore>,
    duels: DuelService,
    settlement: SettlementCoordinator,
    notifier: NotificationDispatcher,
}

impl Engine {
    pub fn new(store: Arc<dyn ProgressStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let policy = config.retry_policy();
        Self {
            duels: DuelService::new(Arc::clone(&store), Arc::clone(&clock), policy),
            settlement: SettlementCoordinator::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.rewards,
                config.quests.clone(),
                policy,
            ),
            notifier: NotificationDispatcher::new(Arc::clone(&store), clock),
            store,
        }
    }

    pub fn duels(&self) -> &DuelService {
        &self.duels
    }

    pub fn settlement(&self) -> &SettlementCoordinator {
        &self.settlement
    }

    pub fn progression(&self) -> &Progression {
        self.settlement.progression()
    }

    pub fn quests(&self) -> &QuestProgressTracker {
        self.settlement.quests()
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifier
    }

    /// A watcher for `duel_id` as seen from `user`'s device
    pub fn watcher(&self, duel_id: &DuelId, user: &UserId) -> DuelWatcher {
        DuelWatcher::new(
            duel_id.clone(),
            user.clone(),
            Arc::clone(&self.store),
            self.settlement.clone(),
        )
    }
}
