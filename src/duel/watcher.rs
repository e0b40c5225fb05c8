//! Per-device duel observer
//!
//! Follows one duel document and calls the settlement coordinator when both
//! results are in. Every device runs its own watcher; the coordinator makes
//! the race between them harmless.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::settlement::{SettlementCoordinator, SettlementReport};
use crate::domain::{Duel, DuelId, UserId};
use crate::error::DuelError;
use crate::store::{watch_duel, DuelEvent, DuelSubscription, ProgressStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    ResultsPending,
    Settling,
    Settled,
    Unavailable,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Settled | WatchState::Unavailable)
    }
}

/// What the watcher should do about a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Wait,
    Settle,
    Done,
    Unavailable,
}

/// How a watcher finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchResult {
    pub state: WatchState,
    /// Present when this watcher invoked the coordinator and got a final answer
    pub report: Option<SettlementReport>,
}

pub struct DuelWatcher {
    duel_id: DuelId,
    self_uid: UserId,
    store: Arc<dyn ProgressStore>,
    coordinator: SettlementCoordinator,
    state: WatchState,
    settle_requested: bool,
    state_tx: watch::Sender<WatchState>,
}

impl DuelWatcher {
    pub fn new(
        duel_id: DuelId,
        self_uid: UserId,
        store: Arc<dyn ProgressStore>,
        coordinator: SettlementCoordinator,
    ) -> Self {
        let (state_tx, _) = watch::channel(WatchState::Idle);
        Self {
            duel_id,
            self_uid,
            store,
            coordinator,
            state: WatchState::Idle,
            settle_requested: false,
            state_tx,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn state_receiver(&self) -> watch::Receiver<WatchState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: WatchState) {
        if self.state != state {
            debug!(duel = %self.duel_id, from = ?self.state, to = ?state, "watcher state");
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    /// Pure transition for one snapshot (`None` = document gone)
    pub fn observe(&mut self, duel: Option<&Duel>) -> WatchAction {
        if self.state.is_terminal() {
            return WatchAction::Done;
        }
        let Some(duel) = duel else {
            self.set_state(WatchState::Unavailable);
            return WatchAction::Unavailable;
        };

        if duel.is_completed() {
            self.set_state(WatchState::Settled);
            WatchAction::Done
        } else if duel.is_ready_to_settle() {
            if self.settle_requested {
                return WatchAction::Wait;
            }
            self.settle_requested = true;
            self.set_state(WatchState::Settling);
            WatchAction::Settle
        } else {
            self.set_state(WatchState::ResultsPending);
            WatchAction::Wait
        }
    }

    /// Feed one snapshot through the state machine, settling if it is time
    pub async fn handle(&mut self, duel: Option<&Duel>) -> Result<Option<SettlementReport>, DuelError> {
        match self.observe(duel) {
            WatchAction::Wait | WatchAction::Done => Ok(None),
            WatchAction::Unavailable => Err(DuelError::DuelUnavailable(self.duel_id.clone())),
            WatchAction::Settle => self.settle().await,
        }
    }

    async fn settle(&mut self) -> Result<Option<SettlementReport>, DuelError> {
        match self.coordinator.settle(&self.duel_id, &self.self_uid).await {
            Ok(report) if report.is_final() => {
                self.set_state(WatchState::Settled);
                Ok(Some(report))
            }
            Ok(_) => {
                // Not ready after all; wait for the next change
                self.settle_requested = false;
                self.set_state(WatchState::ResultsPending);
                Ok(None)
            }
            Err(e) if e.is_soft() => {
                warn!(duel = %self.duel_id, "Settlement attempt failed, will retry on next change: {}", e);
                self.settle_requested = false;
                self.set_state(WatchState::ResultsPending);
                Ok(None)
            }
            Err(DuelError::DuelUnavailable(id)) => {
                self.set_state(WatchState::Unavailable);
                Err(DuelError::DuelUnavailable(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Drive the watcher until it reaches a terminal state or the feed closes
    pub async fn run(mut self, mut subscription: DuelSubscription) -> Result<WatchResult, DuelError> {
        let mut report = None;
        while let Some(event) = subscription.next(self.store.as_ref()).await? {
            let snapshot = match &event {
                DuelEvent::Changed(duel) => Some(duel),
                DuelEvent::Deleted => None,
            };
            if let Some(r) = self.handle(snapshot).await? {
                report = Some(r);
            }
            if self.state.is_terminal() {
                break;
            }
        }
        Ok(WatchResult {
            state: self.state,
            report,
        })
    }

    /// Subscribe and run on the tokio runtime
    pub fn spawn(self) -> WatchHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let state = self.state_receiver();
        let task = tokio::spawn(self.run_until_cancelled(cancel_rx));

        WatchHandle {
            cancel: Some(cancel_tx),
            state,
            task,
        }
    }

    async fn run_until_cancelled(
        self,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<Option<WatchResult>, DuelError> {
        let duel_id = self.duel_id.clone();
        let subscription = watch_duel(self.store.as_ref(), &duel_id).await?;
        tokio::select! {
            _ = cancel_rx => {
                info!(duel = %duel_id, "duel watcher cancelled");
                Ok(None)
            }
            result = self.run(subscription) => result.map(Some),
        }
    }
}

/// Handle to a spawned [`DuelWatcher`]
pub struct WatchHandle {
    cancel: Option<oneshot::Sender<()>>,
    state: watch::Receiver<WatchState>,
    task: JoinHandle<Result<Option<WatchResult>, DuelError>>,
}

impl WatchHandle {
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Wait until the watcher reports `target` (or stops)
    pub async fn wait_for(&mut self, target: WatchState) -> WatchState {
        let _ = self.state.wait_for(|s| *s == target || s.is_terminal()).await;
        *self.state.borrow()
    }

    /// Tear the subscription down. Safe at any point.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// `Ok(None)` when the watcher was cancelled before finishing
    pub async fn join(self) -> Result<Option<WatchResult>, DuelError> {
        self.task.await.map_err(StoreError::from)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::PlayerResult;
    use crate::duel::RewardPolicy;
    use crate::store::{MemoryStore, RetryPolicy};
    use chrono::Utc;

    fn watcher(store: Arc<MemoryStore>) -> DuelWatcher {
        let coordinator = SettlementCoordinator::new(
            store.clone(),
            Arc::new(SystemClock),
            RewardPolicy::default(),
            Vec::new(),
            RetryPolicy::default(),
        );
        DuelWatcher::new(DuelId::from("d1"), UserId::from("alice"), store, coordinator)
    }

    fn duel() -> Duel {
        Duel::new(
            DuelId::from("d1"),
            UserId::from("alice"),
            UserId::from("bob"),
            "history",
            6,
            Utc::now(),
        )
    }

    #[test]
    fn test_observe_transitions() {
        let mut w = watcher(Arc::new(MemoryStore::new()));
        assert_eq!(w.state(), WatchState::Idle);

        let mut d = duel();
        assert_eq!(w.observe(Some(&d)), WatchAction::Wait);
        assert_eq!(w.state(), WatchState::ResultsPending);

        d.results.insert(UserId::from("alice"), PlayerResult::new(3, 30, "A"));
        d.results.insert(UserId::from("bob"), PlayerResult::new(4, 30, "B"));
        assert_eq!(w.observe(Some(&d)), WatchAction::Settle);
        assert_eq!(w.state(), WatchState::Settling);
        // One-shot: the same snapshot again does not settle twice
        assert_eq!(w.observe(Some(&d)), WatchAction::Wait);
    }

    #[test]
    fn test_completed_snapshot_settles_without_coordinator() {
        let mut w = watcher(Arc::new(MemoryStore::new()));
        let mut d = duel();
        d.results.insert(UserId::from("alice"), PlayerResult::new(3, 30, "A"));
        d.results.insert(UserId::from("bob"), PlayerResult::new(4, 30, "B"));
        d.mark_completed(&UserId::from("bob"), Utc::now()).unwrap();

        assert_eq!(w.observe(Some(&d)), WatchAction::Done);
        assert_eq!(w.state(), WatchState::Settled);
    }

    #[tokio::test]
    async fn test_deleted_duel_is_unavailable() {
        let mut w = watcher(Arc::new(MemoryStore::new()));
        let res = w.handle(None).await;
        assert!(matches!(res, Err(DuelError::DuelUnavailable(_))));
        assert_eq!(w.state(), WatchState::Unavailable);
    }
}
