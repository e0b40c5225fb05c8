//! Duel lifecycle, outcome resolution and settlement

mod lifecycle;
mod outcome;
mod settlement;
mod watcher;

pub use lifecycle::DuelService;
pub use outcome::{resolve, Outcome};
pub use settlement::{Disposition, RewardPolicy, SettlementCoordinator, SettlementReport};
pub use watcher::{DuelWatcher, WatchAction, WatchHandle, WatchResult, WatchState};
