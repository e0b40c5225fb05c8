//! Core domain types: duels, user progression, notifications, rewards

mod duel;
mod notification;
mod reward;
mod user;

pub use duel::{Duel, DuelId, DuelStatus, PlayerResult};
pub use notification::{Notification, NotificationKind};
pub use reward::Reward;
pub use user::{DailyQuestState, UserDoc, UserId, UserProgress};
