//! quizduel - duel settlement and progression engine
//!
//! Two players take the same quiz independently and submit a score and a time.
//! Both devices watch the shared duel record and race to settle it; the engine
//! makes sure exactly one of them completes the duel and grants the rewards.
//!
//! ## Layout
//!
//! - [`store`]: versioned document store with compare-and-set and change feeds
//! - [`duel`]: lifecycle, outcome resolution, settlement and per-device watchers
//! - [`progression`]: XP levels, coins and daily quests
//! - [`notify`]: user-facing notification feed

pub mod clock;
pub mod config;
pub mod domain;
pub mod duel;
pub mod engine;
pub mod error;
pub mod notify;
pub mod progression;
pub mod store;

pub use domain::*;
pub use engine::Engine;
pub use error::{DuelError, GENERIC_FAILURE};
