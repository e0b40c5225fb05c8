//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use quizduel::clock::ManualClock;
use quizduel::config::Config;
use quizduel::store::MemoryStore;
use quizduel::{Duel, Engine, UserId};

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub engine: Engine,
}

/// Noon UTC, far from any day boundary
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

/// Config with fast retries so races resolve quickly
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.settlement.max_attempts = 20;
    config.settlement.retry_backoff_ms = 1;
    config
}

pub fn fixture() -> Fixture {
    fixture_with(test_config())
}

pub fn fixture_with(config: Config) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = Engine::new(store.clone(), clock.clone(), &config);
    Fixture {
        store,
        clock,
        engine,
    }
}

pub fn alice() -> UserId {
    UserId::from("alice")
}

pub fn bob() -> UserId {
    UserId::from("bob")
}

/// Challenge, accept and submit both results
pub async fn played_duel(engine: &Engine, alice_result: (u32, u32), bob_result: (u32, u32)) -> Duel {
    let duel = engine
        .duels()
        .issue_challenge(&alice(), &bob(), "fractions", 5)
        .await
        .unwrap();
    engine.duels().accept_challenge(&duel.id, &bob()).await.unwrap();
    engine
        .duels()
        .submit_result(&duel.id, &alice(), alice_result.0, alice_result.1, "Alice")
        .await
        .unwrap();
    engine
        .duels()
        .submit_result(&duel.id, &bob(), bob_result.0, bob_result.1, "Bob")
        .await
        .unwrap()
}

pub const WAIT: Duration = Duration::from_secs(5);
