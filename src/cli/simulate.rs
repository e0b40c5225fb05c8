//! Simulate command: two devices racing to settle the same duels

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::info;

use quizduel::clock::SystemClock;
use quizduel::duel::Disposition;
use quizduel::store::MemoryStore;
use quizduel::{Engine, UserId};

use super::{user_facing, Context};

const WATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Deterministic scores so a run can be repeated
fn scripted_result(round: u32, player: u32) -> (u32, u32) {
    let score = (round * 7 + player * 3) % 11;
    let time = 30 + (round * 13 + player * 5) % 40;
    (score, time)
}

pub async fn simulate_command(ctx: &Context, rounds: u32, conflicts: u32) -> Result<()> {
    let config = ctx.load_config()?;
    // More conflicts than attempts would leave the watchers waiting for a
    // change that never comes
    let conflicts = conflicts.min(config.settlement.max_attempts.saturating_sub(1));
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Arc::new(SystemClock), &config);

    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    for round in 1..=rounds {
        let duel = engine
            .duels()
            .issue_challenge(&alice, &bob, "math", 5)
            .await
            .map_err(user_facing)?;
        engine
            .duels()
            .accept_challenge(&duel.id, &bob)
            .await
            .map_err(user_facing)?;

        // One watcher per device, both following the same duel
        let watchers = [
            engine.watcher(&duel.id, &alice).spawn(),
            engine.watcher(&duel.id, &bob).spawn(),
        ];

        let (score_a, time_a) = scripted_result(round, 0);
        let (score_b, time_b) = scripted_result(round, 1);
        engine
            .duels()
            .submit_result(&duel.id, &alice, score_a, time_a, "Alice")
            .await
            .map_err(user_facing)?;
        engine
            .duels()
            .submit_result(&duel.id, &bob, score_b, time_b, "Bob")
            .await
            .map_err(user_facing)?;
        store.inject_conflicts(conflicts);

        let results = futures::future::join_all(
            watchers
                .into_iter()
                .map(|handle| tokio::time::timeout(WATCH_TIMEOUT, handle.join())),
        )
        .await;
        // Settlement may have finished before the injection landed
        store.inject_conflicts(0);

        let mut settled = 0;
        for result in results {
            let result = result
                .context("Watcher did not finish in time")?
                .map_err(user_facing)?;
            if let Some(report) = result.and_then(|r| r.report) {
                if report.disposition == Disposition::Settled {
                    settled += 1;
                }
            }
        }
        if settled != 1 {
            bail!("Round {}: duel settled {} times", round, settled);
        }

        let duel = engine.duels().get_duel(&duel.id).await.map_err(user_facing)?;
        let outcome = duel.outcome_for(&alice).map_err(user_facing)?;
        info!(round, duel = %duel.id, "simulated round finished");
        println!(
            "Round {:>3}: alice {}/{}s vs bob {}/{}s -> alice {} (settled by {})",
            round,
            score_a,
            time_a,
            score_b,
            time_b,
            outcome,
            duel.settled_by
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_default()
        );
    }

    for user in [&alice, &bob] {
        let progress = engine.progression().progress(user).await.map_err(user_facing)?;
        println!(
            "{}: level {}, {}/{} XP, {} coins",
            user, progress.level, progress.xp, progress.xp_to_next_level, progress.coins
        );
    }
    println!(
        "Store: {} commits, {} conflicts",
        store.commit_count(),
        store.conflict_count()
    );
    Ok(())
}
