//! Show command implementation

use anyhow::Result;

use quizduel::progression::{progress_to_next, title_for_level};
use quizduel::{DuelId, UserId};

use super::{user_facing, Context};

pub async fn show_duel_command(ctx: &Context, duel_id: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let duel = engine
        .duels()
        .get_duel(&DuelId::from(duel_id))
        .await
        .map_err(user_facing)?;

    println!("Duel {} [{}]", duel.id, duel.status);
    println!("  Topic: {} (grade {})", duel.topic, duel.grade);
    for player in &duel.players {
        match duel.result_of(player).filter(|r| r.is_submitted()) {
            Some(result) => {
                let time = result
                    .time
                    .map(|t| format!("{}s", t))
                    .unwrap_or_else(|| "-".to_string());
                let outcome = duel
                    .outcome_for(player)
                    .map(|o| format!(" -> {}", o))
                    .unwrap_or_default();
                println!(
                    "  {} ({}): {} points, {}{}",
                    player,
                    result.nickname,
                    result.score.unwrap_or(0),
                    time,
                    outcome
                );
            }
            None => println!("  {}: waiting", player),
        }
    }
    if let (Some(by), Some(at)) = (&duel.settled_by, duel.settled_at) {
        println!("  Settled by {} at {}", by, at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

pub async fn show_user_command(ctx: &Context, user: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let user = UserId::from(user);
    let progress = engine
        .progression()
        .progress(&user)
        .await
        .map_err(user_facing)?;
    let daily = engine
        .quests()
        .daily_state(&user)
        .await
        .map_err(user_facing)?;

    println!("{} - Level {} {}", user, progress.level, title_for_level(progress.level));
    println!(
        "  XP: {}/{} ({:.0}%)",
        progress.xp,
        progress.xp_to_next_level,
        progress_to_next(&progress) * 100.0
    );
    println!("  Coins: {}", progress.coins);

    println!("\nDaily quests:");
    for quest in engine.quests().quests() {
        let mark = if daily.is_completed(&quest.id) { "x" } else { " " };
        println!(
            "  [{}] {} {}/{} ({})",
            mark,
            quest.title,
            daily.progress_of(&quest.id).min(quest.target),
            quest.target,
            quest.reward
        );
    }
    Ok(())
}
