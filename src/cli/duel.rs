//! Duel commands: challenge, accept, submit

use anyhow::Result;

use quizduel::duel::{Disposition, SettlementReport};
use quizduel::progression::ProgressionEvent;
use quizduel::{DuelId, UserId};

use super::{user_facing, Context};

pub async fn challenge_command(
    ctx: &Context,
    from: &str,
    to: &str,
    topic: &str,
    grade: u8,
) -> Result<()> {
    let engine = ctx.engine()?;
    let duel = engine
        .duels()
        .issue_challenge(&UserId::from(from), &UserId::from(to), topic, grade)
        .await
        .map_err(user_facing)?;

    println!("Challenge sent: {}", duel.id);
    println!("  {} vs {} | {} (grade {})", from, to, duel.topic, duel.grade);
    Ok(())
}

pub async fn accept_command(ctx: &Context, duel_id: &str, user: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let duel = engine
        .duels()
        .accept_challenge(&DuelId::from(duel_id), &UserId::from(user))
        .await
        .map_err(user_facing)?;

    println!("Duel {} is {}", duel.id, duel.status);
    Ok(())
}

/// Submit a result, then try to settle as this player's device would
pub async fn submit_command(
    ctx: &Context,
    duel_id: &str,
    user: &str,
    score: u32,
    time: u32,
    nickname: &str,
) -> Result<()> {
    let engine = ctx.engine()?;
    let duel_id = DuelId::from(duel_id);
    let user = UserId::from(user);

    engine
        .duels()
        .submit_result(&duel_id, &user, score, time, nickname)
        .await
        .map_err(user_facing)?;
    println!("Result recorded: {} points in {}s", score, time);

    let report = engine
        .settlement()
        .settle(&duel_id, &user)
        .await
        .map_err(user_facing)?;
    print_report(&report);
    Ok(())
}

pub fn print_report(report: &SettlementReport) {
    match report.disposition {
        Disposition::NotReady => println!("Waiting for the opponent's result."),
        Disposition::AlreadySettled | Disposition::Settled => {
            if let Some(outcome) = report.self_outcome {
                println!("Duel finished: you {}", outcome);
            }
        }
    }

    for event in &report.events {
        match event {
            ProgressionEvent::XpAwarded { user, reward, .. } => {
                println!("  {}: {}", user, reward);
            }
            ProgressionEvent::LevelUp { user, level_up } => {
                println!(
                    "  {}: level {} -> {} ({})",
                    user, level_up.old_level, level_up.new_level, level_up.new_title
                );
            }
            ProgressionEvent::QuestCompleted(completion) => {
                println!(
                    "  {}: quest \"{}\" complete ({})",
                    completion.user, completion.title, completion.reward
                );
            }
        }
    }
}
