//! Notifications command implementation

use anyhow::Result;

use quizduel::UserId;

use super::{user_facing, Context};

pub async fn notifications_command(ctx: &Context, user: &str, mark_read: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let user = UserId::from(user);
    let feed = engine.notifications();

    let unread = feed.unread(&user).await.map_err(user_facing)?;
    if unread.is_empty() {
        println!("No new notifications.");
        return Ok(());
    }

    println!("Notifications ({}):\n", unread.len());
    for n in &unread {
        println!(
            "  [{}] {} - {}",
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.title,
            n.body
        );
        if let Some(duel) = n.data.get("duelId").and_then(|v| v.as_str()) {
            println!("    duel: {}", duel);
        }
    }

    if mark_read {
        for n in &unread {
            feed.mark_read(&user, &n.id).await.map_err(user_facing)?;
        }
        println!("\nMarked {} as read.", unread.len());
    }
    Ok(())
}
