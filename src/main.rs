use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "quizduel")]
#[command(about = "Asynchronous quiz duels with race-safe settlement and progression")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.quizduel/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the duel database (overrides [storage] path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Challenge another player to a duel
    Challenge {
        /// Challenging user id
        #[arg(long)]
        from: String,
        /// Challenged user id
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "math")]
        topic: String,
        #[arg(long, default_value_t = 5)]
        grade: u8,
    },

    /// Accept a pending challenge
    Accept {
        duel: String,
        #[arg(long)]
        user: String,
    },

    /// Submit a quiz result and settle the duel if both results are in
    Submit {
        duel: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        score: u32,
        /// Completion time in seconds
        #[arg(long)]
        time: u32,
        #[arg(long)]
        nickname: Option<String>,
    },

    /// Show a duel, or a player's level and daily quests
    Show {
        /// Duel id
        duel: Option<String>,
        /// User id
        #[arg(long, conflicts_with = "duel")]
        user: Option<String>,
    },

    /// List a player's unread notifications
    Notifications {
        #[arg(long)]
        user: String,
        /// Mark everything listed as read
        #[arg(long)]
        mark_read: bool,
    },

    /// Race two in-process devices settling the same duels
    Simulate {
        /// Number of duels to play
        #[arg(long, default_value_t = 10)]
        rounds: u32,
        /// Store conflicts injected once both results are in
        #[arg(long, default_value_t = 0)]
        conflicts: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let ctx = cli::Context::new(cli.config, cli.db);

    match cli.command {
        Commands::Init { force } => {
            cli::init::init_command(&ctx, force).await?;
        }
        Commands::Challenge {
            from,
            to,
            topic,
            grade,
        } => {
            cli::duel::challenge_command(&ctx, &from, &to, &topic, grade).await?;
        }
        Commands::Accept { duel, user } => {
            cli::duel::accept_command(&ctx, &duel, &user).await?;
        }
        Commands::Submit {
            duel,
            user,
            score,
            time,
            nickname,
        } => {
            let nickname = nickname.unwrap_or_else(|| user.clone());
            cli::duel::submit_command(&ctx, &duel, &user, score, time, &nickname).await?;
        }
        Commands::Show { duel, user } => match (duel, user) {
            (Some(duel), _) => cli::show::show_duel_command(&ctx, &duel).await?,
            (None, Some(user)) => cli::show::show_user_command(&ctx, &user).await?,
            (None, None) => anyhow::bail!("Pass a duel id or --user"),
        },
        Commands::Notifications { user, mark_read } => {
            cli::notifications::notifications_command(&ctx, &user, mark_read).await?;
        }
        Commands::Simulate { rounds, conflicts } => {
            cli::simulate::simulate_command(&ctx, rounds, conflicts).await?;
        }
    }

    Ok(())
}
