//! Init command implementation

use anyhow::{bail, Result};

use quizduel::config::Config;

use super::Context;

/// Write the default config (settlement retries, rewards, quest table)
pub async fn init_command(ctx: &Context, force: bool) -> Result<()> {
    let config_path = ctx.config_path();

    if !Config::init_file(config_path, force)? {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    println!("Created: {}", config_path.display());
    Ok(())
}
