//! Housing checklist - Main Entry Point

use clap::Parser;
use housing_checklist::cli::{cmd_explore, cmd_fetch, cmd_prepare, cmd_run, load_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "housing_checklist=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Fetch { url, dir } => {
            cmd_fetch(&load_config(config_path, dir)?, url.as_deref())?;
        }
        Commands::Explore { dir } => {
            cmd_explore(&load_config(config_path, dir)?)?;
        }
        Commands::Prepare { dir, output } => {
            cmd_prepare(&load_config(config_path, dir)?, &output)?;
        }
        Commands::Run { dir, skip_grid_search } => {
            cmd_run(&load_config(config_path, dir)?, skip_grid_search)?;
        }
    }

    Ok(())
}
