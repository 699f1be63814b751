//! attend - command-line check-ins with an offline queue

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::filter::{Directive, LevelFilter};

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::check_in::{run_check_in, CheckInArgs};
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::queue::run_queue;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "attend=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::CheckIn {
            lat,
            lon,
            accuracy,
            mock,
            photo,
            offline,
            json,
        } => {
            let args = CheckInArgs {
                latitude: lat,
                longitude: lon,
                accuracy_m: accuracy,
                is_mock: mock,
                photo_ref: photo,
                offline,
                json,
            };
            run_check_in(args, &db_path, profile).await?;
        }
        Commands::Queue { command } => run_queue(command, &db_path).await?,
        Commands::Sync { background, json } => {
            run_sync(background, json, &db_path, profile).await?;
        }
        Commands::Watch {
            probe_interval_secs,
            background_interval_mins,
        } => {
            run_watch(
                probe_interval_secs,
                background_interval_mins,
                &db_path,
                profile,
            )
            .await?;
        }
        Commands::Status { json } => run_status(json, &db_path, profile).await?,
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Auth { command } => run_auth(command, profile)?,
    }

    Ok(())
}
