use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use attend_core::triggers::{ConnectivityProbe, IntervalScheduler};
use attend_core::{SyncOrchestrator, SyncWorker};
use tokio::sync::watch;

use crate::commands::common::{build_client, format_report_lines, open_queue, resolve_profile};
use crate::error::CliError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Keep syncing until interrupted.
///
/// A probe against the API base URL stands in for the platform's network
/// listener; the in-process scheduler stands in for the OS background task.
pub async fn run_watch(
    probe_interval_secs: u64,
    background_interval_mins: u64,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    if probe_interval_secs == 0 {
        return Err(CliError::Config(
            "probe interval must be at least one second".to_string(),
        ));
    }

    let profile = resolve_profile(profile)?;
    let client = build_client(&profile)?;
    let queue = open_queue(db_path).await?;
    let orchestrator = Arc::new(SyncOrchestrator::new(queue, client));

    let probe = ConnectivityProbe::new(
        profile.config.api_base_url.clone(),
        Duration::from_secs(probe_interval_secs),
        PROBE_TIMEOUT,
    )?;
    let initial = probe.check().await;
    let (sender, receiver) = watch::channel(initial);
    let probe_task = probe.spawn(sender);

    let mut worker = SyncWorker::new(orchestrator, IntervalScheduler::new())
        .with_background_interval(Duration::from_secs(
            background_interval_mins.saturating_mul(60),
        ));

    println!(
        "Watching {} as profile '{}' ({}). Press Ctrl-C to stop.",
        profile.config.api_base_url,
        profile.name,
        if initial.is_online() { "online" } else { "offline" }
    );
    if let Some(report) = worker.start(receiver).await? {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    tracing::debug!(status = ?worker.status(), "Sync worker running");

    tokio::signal::ctrl_c().await?;

    worker.stop();
    probe_task.abort();
    println!("Stopped.");
    Ok(())
}
