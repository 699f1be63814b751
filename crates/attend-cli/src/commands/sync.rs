use std::path::Path;

use attend_core::triggers::background_wake;
use attend_core::SyncOrchestrator;

use crate::commands::common::{build_client, format_report_lines, open_queue, resolve_profile};
use crate::error::CliError;

pub async fn run_sync(
    background: bool,
    json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let profile = resolve_profile(profile)?;
    let client = build_client(&profile)?;
    let queue = open_queue(db_path).await?;
    let orchestrator = SyncOrchestrator::new(queue, client);

    if background {
        let result = background_wake(&orchestrator).await;
        let label = serde_json::to_value(result)?;
        if json {
            println!("{}", serde_json::json!({ "result": label }));
        } else {
            println!("{}", label.as_str().unwrap_or_default());
        }
        return Ok(());
    }

    let report = orchestrator.run().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
