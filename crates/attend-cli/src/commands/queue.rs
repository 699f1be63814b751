use std::path::Path;

use attend_core::CheckInQueue;
use chrono::Utc;

use crate::cli::QueueCommands;
use crate::commands::common::{
    failed_to_list_item, format_failed_lines, format_pending_lines, open_queue,
    pending_to_list_item,
};
use crate::error::CliError;

pub async fn run_queue(command: QueueCommands, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;

    match command {
        QueueCommands::List { json } => {
            let items = queue.list().await?;
            if json {
                let now_ms = Utc::now().timestamp_millis();
                let payload = items
                    .iter()
                    .map(|item| pending_to_list_item(item, now_ms))
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if items.is_empty() {
                println!("No pending check-ins.");
            } else {
                for line in format_pending_lines(&items) {
                    println!("{line}");
                }
            }
        }
        QueueCommands::Failed { json } => {
            let items = queue.failed().await?;
            if json {
                let now_ms = Utc::now().timestamp_millis();
                let payload = items
                    .iter()
                    .map(|failed| failed_to_list_item(failed, now_ms))
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if items.is_empty() {
                println!("No failed check-ins.");
            } else {
                for line in format_failed_lines(&items) {
                    println!("{line}");
                }
            }
        }
        QueueCommands::Count => {
            println!("{}", queue.count().await?);
        }
        QueueCommands::Clear => {
            let pending = queue.count().await?;
            queue.clear().await?;
            println!("Cleared {pending} pending check-in(s).");
        }
    }

    Ok(())
}
