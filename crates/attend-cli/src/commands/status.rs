use std::path::Path;

use attend_core::CheckInQueue;
use serde::Serialize;

use crate::auth::resolve_token;
use crate::commands::common::open_queue;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub profile: String,
    pub api_base_url: Option<String>,
    pub token_source: Option<&'static str>,
    pub db_path: String,
    pub pending: usize,
    pub failed: usize,
}

impl StatusReport {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Profile:   {}", self.profile),
            format!(
                "API:       {}",
                self.api_base_url.as_deref().unwrap_or("(not configured)")
            ),
            format!("Token:     {}", self.token_source.unwrap_or("(none)")),
            format!("Database:  {}", self.db_path),
            format!("Pending:   {}", self.pending),
            format!("Failed:    {}", self.failed),
        ]
    }
}

pub async fn run_status(json: bool, db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let api_base_url = config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .client_config()
        .map_err(CliError::Config)?
        .map(|client_config| client_config.api_base_url);
    let token_source = resolve_token(&profile_name)?.map(|(_, source)| source.label());

    let queue = open_queue(db_path).await?;
    let report = StatusReport {
        profile: profile_name,
        api_base_url,
        token_source,
        db_path: db_path.display().to_string(),
        pending: queue.count().await?,
        failed: queue.failed().await?.len(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
    }
    Ok(())
}
