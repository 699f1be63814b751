use std::env;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use attend_core::models::{
    CheckInKind, FailedCheckIn, FailureKind, PunctualityStatus, SyncItemError,
};
use attend_core::triggers::ConnectivityProbe;
use attend_core::{
    AttendanceClient, CheckInAck, ClientConfig, ConnectivityState, PendingCheckIn, QueueService,
    SyncReport,
};
use chrono::Utc;
use serde::Serialize;

use crate::auth::resolve_token;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "ATTEND_DB_PATH";

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub local_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: String,
    pub enqueued_at: i64,
    pub relative_time: String,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailedListItem {
    #[serde(flatten)]
    pub item: QueueListItem,
    pub failed_at: i64,
    pub failed_at_iso: String,
}

/// Profile-derived settings for talking to the API
pub struct ResolvedProfile {
    pub name: String,
    pub config: ClientConfig,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attend")
        .join("attend.db")
}

pub async fn open_queue(path: &Path) -> Result<QueueService, CliError> {
    Ok(QueueService::open_path(path.to_path_buf()).await?)
}

pub fn resolve_profile(explicit: Option<&str>) -> Result<ResolvedProfile, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(explicit);
    let profile = config.profile(&name).cloned().unwrap_or_default();
    let client_config = profile
        .client_config()
        .map_err(CliError::Config)?
        .ok_or(CliError::NotConfigured)?;

    Ok(ResolvedProfile {
        name,
        config: client_config,
    })
}

pub fn build_client(profile: &ResolvedProfile) -> Result<AttendanceClient, CliError> {
    let token = resolve_token(&profile.name)?.map(|(token, _)| token);
    if token.is_none() {
        tracing::warn!(
            "No API token for profile '{}'; run `attend auth set-token`",
            profile.name
        );
    }
    Ok(AttendanceClient::new(&profile.config)?.with_token(token))
}

pub async fn probe_connectivity(config: &ClientConfig) -> Result<ConnectivityState, CliError> {
    let probe = ConnectivityProbe::new(config.api_base_url.clone(), PROBE_TIMEOUT, PROBE_TIMEOUT)?;
    Ok(probe.check().await)
}

pub fn pending_to_list_item(item: &PendingCheckIn, now_ms: i64) -> QueueListItem {
    QueueListItem {
        local_id: item.local_id.to_string(),
        latitude: item.coordinates.latitude,
        longitude: item.coordinates.longitude,
        captured_at: item.captured_at.to_rfc3339(),
        enqueued_at: item.enqueued_at,
        relative_time: format_relative_time(item.enqueued_at, now_ms),
        retry_count: item.retry_count,
        last_error: item.last_error.clone(),
        photo_ref: item.photo_ref.clone(),
    }
}

pub fn failed_to_list_item(failed: &FailedCheckIn, now_ms: i64) -> FailedListItem {
    FailedListItem {
        item: pending_to_list_item(&failed.item, now_ms),
        failed_at: failed.failed_at,
        failed_at_iso: format_timestamp(failed.failed_at),
    }
}

pub fn format_pending_lines(items: &[PendingCheckIn]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    items
        .iter()
        .map(|item| {
            let id = item.local_id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let position = format!(
                "{:.5},{:.5}",
                item.coordinates.latitude, item.coordinates.longitude
            );
            let relative_time = format_relative_time(item.enqueued_at, now_ms);
            let line = format!(
                "{short_id:<13}  {position:<22}  {relative_time:<10}  retries={}",
                item.retry_count
            );
            match &item.last_error {
                Some(error) => format!("{line}  last_error={error}"),
                None => line,
            }
        })
        .collect()
}

pub fn format_failed_lines(items: &[FailedCheckIn]) -> Vec<String> {
    items
        .iter()
        .map(|failed| {
            format!(
                "{}  {}  retries={}  {}",
                format_timestamp(failed.failed_at),
                failed.item.local_id,
                failed.item.retry_count,
                failed.item.last_error.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

pub fn format_ack(ack: &CheckInAck) -> String {
    let kind = match ack.kind {
        CheckInKind::CheckIn => "check-in",
        CheckInKind::CheckOut => "check-out",
    };
    let status = ack.status_label.clone().unwrap_or_else(|| {
        match ack.status {
            PunctualityStatus::OnTime => "on time",
            PunctualityStatus::Late => "late",
            PunctualityStatus::Early => "early",
        }
        .to_string()
    });

    let mut line = format!("Recorded {kind} #{} ({status})", ack.log_id);
    if let Some(time) = &ack.time {
        let _ = write!(line, " at {time}");
    }
    if let Some(office) = &ack.office_name {
        let _ = write!(line, ", {office}");
    }
    if let Some(distance) = ack.distance_meters {
        let _ = write!(line, " ({distance:.0} m from office)");
    }
    line
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    if report.is_empty() {
        return vec!["Nothing to sync.".to_string()];
    }

    let mut lines = vec![format!(
        "Synced {} check-in(s), {} failed.",
        report.success, report.failed
    )];
    lines.extend(report.errors.iter().map(format_item_error));
    lines
}

fn format_item_error(error: &SyncItemError) -> String {
    let kind = match error.kind {
        FailureKind::Connectivity => "connectivity",
        FailureKind::Transient => "transient",
        FailureKind::Permanent => "permanent",
    };
    format!("  {}  [{kind}] {}", error.local_id, error.message)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
