use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use attend_core::geo::Geofence;
use attend_core::models::{CheckInKind, Coordinates, DeviceInfo, FailureKind, PunctualityStatus};
use attend_core::{
    CheckInAck, CheckInEvent, CheckInOutcome, CheckInQueue, LocalId, SubmitError, SyncReport,
};
use pretty_assertions::assert_eq;

use crate::commands::check_in::{format_outcome, outcome_to_item};
use crate::commands::common::{
    format_ack, format_pending_lines, format_relative_time, format_report_lines,
    format_timestamp, open_queue, pending_to_list_item, resolve_db_path,
};
use crate::commands::config::{merge_profile, ProfileUpdate};
use crate::commands::status::StatusReport;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn sample_ack() -> CheckInAck {
    CheckInAck {
        log_id: 42,
        kind: CheckInKind::CheckIn,
        status: PunctualityStatus::Late,
        status_label: None,
        office_name: Some("HQ".to_string()),
        distance_meters: Some(12.4),
        time: Some("08:15:22".to_string()),
    }
}

fn sample_event() -> CheckInEvent {
    CheckInEvent::capture(
        Coordinates::new(21.0278, 105.8342),
        DeviceInfo::current("cli-test"),
    )
}

#[test]
fn format_relative_time_uses_expected_buckets() {
    let now = 10 * 24 * 60 * 60 * 1000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
}

#[test]
fn format_timestamp_renders_utc() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn resolve_db_path_prefers_explicit_flag() {
    let explicit = PathBuf::from("/tmp/explicit-attend.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn format_ack_includes_server_details() {
    assert_eq!(
        format_ack(&sample_ack()),
        "Recorded check-in #42 (late) at 08:15:22, HQ (12 m from office)"
    );
}

#[test]
fn format_ack_prefers_server_status_label() {
    let ack = CheckInAck {
        status_label: Some("Đi muộn".to_string()),
        office_name: None,
        distance_meters: None,
        time: None,
        ..sample_ack()
    };
    assert_eq!(format_ack(&ack), "Recorded check-in #42 (Đi muộn)");
}

#[test]
fn online_outcome_serializes_as_recorded() {
    let item = outcome_to_item(&CheckInOutcome::Online(sample_ack()));
    let value = serde_json::to_value(item).unwrap();
    assert_eq!(value["status"], "recorded");
    assert_eq!(value["ack"]["log_id"], 42);
    assert_eq!(value["ack"]["type"], "CHECK_IN");
}

#[test]
fn offline_outcome_serializes_as_queued_without_reason() {
    let local_id = LocalId::new();
    let item = outcome_to_item(&CheckInOutcome::Offline { local_id });
    let value = serde_json::to_value(item).unwrap();
    assert_eq!(value["status"], "queued");
    assert_eq!(value["local_id"], local_id.to_string());
    assert!(value.get("reason").is_none());
}

#[test]
fn queued_outcome_mentions_reason_and_id() {
    let local_id = LocalId::new();
    let outcome = CheckInOutcome::Queued {
        local_id,
        reason: SubmitError::Network("connection refused".to_string()),
    };

    let rendered = format_outcome(&outcome);
    assert!(rendered.contains(&local_id.to_string()));
    assert!(rendered.contains("connection refused"));

    let value = serde_json::to_value(outcome_to_item(&outcome)).unwrap();
    assert!(value["reason"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[test]
fn format_report_lines_handles_empty_and_failed_runs() {
    assert_eq!(
        format_report_lines(&SyncReport::empty()),
        vec!["Nothing to sync.".to_string()]
    );

    let report: SyncReport = serde_json::from_value(serde_json::json!({
        "success": 2,
        "failed": 1,
        "errors": [{
            "local_id": LocalId::new().to_string(),
            "message": "Check-in rejected: outside office",
            "kind": "permanent",
        }],
    }))
    .unwrap();
    let lines = format_report_lines(&report);
    assert_eq!(lines[0], "Synced 2 check-in(s), 1 failed.");
    assert!(lines[1].contains("[permanent] Check-in rejected: outside office"));
    assert_eq!(report.errors[0].kind, FailureKind::Permanent);
}

#[test]
fn merge_profile_prefers_explicit_then_env_then_existing() {
    let existing = CliProfile {
        api_base_url: Some("https://old.example.com".to_string()),
        request_timeout_ms: Some(5_000),
        device_model: Some("Pixel 6".to_string()),
        office: Some(Geofence {
            latitude: 10.0,
            longitude: 106.0,
            radius_m: 100.0,
        }),
    };

    let merged = merge_profile(
        &existing,
        ProfileUpdate {
            api_url: None,
            timeout_ms: Some(2_000),
            device_model: Some("  ".to_string()),
            office: None,
        },
        Some("https://env.example.com/".to_string()),
        Some(9_000),
    )
    .unwrap();

    assert_eq!(
        merged.api_base_url.as_deref(),
        Some("https://env.example.com")
    );
    assert_eq!(merged.request_timeout_ms, Some(2_000));
    assert_eq!(merged.device_model.as_deref(), Some("Pixel 6"));
    assert_eq!(merged.office, existing.office);
}

#[test]
fn merge_profile_rejects_insecure_remote_url() {
    let result = merge_profile(
        &CliProfile::default(),
        ProfileUpdate {
            api_url: Some("http://hr.example.com".to_string()),
            ..ProfileUpdate::default()
        },
        None,
        None,
    );
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn merge_profile_rejects_invalid_office_radius() {
    let result = merge_profile(
        &CliProfile::default(),
        ProfileUpdate {
            api_url: Some("http://localhost:8000".to_string()),
            office: Some(Geofence {
                latitude: 10.0,
                longitude: 106.0,
                radius_m: -5.0,
            }),
            ..ProfileUpdate::default()
        },
        None,
        None,
    );
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn status_report_lines_show_missing_config() {
    let report = StatusReport {
        profile: "default".to_string(),
        api_base_url: None,
        token_source: None,
        db_path: "/tmp/attend.db".to_string(),
        pending: 3,
        failed: 1,
    };
    let lines = report.lines();
    assert!(lines.contains(&"API:       (not configured)".to_string()));
    assert!(lines.contains(&"Pending:   3".to_string()));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn queue_listing_reflects_retry_bookkeeping() {
    let db_path = unique_test_db_path();

    {
        let queue = open_queue(&db_path).await.unwrap();
        let first = queue.enqueue(sample_event()).await.unwrap();
        let second = queue.enqueue(sample_event()).await.unwrap();
        queue
            .increment_retry(&first, Some("HTTP 503"))
            .await
            .unwrap();

        let items = queue.list().await.unwrap();
        assert_eq!(items[0].local_id, second);

        let lines = format_pending_lines(&items);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("retries=0"));
        assert!(lines[1].contains("retries=1  last_error=HTTP 503"));

        let listed = pending_to_list_item(&items[1], items[1].enqueued_at);
        assert_eq!(listed.local_id, first.to_string());
        assert_eq!(listed.relative_time, "just now");
        assert_eq!(listed.last_error.as_deref(), Some("HTTP 503"));
    }

    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn queue_survives_reopen_through_cli_helpers() {
    let db_path = unique_test_db_path();

    {
        let queue = open_queue(&db_path).await.unwrap();
        queue.enqueue(sample_event()).await.unwrap();
    }
    {
        let queue = open_queue(&db_path).await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 1);
        queue.clear().await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    cleanup_db_files(&db_path);
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("attend-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
