use std::path::Path;

use attend_core::models::DeviceInfo;
use attend_core::{CheckInAck, CheckInOutcome, CheckInService, ConnectivityState, LocationFix};
use serde::Serialize;

use crate::commands::common::{
    build_client, format_ack, open_queue, probe_connectivity, resolve_profile,
};
use crate::error::CliError;

pub struct CheckInArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub is_mock: bool,
    pub photo_ref: Option<String>,
    pub offline: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckInOutcomeItem {
    Recorded {
        ack: CheckInAck,
    },
    Queued {
        local_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

pub async fn run_check_in(
    args: CheckInArgs,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let profile = resolve_profile(profile)?;
    let client = build_client(&profile)?;
    let queue = open_queue(db_path).await?;

    let connectivity = if args.offline {
        ConnectivityState::OFFLINE
    } else {
        probe_connectivity(&profile.config).await?
    };
    tracing::debug!(online = connectivity.is_online(), "Resolved connectivity");

    let mut fix = LocationFix::new(args.latitude, args.longitude).mocked(args.is_mock);
    if let Some(accuracy) = args.accuracy_m {
        fix = fix.with_accuracy(accuracy);
    }

    let service = CheckInService::new(
        queue,
        client,
        DeviceInfo::current(profile.config.device_model.clone()),
    )
    .with_office(profile.config.office);
    let outcome = service.check_in(fix, args.photo_ref, connectivity).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome_to_item(&outcome))?
        );
    } else {
        println!("{}", format_outcome(&outcome));
    }
    Ok(())
}

pub fn outcome_to_item(outcome: &CheckInOutcome) -> CheckInOutcomeItem {
    match outcome {
        CheckInOutcome::Online(ack) => CheckInOutcomeItem::Recorded { ack: ack.clone() },
        CheckInOutcome::Offline { local_id } => CheckInOutcomeItem::Queued {
            local_id: local_id.to_string(),
            reason: None,
        },
        CheckInOutcome::Queued { local_id, reason } => CheckInOutcomeItem::Queued {
            local_id: local_id.to_string(),
            reason: Some(reason.to_string()),
        },
    }
}

pub fn format_outcome(outcome: &CheckInOutcome) -> String {
    match outcome {
        CheckInOutcome::Online(ack) => format_ack(ack),
        CheckInOutcome::Offline { local_id } => {
            format!("Offline: check-in {local_id} queued and will be sent on the next sync.")
        }
        CheckInOutcome::Queued { local_id, reason } => {
            format!("{reason}. Check-in {local_id} queued and will be sent on the next sync.")
        }
    }
}
