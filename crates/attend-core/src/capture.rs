//! Capture flow: turn a location fix into a confirmed or queued check-in.

use serde::{Deserialize, Serialize};

use crate::client::{SubmissionClient, SubmitError};
use crate::geo::Geofence;
use crate::models::{CheckInAck, CheckInEvent, Coordinates, DeviceInfo, LocalId, PendingCheckIn};
use crate::queue::CheckInQueue;
use crate::triggers::ConnectivityState;
use crate::util::{normalize_text_option, unix_millis_now};
use crate::{Error, Result};

/// Raw position from the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub is_mock: bool,
}

impl LocationFix {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            is_mock: false,
        }
    }

    #[must_use]
    pub const fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    #[must_use]
    pub const fn mocked(mut self, is_mock: bool) -> Self {
        self.is_mock = is_mock;
        self
    }

    /// Reject fixes no location provider could have produced
    pub fn validate(self) -> Result<Coordinates> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if let Some(accuracy) = self.accuracy_m {
            if !accuracy.is_finite() || accuracy < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "accuracy {accuracy} must be a non-negative number of meters"
                )));
            }
        }

        Ok(Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_m: self.accuracy_m,
            is_mock: self.is_mock,
        })
    }
}

/// How a capture ended
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    /// Confirmed by the server right away
    Online(CheckInAck),
    /// No connectivity; stored for a later sync
    Offline { local_id: LocalId },
    /// The online attempt failed in a retryable way; stored for a later sync
    Queued { local_id: LocalId, reason: SubmitError },
}

impl CheckInOutcome {
    pub const fn local_id(&self) -> Option<&LocalId> {
        match self {
            Self::Online(_) => None,
            Self::Offline { local_id } | Self::Queued { local_id, .. } => Some(local_id),
        }
    }
}

/// Captures check-ins, submitting online and queueing when that is not possible
pub struct CheckInService<Q, C> {
    queue: Q,
    client: C,
    device: DeviceInfo,
    office: Option<Geofence>,
}

impl<Q, C> CheckInService<Q, C>
where
    Q: CheckInQueue,
    C: SubmissionClient,
{
    pub const fn new(queue: Q, client: C, device: DeviceInfo) -> Self {
        Self {
            queue,
            client,
            device,
            office: None,
        }
    }

    /// Require captures to fall inside `office`
    #[must_use]
    pub const fn with_office(mut self, office: Option<Geofence>) -> Self {
        self.office = office;
        self
    }

    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Capture a check-in now.
    ///
    /// Offline captures and captures whose online attempt hit a network or
    /// 5xx failure are queued. Rejections and undecodable responses are
    /// returned as errors and nothing is queued. A storage failure while
    /// queueing is returned as an error: the check-in was not recorded.
    pub async fn check_in(
        &self,
        fix: LocationFix,
        photo_ref: Option<String>,
        connectivity: ConnectivityState,
    ) -> Result<CheckInOutcome> {
        let coordinates = fix.validate()?;
        self.ensure_inside_office(&coordinates)?;

        let mut event = CheckInEvent::capture(coordinates, self.device.clone());
        if let Some(photo_ref) = normalize_text_option(photo_ref) {
            event = event.with_photo_ref(photo_ref);
        }

        if !connectivity.is_online() {
            let local_id = self.queue.enqueue(event).await?;
            tracing::info!(%local_id, "Offline, check-in queued");
            return Ok(CheckInOutcome::Offline { local_id });
        }

        let attempt = PendingCheckIn::from_event(event.clone(), unix_millis_now());
        match self.client.submit(&attempt).await {
            Ok(ack) => {
                tracing::info!(log_id = ack.log_id, "Check-in recorded");
                Ok(CheckInOutcome::Online(ack))
            }
            Err(reason) if reason.should_queue() => {
                tracing::warn!("Check-in submission failed, queueing: {reason}");
                let local_id = self.queue.enqueue(event).await?;
                Ok(CheckInOutcome::Queued { local_id, reason })
            }
            Err(error) => Err(error.into()),
        }
    }

    fn ensure_inside_office(&self, coordinates: &Coordinates) -> Result<()> {
        let Some(office) = &self.office else {
            return Ok(());
        };

        let distance = office.distance_m(coordinates);
        if distance > office.radius_m {
            return Err(Error::InvalidInput(format!(
                "position is {distance:.0} m from the office, allowed radius is {:.0} m",
                office.radius_m
            )));
        }
        Ok(())
    }
}
