//! Client configuration.
//!
//! Provides the validated `ClientConfig` used to build the submission client
//! and the capture flow, and the `QueuePolicy` governing retries and retention.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Geofence;
use crate::util::{is_http_url, is_loopback_url, normalize_text_option};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_DEVICE_MODEL: &str = "unknown";

/// Shortest period the platform allows for a recurring background wake
pub const MIN_BACKGROUND_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Retry ceiling and retention window for the offline queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// Retry count at which an item moves to the failed record
    pub max_retries: u32,
    /// Items older than this are dropped without being submitted
    pub retention: Duration,
}

impl QueuePolicy {
    pub const MAX_RETRIES: u32 = 3;
    pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Retention window in milliseconds, saturating on overflow
    pub fn retention_ms(&self) -> i64 {
        i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX)
    }
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::MAX_RETRIES,
            retention: Self::RETENTION,
        }
    }
}

/// Validated runtime configuration for talking to the attendance backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub office: Option<Geofence>,
    #[serde(default = "default_device_model")]
    pub device_model: String,
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_device_model() -> String {
    DEFAULT_DEVICE_MODEL.to_string()
}

impl ClientConfig {
    /// Build a validated config for the given base URL with defaults elsewhere.
    pub fn new(api_base_url: impl Into<String>) -> Result<Self> {
        Self {
            api_base_url: api_base_url.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            office: None,
            device_model: DEFAULT_DEVICE_MODEL.to_string(),
        }
        .validated()
    }

    #[must_use]
    pub const fn with_office(mut self, office: Geofence) -> Self {
        self.office = Some(office);
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Result<Self> {
        self.request_timeout_ms = timeout_ms;
        self.validated()
    }

    #[must_use]
    pub fn with_device_model(mut self, model: impl Into<String>) -> Self {
        self.device_model =
            normalize_text_option(Some(model.into())).unwrap_or_else(default_device_model);
        self
    }

    /// Parse and validate a JSON config payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Configuration(format!("invalid client config JSON: {error}")))?;
        config.validated()
    }

    /// Normalize fields and reject invalid values.
    pub fn validated(mut self) -> Result<Self> {
        self.api_base_url = normalize_api_base_url(&self.api_base_url)?;

        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(Error::Configuration(format!(
                "request_timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }

        if let Some(office) = self.office {
            validate_geofence(&office)?;
        }

        self.device_model = normalize_text_option(Some(self.device_model))
            .unwrap_or_else(default_device_model);
        Ok(self)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Full URL of an API path, e.g. `endpoint("/hrm/check-in")`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// Require http(s), force https for anything but loopback, strip trailing slashes.
pub fn normalize_api_base_url(raw: &str) -> Result<String> {
    let url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Configuration("api_base_url is required".to_string()))?;

    if !is_http_url(&url) {
        return Err(Error::Configuration(
            "api_base_url must include http:// or https://".to_string(),
        ));
    }
    if !url.starts_with("https://") && !is_loopback_url(&url) {
        return Err(Error::Configuration(
            "api_base_url must use https:// unless it points at localhost".to_string(),
        ));
    }

    Ok(url.trim_end_matches('/').to_string())
}

fn validate_geofence(office: &Geofence) -> Result<()> {
    if !(-90.0..=90.0).contains(&office.latitude) || !(-180.0..=180.0).contains(&office.longitude)
    {
        return Err(Error::Configuration(
            "office coordinates are out of range".to_string(),
        ));
    }
    if !office.radius_m.is_finite() || office.radius_m <= 0.0 {
        return Err(Error::Configuration(
            "office radius must be a positive number of meters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_trailing_slash() {
        let config = ClientConfig::new("https://api.example.com/api/").unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/api");
        assert_eq!(
            config.endpoint("/hrm/check-in"),
            "https://api.example.com/api/hrm/check-in"
        );
    }

    #[test]
    fn rejects_plain_http_for_remote_hosts() {
        let error = ClientConfig::new("http://api.example.com").unwrap_err();
        assert!(error.to_string().contains("https://"));
    }

    #[test]
    fn allows_plain_http_for_localhost() {
        assert!(ClientConfig::new("http://localhost:8000/api").is_ok());
        assert!(ClientConfig::new("http://127.0.0.1:8000").is_ok());
    }

    #[test]
    fn rejects_missing_scheme_and_empty() {
        assert!(ClientConfig::new("api.example.com").is_err());
        assert!(ClientConfig::new("   ").is_err());
    }

    #[test]
    fn timeout_must_be_in_range() {
        let config = ClientConfig::new("https://api.example.com").unwrap();
        assert!(config.clone().with_request_timeout_ms(0).is_err());
        assert!(config.clone().with_request_timeout_ms(60_001).is_err());
        assert_eq!(
            config
                .with_request_timeout_ms(30_000)
                .unwrap()
                .request_timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn from_json_applies_defaults() {
        let config = ClientConfig::from_json(r#"{"api_base_url": "https://api.example.com/"}"#)
            .unwrap();
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.device_model, "unknown");
        assert!(config.office.is_none());
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let error = ClientConfig::from_json(
            r#"{"api_base_url": "https://api.example.com", "use_mock": true}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_non_positive_office_radius() {
        let payload = r#"{
            "api_base_url": "https://api.example.com",
            "office": {"latitude": 10.0, "longitude": 106.0, "radius_m": 0}
        }"#;
        assert!(ClientConfig::from_json(payload).is_err());
    }

    #[test]
    fn queue_policy_defaults() {
        let policy = QueuePolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retention_ms(), 7 * 24 * 60 * 60 * 1000);
    }
}
