//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use attend_core::config::ClientConfig;
use attend_core::geo::Geofence;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

pub const PROFILE_ENV: &str = "ATTEND_PROFILE";
pub const API_URL_ENV: &str = "ATTEND_API_URL";
pub const API_TIMEOUT_ENV: &str = "ATTEND_API_TIMEOUT_MS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub office: Option<Geofence>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attend")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    attend_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn api_base_url(&self) -> Option<String> {
        normalize_text_option(self.api_base_url.clone())
    }

    /// Build the validated client config, letting `ATTEND_API_URL` and
    /// `ATTEND_API_TIMEOUT_MS` override the stored values.
    ///
    /// Returns `Ok(None)` when no API URL is known at all.
    pub fn client_config(&self) -> Result<Option<ClientConfig>, String> {
        let env_url = normalize_text_option(std::env::var(API_URL_ENV).ok());
        let env_timeout = normalize_text_option(std::env::var(API_TIMEOUT_ENV).ok())
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| format!("{API_TIMEOUT_ENV} must be a number of milliseconds"))
            })
            .transpose()?;

        self.client_config_with_overrides(env_url, env_timeout)
    }

    pub fn client_config_with_overrides(
        &self,
        api_base_url: Option<String>,
        request_timeout_ms: Option<u64>,
    ) -> Result<Option<ClientConfig>, String> {
        let Some(api_base_url) = api_base_url.or_else(|| self.api_base_url()) else {
            return Ok(None);
        };

        let mut config = ClientConfig::new(api_base_url).map_err(|error| error.to_string())?;
        if let Some(timeout_ms) = request_timeout_ms.or(self.request_timeout_ms) {
            config = config
                .with_request_timeout_ms(timeout_ms)
                .map_err(|error| error.to_string())?;
        }
        if let Some(model) = normalize_text_option(self.device_model.clone()) {
            config = config.with_device_model(model);
        }
        if let Some(office) = self.office {
            config = config
                .with_office(office)
                .validated()
                .map_err(|error| error.to_string())?;
        }
        Ok(Some(config))
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.device_model = normalize_text_option(self.device_model.clone());
    }
}
