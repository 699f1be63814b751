use std::env;

use attend_core::config::normalize_api_base_url;
use attend_core::geo::Geofence;

use crate::cli::ConfigCommands;
use crate::config_profiles::{
    normalize_text_option, CliProfile, CliProfilesConfig, API_TIMEOUT_ENV, API_URL_ENV,
};
use crate::error::CliError;

/// Values passed to `config init`, before merging with env and stored config
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub device_model: Option<String>,
    pub office: Option<Geofence>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_url,
            timeout_ms,
            device_model,
            office_lat,
            office_lon,
            office_radius,
            no_activate,
        } => {
            let office = match (office_lat, office_lon, office_radius) {
                (Some(latitude), Some(longitude), Some(radius_m)) => Some(Geofence {
                    latitude,
                    longitude,
                    radius_m,
                }),
                _ => None,
            };
            let update = ProfileUpdate {
                api_url,
                timeout_ms,
                device_model,
                office,
            };
            run_config_init(profile.as_deref().or(global_profile), update, no_activate)
        }
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let env_timeout = normalize_text_option(env::var(API_TIMEOUT_ENV).ok())
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                CliError::Config(format!("{API_TIMEOUT_ENV} must be a number of milliseconds"))
            })
        })
        .transpose()?;
    let merged = merge_profile(
        &existing,
        update,
        normalize_text_option(env::var(API_URL_ENV).ok()),
        env_timeout,
    )?;

    *config.profile_mut_or_default(&profile_name) = merged;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    if profile.api_base_url().is_some() {
        println!(
            "Profile '{profile_name}' is ready. Run `attend auth set-token <TOKEN>` to store the API token."
        );
    } else {
        println!("Profile '{profile_name}' is missing: api_url");
    }

    Ok(())
}

/// Merge explicit values over env values over the stored profile, then validate.
pub fn merge_profile(
    existing: &CliProfile,
    update: ProfileUpdate,
    env_api_url: Option<String>,
    env_timeout_ms: Option<u64>,
) -> Result<CliProfile, CliError> {
    let api_base_url = normalize_text_option(update.api_url)
        .or(env_api_url)
        .or_else(|| existing.api_base_url())
        .map(|url| normalize_api_base_url(&url))
        .transpose()
        .map_err(|error| CliError::Config(error.to_string()))?;

    let merged = CliProfile {
        api_base_url,
        request_timeout_ms: update
            .timeout_ms
            .or(env_timeout_ms)
            .or(existing.request_timeout_ms),
        device_model: normalize_text_option(update.device_model)
            .or_else(|| normalize_text_option(existing.device_model.clone())),
        office: update.office.or(existing.office),
    };

    merged
        .client_config_with_overrides(None, None)
        .map_err(CliError::Config)?;
    Ok(merged)
}
