use crate::auth::{clear_stored_token, resolve_token, store_token};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;

    match command {
        AuthCommands::SetToken { token, profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            if config.profile(&profile_name).is_none() {
                tracing::warn!(
                    "Profile '{profile_name}' has no config yet; run `attend config init --profile {profile_name}`"
                );
            }
            store_token(&profile_name, &token)?;
            println!("Stored API token for profile '{profile_name}'");
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            match resolve_token(&profile_name)? {
                Some((_, source)) => println!(
                    "Profile '{profile_name}' has an API token (from {})",
                    source.label()
                ),
                None => println!("Profile '{profile_name}' has no API token."),
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            clear_stored_token(&profile_name)?;
            println!("Removed API token for profile '{profile_name}'");
            Ok(())
        }
    }
}
