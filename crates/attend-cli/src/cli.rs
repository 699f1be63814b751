use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attend")]
#[command(about = "Record attendance check-ins, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local queue database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for API and token configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a check-in at the given position
    CheckIn {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Horizontal accuracy in meters
        #[arg(long, value_name = "METERS")]
        accuracy: Option<f64>,
        /// Mark the position as coming from a mock provider
        #[arg(long)]
        mock: bool,
        /// Reference to an already uploaded photo
        #[arg(long, value_name = "REF")]
        photo: Option<String>,
        /// Skip the connectivity probe and queue the check-in
        #[arg(long)]
        offline: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect the offline queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Submit queued check-ins now
    Sync {
        /// Run as a background wake and print the fetch result
        #[arg(long)]
        background: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing on connectivity changes and on a recurring schedule
    Watch {
        /// Seconds between connectivity probes
        #[arg(long, default_value = "30", value_name = "SECS")]
        probe_interval_secs: u64,
        /// Minutes between background wakes
        #[arg(long, default_value = "15", value_name = "MINS")]
        background_interval_mins: u64,
    },
    /// Show queue, profile, and token status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage the API token for a profile
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List pending check-ins, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List check-ins that exhausted their retries
    Failed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the number of pending check-ins
    Count,
    /// Drop every pending check-in
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Attendance API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Request timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Device model reported with each check-in
        #[arg(long, value_name = "MODEL")]
        device_model: Option<String>,
        /// Office latitude for the local geofence check
        #[arg(long, allow_negative_numbers = true, requires_all = ["office_lon", "office_radius"])]
        office_lat: Option<f64>,
        /// Office longitude for the local geofence check
        #[arg(long, allow_negative_numbers = true, requires_all = ["office_lat", "office_radius"])]
        office_lon: Option<f64>,
        /// Office geofence radius in meters
        #[arg(long, value_name = "METERS", requires_all = ["office_lat", "office_lon"])]
        office_radius: Option<f64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store the API bearer token in the system keychain
    SetToken {
        /// Bearer token issued by the attendance service
        token: String,
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Show whether a token is stored for the profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Remove the stored token
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
