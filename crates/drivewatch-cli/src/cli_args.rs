use std::path::PathBuf;

use clap::{Parser, Subcommand};
use drivewatch_runtime::{
    google_api_client::{DEFAULT_DRIVE_ACTIVITY_API_BASE, DEFAULT_DRIVE_API_BASE, DEFAULT_PEOPLE_API_BASE},
    DEFAULT_SLACK_API_BASE, DEFAULT_TRELLO_API_BASE,
};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "drivewatch",
    about = "Watches a Drive folder, reports activity to Slack and tracks deletions on Trello",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "DRIVEWATCH_STATE_DIR",
        default_value = ".drivewatch",
        help = "Directory holding settings.json, cache.json and run locks"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "DRIVEWATCH_GOOGLE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth access token for the Drive, Drive Activity and People APIs"
    )]
    pub google_access_token: Option<String>,

    #[arg(
        long,
        env = "DRIVEWATCH_SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API (xoxb-...)"
    )]
    pub slack_bot_token: Option<String>,

    #[arg(
        long,
        env = "DRIVEWATCH_TRELLO_API_KEY",
        hide_env_values = true,
        help = "Trello API key"
    )]
    pub trello_api_key: Option<String>,

    #[arg(
        long,
        env = "DRIVEWATCH_TRELLO_TOKEN",
        hide_env_values = true,
        help = "Trello API token"
    )]
    pub trello_token: Option<String>,

    #[arg(
        long,
        env = "DRIVEWATCH_DRIVE_API_BASE",
        default_value = DEFAULT_DRIVE_API_BASE,
        help = "Drive v3 API base URL"
    )]
    pub drive_api_base: String,

    #[arg(
        long,
        env = "DRIVEWATCH_DRIVE_ACTIVITY_API_BASE",
        default_value = DEFAULT_DRIVE_ACTIVITY_API_BASE,
        help = "Drive Activity v2 API base URL"
    )]
    pub drive_activity_api_base: String,

    #[arg(
        long,
        env = "DRIVEWATCH_PEOPLE_API_BASE",
        default_value = DEFAULT_PEOPLE_API_BASE,
        help = "People v1 API base URL"
    )]
    pub people_api_base: String,

    #[arg(
        long,
        env = "DRIVEWATCH_SLACK_API_BASE",
        default_value = DEFAULT_SLACK_API_BASE,
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long,
        env = "DRIVEWATCH_TRELLO_API_BASE",
        default_value = DEFAULT_TRELLO_API_BASE,
        help = "Trello REST API base URL"
    )]
    pub trello_api_base: String,

    #[arg(
        long,
        env = "DRIVEWATCH_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Per-request HTTP timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "DRIVEWATCH_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per HTTP request before giving up on retryable failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long,
        env = "DRIVEWATCH_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base delay for exponential retry backoff in milliseconds"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "DRIVEWATCH_LOCK_WAIT_MS",
        default_value_t = 5_000,
        help = "How long to wait for another run of the same command to finish"
    )]
    pub lock_wait_ms: u64,

    #[arg(
        long,
        env = "DRIVEWATCH_LOCK_STALE_MS",
        default_value_t = 30 * 60 * 1_000,
        help = "Age after which a leftover run lock is reclaimed (0 disables reclaiming)"
    )]
    pub lock_stale_ms: u64,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Notify the channel about activity since the stored cursor and open deletion tickets.
    CheckUpdate {
        #[arg(
            long,
            help = "Start point as unix milliseconds or RFC 3339; overrides the stored cursor"
        )]
        since: Option<String>,
    },
    /// Close finished tickets and restore items of autofix and overdue tickets.
    CheckTrello,
    /// Read or edit persisted settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum SettingsCommand {
    /// Print one setting, or every key when none is given.
    Get { key: Option<String> },
    Set { key: String, value: String },
    /// Add an item id to the ignored-items list.
    Ignore { item_id: String },
    /// Remove an item id from the ignored-items list.
    Unignore { item_id: String },
}
