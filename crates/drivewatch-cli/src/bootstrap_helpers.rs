use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use drivewatch_core::{acquire_run_lock, JsonFileSettingsStore, RunLockGuard, TtlCacheStore};
use drivewatch_runtime::{
    GoogleApiBases, GoogleApiClient, HttpClientSettings, RunContext, SlackApiClient,
    TrelloApiClient,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn settings_path(cli: &Cli) -> PathBuf {
    cli.state_dir.join("settings.json")
}

pub(crate) fn cache_path(cli: &Cli) -> PathBuf {
    cli.state_dir.join("cache.json")
}

pub(crate) fn lock_path(cli: &Cli, purpose: &str) -> PathBuf {
    cli.state_dir.join("locks").join(format!("{purpose}.lock"))
}

pub(crate) fn acquire_purpose_lock(cli: &Cli, purpose: &str) -> Result<RunLockGuard> {
    acquire_run_lock(
        &lock_path(cli, purpose),
        Duration::from_millis(cli.lock_wait_ms),
        Duration::from_millis(cli.lock_stale_ms),
    )
}

fn http_settings(cli: &Cli) -> HttpClientSettings {
    HttpClientSettings {
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

fn require_flag<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("--{flag} is required for this command"))
}

/// Wires the live Google, Slack and Trello clients to the state directory.
pub(crate) fn build_run_context(cli: &Cli) -> Result<RunContext> {
    let settings = http_settings(cli);
    let google = Arc::new(GoogleApiClient::new(
        require_flag(&cli.google_access_token, "google-access-token")?,
        GoogleApiBases {
            drive: cli.drive_api_base.clone(),
            drive_activity: cli.drive_activity_api_base.clone(),
            people: cli.people_api_base.clone(),
        },
        settings,
    )?);
    let slack = SlackApiClient::new(
        &cli.slack_api_base,
        require_flag(&cli.slack_bot_token, "slack-bot-token")?,
        settings,
    )?;
    let trello = TrelloApiClient::new(
        &cli.trello_api_base,
        require_flag(&cli.trello_api_key, "trello-api-key")?,
        require_flag(&cli.trello_token, "trello-token")?,
        settings,
    )?;

    Ok(RunContext {
        settings: Arc::new(JsonFileSettingsStore::load(settings_path(cli))?),
        cache: Arc::new(TtlCacheStore::load(cache_path(cli))?),
        storage: google.clone(),
        activities: google.clone(),
        people: google,
        chat: Arc::new(slack),
        board: Arc::new(trello),
    })
}
