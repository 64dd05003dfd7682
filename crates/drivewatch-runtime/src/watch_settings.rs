//! Persisted settings consumed by the two sweeps.

use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use drivewatch_core::{settings_store::read_json_setting, SettingsStore, TtlCacheStore};
use drivewatch_drive::{ActivitySource, DriveStorage, PersonDirectory};
use thiserror::Error;

use crate::{chat::ChatTransport, ticket_board::TicketBoard};

pub const ROOT_FOLDER_KEY: &str = "root-folder-id";
pub const NOTIFY_CHANNEL_KEY: &str = "notify-channel-id";
pub const ADMIN_CHANNEL_KEY: &str = "admin-channel-id";
pub const IGNORED_ITEMS_KEY: &str = "ignored-drive-items";
pub const IGNORED_ACTIONS_KEY: &str = "ignored-actions";
pub const TIMEZONE_KEY: &str = "timezone";
pub const BOARD_ID_KEY: &str = "trello-board-id";
pub const CURSOR_KEY: &str = "check-update.last-checked";

pub const DEFAULT_IGNORED_ACTIONS: &[&str] = &["edit"];
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("no last-checked cursor is stored; run check-update once with --since to set a starting point")]
    MissingCursor,
    #[error("required setting '{0}' is not configured")]
    MissingSetting(String),
}

/// Collaborators and stores one sweep runs against.
#[derive(Clone)]
pub struct RunContext {
    pub settings: Arc<dyn SettingsStore>,
    pub cache: Arc<TtlCacheStore>,
    pub storage: Arc<dyn DriveStorage>,
    pub activities: Arc<dyn ActivitySource>,
    pub people: Arc<dyn PersonDirectory>,
    pub chat: Arc<dyn ChatTransport>,
    pub board: Arc<dyn TicketBoard>,
}

pub(crate) fn required(store: &dyn SettingsStore, key: &str) -> Result<String> {
    store
        .get(key)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RunError::MissingSetting(key.to_string()).into())
}

pub(crate) fn optional(store: &dyn SettingsStore, key: &str) -> Result<Option<String>> {
    Ok(store
        .get(key)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

pub(crate) fn ignored_items(store: &dyn SettingsStore) -> Result<Vec<String>> {
    Ok(read_json_setting::<Vec<String>>(store, IGNORED_ITEMS_KEY)?.unwrap_or_default())
}

pub(crate) fn ignored_actions(store: &dyn SettingsStore) -> Result<Vec<String>> {
    Ok(read_json_setting::<Vec<String>>(store, IGNORED_ACTIONS_KEY)?.unwrap_or_else(|| {
        DEFAULT_IGNORED_ACTIONS
            .iter()
            .map(|action| action.to_string())
            .collect()
    }))
}

pub(crate) fn timezone(store: &dyn SettingsStore) -> Result<Tz> {
    match optional(store, TIMEZONE_KEY)? {
        Some(raw) => Tz::from_str(&raw)
            .map_err(|error| anyhow!("setting '{TIMEZONE_KEY}' is not an IANA zone: {error}")),
        None => Ok(DEFAULT_TIMEZONE),
    }
}
