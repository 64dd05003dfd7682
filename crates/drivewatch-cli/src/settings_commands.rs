use anyhow::{bail, Result};
use drivewatch_core::{
    settings_store::{read_json_setting, write_json_setting},
    JsonFileSettingsStore, SettingsStore,
};
use drivewatch_runtime::watch_settings::IGNORED_ITEMS_KEY;

use crate::cli_args::SettingsCommand;

/// Runs a settings subcommand and returns the text to print.
pub(crate) fn execute_settings_command(
    store: &JsonFileSettingsStore,
    command: &SettingsCommand,
) -> Result<String> {
    match command {
        SettingsCommand::Get { key: Some(key) } => match store.get(key)? {
            Some(value) => Ok(value),
            None => bail!("setting '{key}' is not configured"),
        },
        SettingsCommand::Get { key: None } => Ok(store.keys()?.join("\n")),
        SettingsCommand::Set { key, value } => {
            store.set(key, value)?;
            Ok(format!("{key} updated"))
        }
        SettingsCommand::Ignore { item_id } => {
            let mut ignored = load_ignored_items(store)?;
            if ignored.iter().any(|existing| existing == item_id) {
                return Ok(format!("{item_id} is already ignored"));
            }
            ignored.push(item_id.clone());
            write_json_setting(store, IGNORED_ITEMS_KEY, &ignored)?;
            Ok(format!("ignoring {item_id} ({} ignored items)", ignored.len()))
        }
        SettingsCommand::Unignore { item_id } => {
            let mut ignored = load_ignored_items(store)?;
            let before = ignored.len();
            ignored.retain(|existing| existing != item_id);
            if ignored.len() == before {
                return Ok(format!("{item_id} was not ignored"));
            }
            write_json_setting(store, IGNORED_ITEMS_KEY, &ignored)?;
            Ok(format!("no longer ignoring {item_id} ({} ignored items)", ignored.len()))
        }
    }
}

fn load_ignored_items(store: &dyn SettingsStore) -> Result<Vec<String>> {
    Ok(read_json_setting::<Vec<String>>(store, IGNORED_ITEMS_KEY)?.unwrap_or_default())
}
