//! Persisted key/value settings shared by the notification and ticket sweeps.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::write_text_atomic;

const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// String-keyed settings that survive across runs.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Reads `key` and decodes it as JSON. Missing keys yield `None`.
pub fn read_json_setting<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<T>(&raw)
            .map(Some)
            .with_context(|| format!("setting '{key}' is not valid JSON for its type")),
        _ => Ok(None),
    }
}

/// Encodes `value` as JSON and stores it under `key`.
pub fn write_json_setting<T: Serialize>(
    store: &dyn SettingsStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .with_context(|| format!("failed to encode setting '{key}'"))?;
    store.set(key, &raw)
}

/// Returns the trimmed value of a setting that must be present.
pub fn require_setting(store: &dyn SettingsStore, key: &str) -> Result<String> {
    store
        .get(key)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("required setting '{key}' is not configured"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsFile {
    schema_version: u32,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            values: BTreeMap::new(),
        }
    }
}

/// Settings persisted as a pretty JSON document, rewritten atomically on every change.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    state: Mutex<SettingsFile>,
}

impl JsonFileSettingsStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            serde_json::from_str::<SettingsFile>(&raw).with_context(|| {
                format!("failed to parse settings file {}", path.display())
            })?
        } else {
            SettingsFile::default()
        };
        if state.schema_version != SETTINGS_SCHEMA_VERSION {
            bail!(
                "unsupported settings schema: expected {}, found {}",
                SETTINGS_SCHEMA_VERSION,
                state.schema_version
            );
        }
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.values.keys().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SettingsFile>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("settings mutex is poisoned"))
    }

    fn save(&self, state: &SettingsFile) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(state).context("failed to serialize settings")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write settings file {}", self.path.display()))
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        state.values.insert(key.to_string(), value.to_string());
        self.save(&state)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.values.remove(key).is_some() {
            self.save(&state)?;
        }
        Ok(())
    }
}

/// Process-local settings, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| anyhow!("settings mutex is poisoned"))
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
