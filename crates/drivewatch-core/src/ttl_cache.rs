//! Small expiring string cache, optionally persisted between runs.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::write_text_atomic;

const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CacheEntry {
    value: String,
    expires_unix_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    schema_version: u32,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

pub struct TtlCacheStore {
    path: Option<PathBuf>,
    state: Mutex<CacheFile>,
}

impl TtlCacheStore {
    /// Cache that lives only for the current process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CacheFile::default()),
        }
    }

    /// Loads a persisted cache. An unreadable or foreign file starts the cache empty.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read cache file {}", path.display()))?;
            match serde_json::from_str::<CacheFile>(&raw) {
                Ok(state) if state.schema_version == CACHE_SCHEMA_VERSION => state,
                Ok(state) => {
                    tracing::warn!(
                        path = %path.display(),
                        schema_version = state.schema_version,
                        "ignoring cache file with unsupported schema"
                    );
                    CacheFile::default()
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "ignoring unparsable cache file"
                    );
                    CacheFile::default()
                }
            }
        } else {
            CacheFile::default()
        };
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn get(&self, key: &str, now_unix_ms: u64) -> Result<Option<String>> {
        let state = self.lock()?;
        Ok(state
            .entries
            .get(key)
            .filter(|entry| entry.expires_unix_ms > now_unix_ms)
            .map(|entry| entry.value.clone()))
    }

    pub fn put(&self, key: &str, value: &str, ttl_ms: u64, now_unix_ms: u64) -> Result<()> {
        let mut state = self.lock()?;
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_unix_ms: now_unix_ms.saturating_add(ttl_ms),
            },
        );
        Ok(())
    }

    /// Drops expired entries and writes the cache file when one is configured.
    pub fn save(&self, now_unix_ms: u64) -> Result<()> {
        let mut state = self.lock()?;
        state
            .entries
            .retain(|_, entry| entry.expires_unix_ms > now_unix_ms);
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let mut payload =
            serde_json::to_string_pretty(&*state).context("failed to serialize cache")?;
        payload.push('\n');
        write_text_atomic(path, &payload)
            .with_context(|| format!("failed to write cache file {}", path.display()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheFile>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("cache mutex is poisoned"))
    }
}
