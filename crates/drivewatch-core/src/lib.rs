//! Low-level building blocks shared by the drivewatch crates.
//!
//! Provides atomic state-file writes, clock helpers, the persisted key/value
//! settings store, the TTL cache store and the per-purpose run lock.

pub mod atomic_io;
pub mod run_lock;
pub mod settings_store;
pub mod time_utils;
pub mod ttl_cache;

pub use atomic_io::write_text_atomic;
pub use run_lock::{acquire_run_lock, RunLockGuard};
pub use settings_store::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
pub use time_utils::{current_unix_timestamp_ms, parse_cursor_to_unix_ms};
pub use ttl_cache::TtlCacheStore;
