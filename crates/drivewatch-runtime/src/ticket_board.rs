//! Ticket board interface and the cached list-name lookup.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use drivewatch_core::TtlCacheStore;
use serde::{Deserialize, Serialize};

pub const TODO_LIST: &str = "ToDo";
pub const AUTOFIX_LIST: &str = "Autofix";
pub const DONE_LIST: &str = "Done";
pub const BOARD_LISTS_TTL_MS: u64 = 6 * 60 * 60 * 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCard {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl BoardCard {
    /// Due date in unix milliseconds; unparsable dates count as absent.
    pub fn due_unix_ms(&self) -> Option<u64> {
        let raw = self.due.as_deref()?.trim();
        let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
        u64::try_from(parsed.timestamp_millis()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCard {
    pub list_id: String,
    pub name: String,
    pub desc: String,
    pub due: String,
}

#[async_trait]
pub trait TicketBoard: Send + Sync {
    async fn board_lists(&self, board_id: &str) -> Result<Vec<BoardList>>;

    /// Open cards in a list.
    async fn list_cards(&self, list_id: &str) -> Result<Vec<BoardCard>>;

    async fn create_card(&self, card: &NewCard) -> Result<BoardCard>;

    /// Returns the id of the new checklist.
    async fn create_checklist(&self, card_id: &str, name: &str) -> Result<String>;

    async fn add_checklist_item(&self, checklist_id: &str, name: &str) -> Result<()>;

    async fn attach_url(&self, card_id: &str, url: &str) -> Result<()>;

    async fn close_card(&self, card_id: &str) -> Result<()>;
}

/// List ids of one board keyed by list name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLists {
    ids_by_name: BTreeMap<String, String>,
}

impl BoardLists {
    pub fn from_lists(lists: Vec<BoardList>) -> Self {
        Self {
            ids_by_name: lists
                .into_iter()
                .map(|list| (list.name, list.id))
                .collect(),
        }
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.ids_by_name
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("ticket board has no list named '{name}'"))
    }
}

fn board_lists_cache_key(board_id: &str) -> String {
    format!("board-lists.{board_id}")
}

/// Resolves the board's lists, reusing a cached copy for up to six hours.
pub async fn resolve_board_lists(
    board: &dyn TicketBoard,
    cache: &TtlCacheStore,
    board_id: &str,
    now_unix_ms: u64,
) -> Result<BoardLists> {
    let cache_key = board_lists_cache_key(board_id);
    if let Some(raw) = cache.get(&cache_key, now_unix_ms)? {
        match serde_json::from_str::<BoardLists>(&raw) {
            Ok(lists) => return Ok(lists),
            Err(error) => {
                tracing::warn!(board_id, error = %error, "discarding unreadable cached board lists");
            }
        }
    }

    let lists = BoardLists::from_lists(
        board
            .board_lists(board_id)
            .await
            .with_context(|| format!("failed to list ticket board {board_id}"))?,
    );
    let encoded = serde_json::to_string(&lists).context("failed to encode board lists")?;
    cache.put(&cache_key, &encoded, BOARD_LISTS_TTL_MS, now_unix_ms)?;
    Ok(lists)
}
