//! In-memory chat and board fakes shared by the runtime tests.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use drivewatch_drive::{
    action_color, action_label, DriveItem, ItemReference, ResolvedTarget, TombstoneItem,
    TranslatedActivity,
};

use crate::{
    chat::{ChatTransport, MessageOptions, UploadedFile},
    ticket_board::{BoardCard, BoardList, NewCard, TicketBoard},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub(crate) struct PostedMessage {
    pub channel: String,
    pub text: String,
    pub options: MessageOptions,
}

#[derive(Debug, Clone)]
pub(crate) struct UploadedSnippet {
    pub channels: Vec<String>,
    pub content: String,
    pub caption: String,
}

#[derive(Default)]
pub(crate) struct RecordingChat {
    fail: bool,
    posts: Mutex<Vec<PostedMessage>>,
    uploads: Mutex<Vec<UploadedSnippet>>,
}

impl RecordingChat {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<PostedMessage> {
        lock(&self.posts).clone()
    }

    pub fn uploads(&self) -> Vec<UploadedSnippet> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        if self.fail {
            bail!("chat transport unavailable");
        }
        lock(&self.posts).push(PostedMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn upload_text_file(
        &self,
        channels: &[String],
        content: &str,
        caption: &str,
    ) -> Result<UploadedFile> {
        if self.fail {
            bail!("chat transport unavailable");
        }
        let mut uploads = lock(&self.uploads);
        uploads.push(UploadedSnippet {
            channels: channels.to_vec(),
            content: content.to_string(),
            caption: caption.to_string(),
        });
        let file_id = format!("F{}", uploads.len());
        Ok(UploadedFile {
            permalink: format!("https://chat.test/files/{file_id}"),
            file_id,
        })
    }
}

#[derive(Default)]
struct BoardState {
    lists: Vec<BoardList>,
    cards: BTreeMap<String, Vec<BoardCard>>,
    created: Vec<NewCard>,
    closed: Vec<String>,
    checklists: Vec<(String, String)>,
    checklist_items: Vec<(String, String)>,
    attachments: Vec<(String, String)>,
    list_lookups: usize,
}

#[derive(Default)]
pub(crate) struct FakeBoard {
    state: Mutex<BoardState>,
}

impl FakeBoard {
    pub fn with_standard_lists() -> Self {
        let board = Self::default();
        {
            let mut state = lock(&board.state);
            for (id, name) in [
                ("list-todo", "ToDo"),
                ("list-autofix", "Autofix"),
                ("list-done", "Done"),
            ] {
                state.lists.push(BoardList {
                    id: id.to_string(),
                    name: name.to_string(),
                });
                state.cards.insert(id.to_string(), Vec::new());
            }
        }
        board
    }

    pub fn add_card(&self, list_id: &str, id: &str, due: Option<&str>) {
        lock(&self.state)
            .cards
            .entry(list_id.to_string())
            .or_default()
            .push(BoardCard {
                id: id.to_string(),
                name: format!("削除 1件 by {id}"),
                desc: "発生日時: 2024-03-01 09:00:00".to_string(),
                due: due.map(str::to_string),
                url: format!("https://board.test/c/{id}"),
            });
    }

    /// Moves an open card to another list, as an operator dragging it would.
    pub fn move_card(&self, card_id: &str, list_id: &str) {
        let mut state = lock(&self.state);
        let mut moved = None;
        for cards in state.cards.values_mut() {
            if let Some(index) = cards.iter().position(|card| card.id == card_id) {
                moved = Some(cards.remove(index));
            }
        }
        if let Some(card) = moved {
            state.cards.entry(list_id.to_string()).or_default().push(card);
        }
    }

    pub fn created(&self) -> Vec<NewCard> {
        lock(&self.state).created.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        lock(&self.state).closed.clone()
    }

    pub fn checklists(&self) -> Vec<(String, String)> {
        lock(&self.state).checklists.clone()
    }

    pub fn checklist_items(&self) -> Vec<(String, String)> {
        lock(&self.state).checklist_items.clone()
    }

    pub fn attachments(&self) -> Vec<(String, String)> {
        lock(&self.state).attachments.clone()
    }

    pub fn list_lookups(&self) -> usize {
        lock(&self.state).list_lookups
    }
}

#[async_trait]
impl TicketBoard for FakeBoard {
    async fn board_lists(&self, _board_id: &str) -> Result<Vec<BoardList>> {
        let mut state = lock(&self.state);
        state.list_lookups += 1;
        Ok(state.lists.clone())
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<BoardCard>> {
        lock(&self.state)
            .cards
            .get(list_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown list {list_id}"))
    }

    async fn create_card(&self, card: &NewCard) -> Result<BoardCard> {
        let mut state = lock(&self.state);
        state.created.push(card.clone());
        let id = format!("card-{}", state.created.len());
        let created = BoardCard {
            id: id.clone(),
            name: card.name.clone(),
            desc: card.desc.clone(),
            due: Some(card.due.clone()),
            url: format!("https://board.test/c/{id}"),
        };
        state
            .cards
            .entry(card.list_id.clone())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn create_checklist(&self, card_id: &str, name: &str) -> Result<String> {
        let mut state = lock(&self.state);
        state
            .checklists
            .push((card_id.to_string(), name.to_string()));
        Ok(format!("checklist-{}", state.checklists.len()))
    }

    async fn add_checklist_item(&self, checklist_id: &str, name: &str) -> Result<()> {
        lock(&self.state)
            .checklist_items
            .push((checklist_id.to_string(), name.to_string()));
        Ok(())
    }

    async fn attach_url(&self, card_id: &str, url: &str) -> Result<()> {
        lock(&self.state)
            .attachments
            .push((card_id.to_string(), url.to_string()));
        Ok(())
    }

    async fn close_card(&self, card_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        for cards in state.cards.values_mut() {
            cards.retain(|card| card.id != card_id);
        }
        state.closed.push(card_id.to_string());
        Ok(())
    }
}

/// A translated activity over `count` leaf targets under `/Docs`.
pub(crate) fn translated_activity(action: &str, count: usize) -> TranslatedActivity {
    let references = (0..count)
        .map(|index| ItemReference::leaf(format!("item-{index}")))
        .collect::<Vec<_>>();
    let targets = references
        .iter()
        .map(|reference| ResolvedTarget {
            reference: reference.clone(),
            path: format!("/Docs/{}.txt", reference.id),
            url: format!("https://drive.test/{}", reference.id),
            item: DriveItem::Tombstone(
                TombstoneItem::new(reference.id.clone(), false)
                    .with_name(format!("{}.txt", reference.id)),
            ),
        })
        .collect();
    TranslatedActivity {
        action: action.to_string(),
        label: action_label(action),
        color: action_color(action),
        actors_text: "Alice さん".to_string(),
        time_text: "2024-03-01 09:00:00".to_string(),
        occurred_at: Utc
            .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        total_targets: count,
        targets,
        unfiltered_targets: references,
    }
}
