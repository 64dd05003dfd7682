//! Recovery tickets opened for deletions and the sweep that resolves them.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use chrono::Duration;
use drivewatch_core::settings_store::{read_json_setting, write_json_setting, SettingsStore};
use drivewatch_drive::{format_due, DriveStorage, ItemReference, StorageError, TranslatedActivity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    chat::{ChatTransport, MessageOptions},
    notification_dispatcher::uses_inline_delivery,
    ticket_board::{BoardCard, BoardLists, NewCard, TicketBoard, AUTOFIX_LIST, DONE_LIST, TODO_LIST},
};

pub const TICKET_LEDGER_KEY: &str = "check-update.deleted-items";
pub const CHECKLIST_NAME: &str = "アイテム一覧";
const TICKET_GRACE_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Expired,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionTicket {
    pub ticket_id: String,
    pub items: Vec<ItemReference>,
    pub opened_at_unix_ms: u64,
    pub deadline_unix_ms: u64,
    pub status: TicketStatus,
}

/// Persisted tickets keyed by board card id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketLedger {
    tickets: BTreeMap<String, DeletionTicket>,
}

impl TicketLedger {
    pub fn load(store: &dyn SettingsStore) -> Result<Self> {
        let tickets = read_json_setting::<BTreeMap<String, DeletionTicket>>(store, TICKET_LEDGER_KEY)?
            .unwrap_or_default();
        Ok(Self { tickets })
    }

    pub fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        write_json_setting(store, TICKET_LEDGER_KEY, &self.tickets)
    }

    pub fn insert(&mut self, ticket: DeletionTicket) {
        self.tickets.insert(ticket.ticket_id.clone(), ticket);
    }

    pub fn get(&self, ticket_id: &str) -> Option<&DeletionTicket> {
        self.tickets.get(ticket_id)
    }

    /// Removes a ticket, handing it back in its terminal state.
    pub fn close(&mut self, ticket_id: &str) -> Option<DeletionTicket> {
        self.tickets.remove(ticket_id).map(|mut ticket| {
            ticket.status = TicketStatus::Closed;
            ticket
        })
    }

    fn set_status(&mut self, ticket_id: &str, status: TicketStatus) {
        if let Some(ticket) = self.tickets.get_mut(ticket_id) {
            ticket.status = status;
        }
    }

    /// Narrows a ticket to the items that still need restoring.
    fn retain_items(&mut self, ticket_id: &str, pending: Vec<ItemReference>) {
        if let Some(ticket) = self.tickets.get_mut(ticket_id) {
            ticket.items = pending;
        }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("restoring folder {id} is not implemented; restore it manually")]
    NotImplemented { id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { copy_id: String, parents: usize },
    NotTrashed,
}

/// Restores one deleted item by copying it back into every parent of the trashed original.
pub async fn restore_item(
    storage: &dyn DriveStorage,
    item: &ItemReference,
) -> Result<RestoreOutcome, RecoveryError> {
    if item.is_container {
        return Err(RecoveryError::NotImplemented {
            id: item.id.clone(),
        });
    }
    let file = storage.get_by_id(&item.id, false).await?;
    if !storage.is_trashed(&file).await? {
        return Ok(RestoreOutcome::NotTrashed);
    }
    let copy = storage.duplicate(&file, &file.name).await?;
    for parent_id in &file.parents {
        storage.attach_to_parent(&copy, parent_id).await?;
    }
    Ok(RestoreOutcome::Restored {
        copy_id: copy.id,
        parents: file.parents.len(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketSweepReport {
    pub closed_done: usize,
    pub restored_tickets: usize,
    pub restored_items: usize,
    pub skipped_untracked: usize,
    pub failed_tickets: usize,
    pub closed_ticket_ids: Vec<String>,
}

enum SweepSource {
    Autofix,
    Expired,
}

pub struct DeletionTicketManager {
    board: Arc<dyn TicketBoard>,
    chat: Arc<dyn ChatTransport>,
    storage: Arc<dyn DriveStorage>,
    lists: BoardLists,
    admin_channel: String,
}

impl DeletionTicketManager {
    pub fn new(
        board: Arc<dyn TicketBoard>,
        chat: Arc<dyn ChatTransport>,
        storage: Arc<dyn DriveStorage>,
        lists: BoardLists,
        admin_channel: impl Into<String>,
    ) -> Self {
        Self {
            board,
            chat,
            storage,
            lists,
            admin_channel: admin_channel.into(),
        }
    }

    /// Opens a ticket for a translated deletion and records it in `ledger`.
    ///
    /// The ticket covers every target of the activity, including ones the
    /// notification filtered out. `snippet_permalink` is attached to the card
    /// when the target list was too long for a checklist.
    pub async fn open_ticket(
        &self,
        ledger: &mut TicketLedger,
        activity: &TranslatedActivity,
        snippet_permalink: Option<&str>,
    ) -> Result<DeletionTicket> {
        let opened_at = activity.occurred_at;
        let deadline = opened_at + Duration::days(TICKET_GRACE_DAYS);
        let card = self
            .board
            .create_card(&NewCard {
                list_id: self.lists.require(TODO_LIST)?.to_string(),
                name: format!(
                    "{} {}件 by {}",
                    activity.label, activity.total_targets, activity.actors_text
                ),
                desc: format!("発生日時: {}", activity.time_text),
                due: format_due(deadline),
            })
            .await
            .context("failed to create deletion ticket card")?;

        let ticket = DeletionTicket {
            ticket_id: card.id.clone(),
            items: activity.unfiltered_targets.clone(),
            opened_at_unix_ms: unix_ms(opened_at),
            deadline_unix_ms: unix_ms(deadline),
            status: TicketStatus::Open,
        };
        ledger.insert(ticket.clone());
        tracing::info!(
            ticket_id = %card.id,
            items = ticket.items.len(),
            "opened deletion ticket"
        );

        if uses_inline_delivery(activity.targets.len()) {
            let checklist_id = self
                .board
                .create_checklist(&card.id, CHECKLIST_NAME)
                .await
                .context("failed to create ticket checklist")?;
            for target in &activity.targets {
                self.board
                    .add_checklist_item(&checklist_id, &format!("{} {}", target.path, target.url))
                    .await
                    .context("failed to add ticket checklist item")?;
            }
        } else if let Some(permalink) = snippet_permalink {
            self.board
                .attach_url(&card.id, permalink)
                .await
                .context("failed to attach snippet to ticket")?;
        }

        self.chat
            .post_message(&self.admin_channel, &card.url, &MessageOptions::as_user())
            .await
            .context("failed to announce deletion ticket")?;
        Ok(ticket)
    }

    /// Closes finished tickets and restores the items of autofix and overdue ones.
    pub async fn sweep(&self, ledger: &mut TicketLedger, now_unix_ms: u64) -> Result<TicketSweepReport> {
        let mut report = TicketSweepReport::default();

        for card in self.cards_in(DONE_LIST).await? {
            self.board
                .close_card(&card.id)
                .await
                .with_context(|| format!("failed to close finished ticket {}", card.id))?;
            if let Some(ticket) = ledger.close(&card.id) {
                report.closed_ticket_ids.push(ticket.ticket_id);
            }
            report.closed_done += 1;
        }

        let mut due_cards = self
            .cards_in(AUTOFIX_LIST)
            .await?
            .into_iter()
            .map(|card| (card, SweepSource::Autofix))
            .collect::<Vec<_>>();
        for card in self.cards_in(TODO_LIST).await? {
            let deadline = card
                .due_unix_ms()
                .or_else(|| ledger.get(&card.id).map(|ticket| ticket.deadline_unix_ms));
            if deadline.is_some_and(|deadline| deadline < now_unix_ms) {
                due_cards.push((card, SweepSource::Expired));
            }
        }

        for (card, source) in due_cards {
            let Some(ticket) = ledger.get(&card.id).cloned() else {
                tracing::warn!(ticket_id = %card.id, "card has no recorded deletion ticket; skipping");
                report.skipped_untracked += 1;
                continue;
            };
            if matches!(source, SweepSource::Expired) {
                ledger.set_status(&card.id, TicketStatus::Expired);
            }
            self.resolve_ticket(ledger, &card, &ticket, &mut report)
                .await?;
        }
        Ok(report)
    }

    async fn resolve_ticket(
        &self,
        ledger: &mut TicketLedger,
        card: &BoardCard,
        ticket: &DeletionTicket,
        report: &mut TicketSweepReport,
    ) -> Result<()> {
        let mut failures = Vec::new();
        let mut pending = Vec::new();
        let mut restored = 0_usize;
        for item in &ticket.items {
            match restore_item(self.storage.as_ref(), item).await {
                Ok(RestoreOutcome::Restored { copy_id, parents }) => {
                    tracing::info!(item_id = %item.id, copy_id = %copy_id, parents, "restored item");
                    restored += 1;
                }
                Ok(RestoreOutcome::NotTrashed) => {
                    tracing::debug!(item_id = %item.id, "item is not trashed; nothing to restore");
                }
                Err(error) => {
                    tracing::error!(ticket_id = %card.id, item_id = %item.id, error = %error, "restore failed");
                    failures.push(format!("{}: {error}", item.id));
                    pending.push(item.clone());
                }
            }
        }
        report.restored_items += restored;

        if !failures.is_empty() {
            ledger.set_status(&card.id, TicketStatus::Expired);
            ledger.retain_items(&card.id, pending);
            report.failed_tickets += 1;
            self.chat
                .post_message(
                    &self.admin_channel,
                    &format!(
                        "{} ({}) の復元に失敗しました。\n{}",
                        card.name,
                        card.desc,
                        failures.join("\n")
                    ),
                    &MessageOptions::notifier(),
                )
                .await
                .context("failed to report restore failure")?;
            return Ok(());
        }

        self.chat
            .post_message(
                &self.admin_channel,
                &format!("{} ({}) を復元しました。", card.name, card.desc),
                &MessageOptions::notifier(),
            )
            .await
            .context("failed to confirm restored ticket")?;
        self.board
            .close_card(&card.id)
            .await
            .with_context(|| format!("failed to close restored ticket {}", card.id))?;
        if let Some(closed) = ledger.close(&card.id) {
            report.closed_ticket_ids.push(closed.ticket_id);
        }
        report.restored_tickets += 1;
        Ok(())
    }

    async fn cards_in(&self, list_name: &str) -> Result<Vec<BoardCard>> {
        let list_id = self.lists.require(list_name)?;
        self.board
            .list_cards(list_id)
            .await
            .with_context(|| format!("failed to list cards in '{list_name}'"))
    }
}

fn unix_ms(at: chrono::DateTime<chrono::Utc>) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use drivewatch_core::MemorySettingsStore;
    use drivewatch_drive::{InMemoryDrive, ItemReference};

    use super::{
        restore_item, DeletionTicket, DeletionTicketManager, RecoveryError, RestoreOutcome,
        TicketLedger, TicketStatus, CHECKLIST_NAME,
    };
    use crate::{
        test_support::{translated_activity, FakeBoard, RecordingChat},
        ticket_board::BoardLists,
    };

    const DAY_MS: u64 = 24 * 60 * 60 * 1_000;
    // 2024-03-01T00:00:00Z
    const OPENED_MS: u64 = 1_709_251_200_000;

    struct Harness {
        board: Arc<FakeBoard>,
        chat: Arc<RecordingChat>,
        drive: Arc<InMemoryDrive>,
        manager: DeletionTicketManager,
    }

    async fn harness() -> Harness {
        let board = Arc::new(FakeBoard::with_standard_lists());
        let chat = Arc::new(RecordingChat::default());
        let drive = Arc::new(InMemoryDrive::new("root"));
        drive.add_folder("docs", "Docs", &["root"]);
        let lists = BoardLists::from_lists(
            crate::ticket_board::TicketBoard::board_lists(board.as_ref(), "board")
                .await
                .expect("lists"),
        );
        let manager = DeletionTicketManager::new(
            board.clone(),
            chat.clone(),
            drive.clone(),
            lists,
            "C-admin",
        );
        Harness {
            board,
            chat,
            drive,
            manager,
        }
    }

    fn ticket(id: &str, items: Vec<ItemReference>) -> DeletionTicket {
        DeletionTicket {
            ticket_id: id.to_string(),
            items,
            opened_at_unix_ms: OPENED_MS,
            deadline_unix_ms: OPENED_MS + 3 * DAY_MS,
            status: TicketStatus::Open,
        }
    }

    #[tokio::test]
    async fn functional_open_ticket_creates_card_checklist_and_admin_link() {
        let harness = harness().await;
        let mut ledger = TicketLedger::default();
        let mut activity = translated_activity("delete", 2);
        activity
            .unfiltered_targets
            .push(ItemReference::leaf("ignored-item"));
        activity.total_targets = 3;

        let ticket = harness
            .manager
            .open_ticket(&mut ledger, &activity, None)
            .await
            .expect("open ticket");

        assert_eq!(ticket.deadline_unix_ms, OPENED_MS + 3 * DAY_MS);
        assert_eq!(ticket.items.len(), 3);
        assert_eq!(ledger.get("card-1"), Some(&ticket));

        let created = harness.board.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].list_id, "list-todo");
        assert_eq!(created[0].name, "削除 3件 by Alice さん");
        assert_eq!(created[0].desc, "発生日時: 2024-03-01 09:00:00");
        assert_eq!(created[0].due, "2024-03-04T00:00:00Z");
        assert_eq!(
            harness.board.checklists(),
            vec![("card-1".to_string(), CHECKLIST_NAME.to_string())]
        );
        let items = harness.board.checklist_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].1, "/Docs/item-0.txt https://drive.test/item-0");

        let posts = harness.chat.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel, "C-admin");
        assert_eq!(posts[0].text, "https://board.test/c/card-1");
        assert!(posts[0].options.as_user);
    }

    #[tokio::test]
    async fn functional_open_ticket_above_limit_attaches_snippet() {
        let harness = harness().await;
        let mut ledger = TicketLedger::default();
        let activity = translated_activity("delete", 21);
        harness
            .manager
            .open_ticket(&mut ledger, &activity, Some("https://chat.test/files/F1"))
            .await
            .expect("open ticket");
        assert!(harness.board.checklists().is_empty());
        assert_eq!(
            harness.board.attachments(),
            vec![(
                "card-1".to_string(),
                "https://chat.test/files/F1".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn unit_restore_item_copies_trashed_file_into_every_parent() {
        let harness = harness().await;
        harness.drive.add_folder("other", "Other", &["root"]);
        harness.drive.add_file("f1", "a.txt", &["docs", "other"]);
        harness.drive.trash("f1");

        let outcome = restore_item(harness.drive.as_ref(), &ItemReference::leaf("f1"))
            .await
            .expect("restore");
        assert_eq!(
            outcome,
            RestoreOutcome::Restored {
                copy_id: "f1-copy-1".to_string(),
                parents: 2
            }
        );
        assert_eq!(
            harness.drive.attachments(),
            vec![
                ("f1-copy-1".to_string(), "docs".to_string()),
                ("f1-copy-1".to_string(), "other".to_string())
            ]
        );
        assert_eq!(
            harness.drive.file("f1-copy-1").map(|file| file.name),
            Some("a.txt".to_string())
        );
    }

    #[tokio::test]
    async fn unit_restore_item_skips_untrashed_and_rejects_folders() {
        let harness = harness().await;
        harness.drive.add_file("f1", "a.txt", &["docs"]);
        assert_eq!(
            restore_item(harness.drive.as_ref(), &ItemReference::leaf("f1"))
                .await
                .expect("restore"),
            RestoreOutcome::NotTrashed
        );
        assert!(harness.drive.copies().is_empty());

        let error = restore_item(harness.drive.as_ref(), &ItemReference::container("docs"))
            .await
            .expect_err("folders are not restorable");
        assert!(matches!(error, RecoveryError::NotImplemented { id } if id == "docs"));
    }

    #[tokio::test]
    async fn functional_sweep_closes_done_without_restoring() {
        let harness = harness().await;
        harness.drive.add_file("f1", "a.txt", &["docs"]);
        harness.drive.trash("f1");
        harness.board.add_card("list-done", "card-done", None);
        let mut ledger = TicketLedger::default();
        ledger.insert(ticket("card-done", vec![ItemReference::leaf("f1")]));

        let report = harness
            .manager
            .sweep(&mut ledger, OPENED_MS)
            .await
            .expect("sweep");
        assert_eq!(report.closed_done, 1);
        assert_eq!(report.closed_ticket_ids, vec!["card-done".to_string()]);
        assert!(harness.drive.copies().is_empty());
        assert!(ledger.is_empty());
        assert_eq!(harness.board.closed(), vec!["card-done".to_string()]);
    }

    #[tokio::test]
    async fn functional_sweep_restores_autofix_and_overdue_tickets_then_is_idempotent() {
        let harness = harness().await;
        harness.drive.add_file("f1", "a.txt", &["docs"]);
        harness.drive.add_file("f2", "b.txt", &["docs"]);
        harness.drive.trash("f1");
        harness.drive.trash("f2");
        harness.board.add_card("list-autofix", "card-fix", None);
        harness
            .board
            .add_card("list-todo", "card-late", Some("2024-03-04T00:00:00Z"));
        harness
            .board
            .add_card("list-todo", "card-fresh", Some("2024-03-10T00:00:00Z"));
        let store = MemorySettingsStore::new();
        let mut ledger = TicketLedger::default();
        ledger.insert(ticket("card-fix", vec![ItemReference::leaf("f1")]));
        ledger.insert(ticket("card-late", vec![ItemReference::leaf("f2")]));
        ledger.insert(ticket("card-fresh", vec![ItemReference::leaf("f3")]));
        ledger.save(&store).expect("save");

        let now = OPENED_MS + 4 * DAY_MS;
        let mut ledger = TicketLedger::load(&store).expect("load");
        let report = harness.manager.sweep(&mut ledger, now).await.expect("sweep");
        ledger.save(&store).expect("save");

        assert_eq!(report.restored_tickets, 2);
        assert_eq!(report.restored_items, 2);
        assert_eq!(harness.drive.copies().len(), 2);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get("card-fresh").is_some());
        assert_eq!(
            harness.board.closed(),
            vec!["card-fix".to_string(), "card-late".to_string()]
        );
        let confirmations = harness.chat.posts();
        assert_eq!(
            confirmations[0].text,
            "削除 1件 by card-fix (発生日時: 2024-03-01 09:00:00) を復元しました。"
        );
        assert_eq!(confirmations[0].channel, "C-admin");

        let mut ledger = TicketLedger::load(&store).expect("reload");
        let second = harness.manager.sweep(&mut ledger, now).await.expect("second sweep");
        assert_eq!(second, Default::default());
        assert_eq!(harness.drive.copies().len(), 2);
        assert_eq!(harness.chat.posts().len(), 2);
    }

    #[tokio::test]
    async fn regression_folder_ticket_surfaces_not_implemented_and_stays_open() {
        let harness = harness().await;
        harness.board.add_card("list-autofix", "card-folder", None);
        let mut ledger = TicketLedger::default();
        ledger.insert(ticket("card-folder", vec![ItemReference::container("docs")]));

        let report = harness
            .manager
            .sweep(&mut ledger, OPENED_MS)
            .await
            .expect("sweep");
        assert_eq!(report.failed_tickets, 1);
        assert_eq!(
            ledger.get("card-folder").map(|ticket| ticket.status),
            Some(TicketStatus::Expired)
        );
        assert!(harness.board.closed().is_empty());
        let posts = harness.chat.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].text.contains("復元に失敗しました"));
        assert!(posts[0].text.contains("not implemented"));
    }

    #[tokio::test]
    async fn regression_partial_failure_keeps_only_unrestored_items_pending() {
        let harness = harness().await;
        harness.drive.add_file("f1", "a.txt", &["docs"]);
        harness.drive.trash("f1");
        harness.board.add_card("list-autofix", "card-mixed", None);
        let mut ledger = TicketLedger::default();
        ledger.insert(ticket(
            "card-mixed",
            vec![ItemReference::leaf("f1"), ItemReference::container("docs")],
        ));

        for _ in 0..3 {
            let report = harness
                .manager
                .sweep(&mut ledger, OPENED_MS)
                .await
                .expect("sweep");
            assert_eq!(report.failed_tickets, 1);
        }
        assert_eq!(
            harness.drive.copies(),
            vec![("f1".to_string(), "f1-copy-1".to_string())]
        );
        let pending = ledger.get("card-mixed").expect("still tracked");
        assert_eq!(pending.items, vec![ItemReference::container("docs")]);
        assert_eq!(pending.status, TicketStatus::Expired);
    }

    #[tokio::test]
    async fn regression_untracked_card_is_skipped_with_warning() {
        let harness = harness().await;
        harness.board.add_card("list-autofix", "card-unknown", None);
        let mut ledger = TicketLedger::default();
        let report = harness
            .manager
            .sweep(&mut ledger, OPENED_MS)
            .await
            .expect("sweep");
        assert_eq!(report.skipped_untracked, 1);
        assert!(harness.board.closed().is_empty());
        assert!(harness.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn unit_todo_card_without_due_uses_ledger_deadline() {
        let harness = harness().await;
        harness.drive.add_file("f1", "a.txt", &["docs"]);
        harness.board.add_card("list-todo", "card-nodue", None);
        let mut ledger = TicketLedger::default();
        ledger.insert(ticket("card-nodue", vec![ItemReference::leaf("f1")]));

        let early = harness
            .manager
            .sweep(&mut ledger, OPENED_MS + DAY_MS)
            .await
            .expect("sweep");
        assert_eq!(early.restored_tickets, 0);

        let late = harness
            .manager
            .sweep(&mut ledger, OPENED_MS + 4 * DAY_MS)
            .await
            .expect("sweep");
        assert_eq!(late.restored_tickets, 1);
        assert_eq!(late.restored_items, 0);
        assert!(ledger.is_empty());
    }
}
