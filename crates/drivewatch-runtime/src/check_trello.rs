use anyhow::Result;

use crate::{
    deletion_tickets::{DeletionTicketManager, TicketLedger, TicketSweepReport},
    ticket_board::resolve_board_lists,
    watch_settings::{required, RunContext, ADMIN_CHANNEL_KEY, BOARD_ID_KEY},
};

impl TicketSweepReport {
    pub fn summary_line(&self) -> String {
        format!(
            "drivewatch check-trello: closed_done={} restored_tickets={} restored_items={} skipped_untracked={} failed_tickets={}",
            self.closed_done,
            self.restored_tickets,
            self.restored_items,
            self.skipped_untracked,
            self.failed_tickets,
        )
    }
}

/// Ticket sweep. Ledger changes made before a failure are still persisted.
pub async fn check_trello(ctx: &RunContext, now_unix_ms: u64) -> Result<TicketSweepReport> {
    let settings = ctx.settings.as_ref();
    let board_id = required(settings, BOARD_ID_KEY)?;
    let admin_channel = required(settings, ADMIN_CHANNEL_KEY)?;
    let lists = resolve_board_lists(ctx.board.as_ref(), &ctx.cache, &board_id, now_unix_ms).await?;
    let manager = DeletionTicketManager::new(
        ctx.board.clone(),
        ctx.chat.clone(),
        ctx.storage.clone(),
        lists,
        admin_channel,
    );

    let mut ledger = TicketLedger::load(settings)?;
    let outcome = manager.sweep(&mut ledger, now_unix_ms).await;
    ledger.save(settings)?;
    if let Err(error) = ctx.cache.save(now_unix_ms) {
        tracing::warn!(error = %error, "failed to persist cache");
    }
    let report = outcome?;
    tracing::info!(
        open_tickets = ledger.len(),
        failed_tickets = report.failed_tickets,
        "check-trello finished"
    );
    Ok(report)
}
