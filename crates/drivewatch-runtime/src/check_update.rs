//! Notification sweep: translate new activity, notify, and open deletion tickets.

use anyhow::{Context, Result};
use drivewatch_core::parse_cursor_to_unix_ms;
use drivewatch_drive::{
    ActivityTranslator, PersonNameResolver, SkipReason, TranslatedActivity, TranslationOutcome,
    TranslatorConfig,
};

use crate::{
    deletion_tickets::{DeletionTicketManager, TicketLedger},
    notification_dispatcher::{DispatchResult, NotificationDispatcher},
    ticket_board::resolve_board_lists,
    watch_settings::{
        ignored_actions, ignored_items, optional, required, timezone, RunContext, RunError,
        ADMIN_CHANNEL_KEY, BOARD_ID_KEY, CURSOR_KEY, NOTIFY_CHANNEL_KEY, ROOT_FOLDER_KEY,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckUpdateReport {
    pub since_unix_ms: u64,
    pub discovered: usize,
    pub notified_inline: usize,
    pub notified_snippet: usize,
    pub skipped_ignored_action: usize,
    pub skipped_ignored_targets: usize,
    pub malformed: usize,
    pub failed: usize,
    pub tickets_opened: usize,
}

impl CheckUpdateReport {
    pub fn summary_line(&self) -> String {
        format!(
            "drivewatch check-update: since={} discovered={} notified={} snippets={} skipped_ignored_action={} skipped_ignored_targets={} malformed={} failed={} tickets_opened={}",
            self.since_unix_ms,
            self.discovered,
            self.notified_inline + self.notified_snippet,
            self.notified_snippet,
            self.skipped_ignored_action,
            self.skipped_ignored_targets,
            self.malformed,
            self.failed,
            self.tickets_opened,
        )
    }
}

/// Opens the ticket manager on the first deletion of a run.
struct LazyTickets<'a> {
    ctx: &'a RunContext,
    now_unix_ms: u64,
    manager: Option<DeletionTicketManager>,
}

impl LazyTickets<'_> {
    async fn manager(&mut self) -> Result<&DeletionTicketManager> {
        if self.manager.is_none() {
            let settings = self.ctx.settings.as_ref();
            let board_id = required(settings, BOARD_ID_KEY)?;
            let admin_channel = required(settings, ADMIN_CHANNEL_KEY)?;
            let lists = resolve_board_lists(
                self.ctx.board.as_ref(),
                &self.ctx.cache,
                &board_id,
                self.now_unix_ms,
            )
            .await?;
            self.manager = Some(DeletionTicketManager::new(
                self.ctx.board.clone(),
                self.ctx.chat.clone(),
                self.ctx.storage.clone(),
                lists,
                admin_channel,
            ));
        }
        self.manager
            .as_ref()
            .context("ticket manager was not initialised")
    }
}

/// Processes every activity since the cursor (or `since_override`) oldest first.
///
/// Failures are isolated per activity. The cursor advances to the run's
/// start time only when the run reaches its end.
pub async fn check_update(
    ctx: &RunContext,
    since_override: Option<&str>,
    now_unix_ms: u64,
) -> Result<CheckUpdateReport> {
    let settings = ctx.settings.as_ref();
    let since_unix_ms = match since_override {
        Some(raw) => parse_cursor_to_unix_ms(raw).context("invalid --since value")?,
        None => match optional(settings, CURSOR_KEY)? {
            Some(raw) => parse_cursor_to_unix_ms(&raw)
                .with_context(|| format!("stored setting '{CURSOR_KEY}' is invalid"))?,
            None => return Err(RunError::MissingCursor.into()),
        },
    };
    let root_id = required(settings, ROOT_FOLDER_KEY)?;
    let notify_channel = required(settings, NOTIFY_CHANNEL_KEY)?;
    let config = TranslatorConfig {
        root_id: root_id.clone(),
        ignored_items: ignored_items(settings)?,
        ignored_actions: ignored_actions(settings)?,
        timezone: timezone(settings)?,
    };
    let mut ledger = TicketLedger::load(settings)?;

    let mut records = ctx
        .activities
        .query_activities(&root_id, Some(since_unix_ms))
        .await
        .context("failed to query drive activity")?;
    records.reverse();

    let people = PersonNameResolver::new(ctx.people.clone(), ctx.cache.clone(), now_unix_ms);
    let mut translator = ActivityTranslator::new(config, ctx.storage.clone(), people);
    let dispatcher = NotificationDispatcher::new(ctx.chat.clone(), notify_channel);
    let mut tickets = LazyTickets {
        ctx,
        now_unix_ms,
        manager: None,
    };
    let mut report = CheckUpdateReport {
        since_unix_ms,
        discovered: records.len(),
        ..CheckUpdateReport::default()
    };

    for record in &records {
        let activity = match translator.translate_record(record).await {
            Ok(TranslationOutcome::Translated(activity)) => activity,
            Ok(TranslationOutcome::Skipped(SkipReason::IgnoredAction)) => {
                report.skipped_ignored_action += 1;
                continue;
            }
            Ok(TranslationOutcome::Skipped(SkipReason::AllTargetsIgnored)) => {
                report.skipped_ignored_targets += 1;
                continue;
            }
            Err(error) => {
                tracing::warn!(error = %error, "skipping malformed activity record");
                report.malformed += 1;
                continue;
            }
        };
        if let Err(error) =
            deliver_activity(&dispatcher, &mut tickets, &mut ledger, &activity, &mut report).await
        {
            tracing::error!(
                action = %activity.action,
                targets = activity.targets.len(),
                error = ?error,
                "failed to deliver activity"
            );
            report.failed += 1;
        }
    }

    ledger.save(settings)?;
    settings.set(CURSOR_KEY, &now_unix_ms.to_string())?;
    if let Err(error) = ctx.cache.save(now_unix_ms) {
        tracing::warn!(error = %error, "failed to persist cache");
    }
    tracing::info!(
        discovered = report.discovered,
        resolved_items = translator.items().cached_len(),
        "check-update finished"
    );
    Ok(report)
}

async fn deliver_activity(
    dispatcher: &NotificationDispatcher,
    tickets: &mut LazyTickets<'_>,
    ledger: &mut TicketLedger,
    activity: &TranslatedActivity,
    report: &mut CheckUpdateReport,
) -> Result<()> {
    let result = dispatcher.dispatch(activity).await?;
    match &result {
        DispatchResult::Inline { .. } => report.notified_inline += 1,
        DispatchResult::Snippet { .. } => report.notified_snippet += 1,
    }
    if activity.is_deletion() {
        tickets
            .manager()
            .await?
            .open_ticket(ledger, activity, result.permalink())
            .await?;
        report.tickets_opened += 1;
    }
    Ok(())
}
