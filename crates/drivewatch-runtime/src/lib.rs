//! Notification and ticket sweeps for Drive activity, plus the HTTP clients
//! that connect them to Google, Slack and Trello.

pub mod chat;
pub mod check_trello;
pub mod check_update;
pub mod deletion_tickets;
pub mod google_api_client;
pub mod http_json_client;
pub mod notification_dispatcher;
pub mod slack_api_client;
pub mod ticket_board;
pub mod trello_api_client;
pub mod watch_settings;

mod transport_helpers;

#[cfg(test)]
mod test_support;

pub use chat::{ChatTransport, MessageAttachment, MessageOptions, UploadedFile};
pub use check_trello::check_trello;
pub use check_update::{check_update, CheckUpdateReport};
pub use deletion_tickets::{
    restore_item, DeletionTicket, DeletionTicketManager, RecoveryError, RestoreOutcome,
    TicketLedger, TicketStatus, TicketSweepReport, TICKET_LEDGER_KEY,
};
pub use google_api_client::{GoogleApiBases, GoogleApiClient};
pub use http_json_client::{ApiRequestError, HttpClientSettings, HttpJsonClient};
pub use notification_dispatcher::{DispatchResult, NotificationDispatcher, INLINE_TARGET_LIMIT};
pub use slack_api_client::{SlackApiClient, DEFAULT_SLACK_API_BASE};
pub use ticket_board::{BoardCard, BoardList, BoardLists, NewCard, TicketBoard};
pub use trello_api_client::{TrelloApiClient, DEFAULT_TRELLO_API_BASE};
pub use watch_settings::{RunContext, RunError};
