//! Chooses between inline attachments and an uploaded snippet.

use std::sync::Arc;

use anyhow::{Context, Result};
use drivewatch_drive::TranslatedActivity;

use crate::chat::{ChatTransport, MessageAttachment, MessageOptions};

/// Largest target count delivered as inline attachments.
pub const INLINE_TARGET_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Inline { attachments: usize },
    Snippet { permalink: String },
}

impl DispatchResult {
    pub fn permalink(&self) -> Option<&str> {
        match self {
            Self::Inline { .. } => None,
            Self::Snippet { permalink } => Some(permalink),
        }
    }
}

pub fn uses_inline_delivery(target_count: usize) -> bool {
    target_count <= INLINE_TARGET_LIMIT
}

pub struct NotificationDispatcher {
    chat: Arc<dyn ChatTransport>,
    channel: String,
}

impl NotificationDispatcher {
    pub fn new(chat: Arc<dyn ChatTransport>, channel: impl Into<String>) -> Self {
        Self {
            chat,
            channel: channel.into(),
        }
    }

    pub async fn dispatch(&self, activity: &TranslatedActivity) -> Result<DispatchResult> {
        let summary = activity.summary_text();
        if uses_inline_delivery(activity.targets.len()) {
            let attachments = activity
                .targets
                .iter()
                .map(|target| MessageAttachment {
                    color: activity.color.to_string(),
                    title: format!("{}: {}", activity.label, target.path),
                    text: String::new(),
                    title_link: target.url.clone(),
                })
                .collect::<Vec<_>>();
            let count = attachments.len();
            self.chat
                .post_message(
                    &self.channel,
                    &summary,
                    &MessageOptions::notifier().with_attachments(attachments),
                )
                .await
                .context("failed to post activity notification")?;
            return Ok(DispatchResult::Inline { attachments: count });
        }

        let snippet = activity
            .targets
            .iter()
            .map(|target| format!("{}: {}", activity.label, target.path))
            .collect::<Vec<_>>()
            .join("\n");
        let uploaded = self
            .chat
            .upload_text_file(std::slice::from_ref(&self.channel), &snippet, &summary)
            .await
            .context("failed to upload activity snippet")?;
        tracing::debug!(
            targets = activity.targets.len(),
            file_id = %uploaded.file_id,
            "delivered activity as snippet"
        );
        Ok(DispatchResult::Snippet {
            permalink: uploaded.permalink,
        })
    }
}
