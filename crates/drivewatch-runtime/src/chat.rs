//! Chat delivery interface.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub const NOTIFIER_USERNAME: &str = "UpdateNotifier";
pub const NOTIFIER_ICON: &str = ":google_drive:";

/// Legacy attachment block rendered under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageAttachment {
    pub color: String,
    pub title: String,
    pub text: String,
    pub title_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    pub icon_emoji: Option<String>,
    pub username: Option<String>,
    pub as_user: bool,
    pub attachments: Vec<MessageAttachment>,
}

impl MessageOptions {
    /// Posts under the notifier bot identity.
    pub fn notifier() -> Self {
        Self {
            icon_emoji: Some(NOTIFIER_ICON.to_string()),
            username: Some(NOTIFIER_USERNAME.to_string()),
            ..Self::default()
        }
    }

    pub fn as_user() -> Self {
        Self {
            as_user: true,
            ..Self::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<MessageAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub permalink: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str, options: &MessageOptions)
        -> Result<()>;

    /// Shares `content` as a text snippet in `channels` with `caption` as its comment.
    async fn upload_text_file(
        &self,
        channels: &[String],
        content: &str,
        caption: &str,
    ) -> Result<UploadedFile>;
}
