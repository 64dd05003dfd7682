//! Slack Web API client for notification posts and snippet uploads.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    chat::{ChatTransport, MessageOptions, UploadedFile},
    http_json_client::{HttpClientSettings, HttpJsonClient},
    transport_helpers::truncate_for_error,
};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const SNIPPET_FILENAME: &str = "drive-activity.txt";

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackGetUploadUrlExternalResponse {
    ok: bool,
    upload_url: Option<String>,
    file_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackCompleteUploadExternalResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackFileInfo {
    permalink: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackFileInfoResponse {
    ok: bool,
    file: Option<SlackFileInfo>,
    error: Option<String>,
}

fn slack_failure(operation: &str, error: Option<String>) -> anyhow::Error {
    anyhow!(
        "slack {operation} failed: {}",
        error.unwrap_or_else(|| "unknown error".to_string())
    )
}

#[derive(Clone)]
pub struct SlackApiClient {
    client: HttpJsonClient,
    api_base: String,
}

impl SlackApiClient {
    pub fn new(api_base: &str, bot_token: &str, settings: HttpClientSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bot_token.trim()))
                .context("invalid slack authorization header")?,
        );
        Ok(Self {
            client: HttpJsonClient::new("slack", "drivewatch", headers, settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn permalink(&self, file_id: &str) -> Result<String> {
        let url = self.method_url("files.info");
        let info: SlackFileInfoResponse = self
            .client
            .request_json("files.info", || {
                self.client.http().get(&url).query(&[("file", file_id)])
            })
            .await?;
        if !info.ok {
            return Err(slack_failure("files.info", info.error));
        }
        info.file
            .and_then(|file| file.permalink)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.info did not return a permalink"))
    }
}

#[async_trait]
impl ChatTransport for SlackApiClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(icon_emoji) = options.icon_emoji.as_deref() {
            payload["icon_emoji"] = Value::String(icon_emoji.to_string());
        }
        if let Some(username) = options.username.as_deref() {
            payload["username"] = Value::String(username.to_string());
        }
        if options.as_user {
            payload["as_user"] = Value::Bool(true);
        }
        if !options.attachments.is_empty() {
            payload["attachments"] = serde_json::to_value(&options.attachments)
                .context("failed to encode slack attachments")?;
        }

        let url = self.method_url("chat.postMessage");
        let response: SlackChatMessageResponse = self
            .client
            .request_json("chat.postMessage", || {
                self.client.http().post(&url).json(&payload)
            })
            .await?;
        if !response.ok {
            return Err(slack_failure("chat.postMessage", response.error));
        }
        Ok(())
    }

    async fn upload_text_file(
        &self,
        channels: &[String],
        content: &str,
        caption: &str,
    ) -> Result<UploadedFile> {
        if content.is_empty() {
            bail!("slack files upload requires non-empty payload");
        }

        let get_url = self.method_url("files.getUploadURLExternal");
        let length = content.len().to_string();
        let get_upload: SlackGetUploadUrlExternalResponse = self
            .client
            .request_json("files.getUploadURLExternal", || {
                self.client
                    .http()
                    .post(&get_url)
                    .form(&[("filename", SNIPPET_FILENAME), ("length", length.as_str())])
            })
            .await?;
        if !get_upload.ok {
            return Err(slack_failure("files.getUploadURLExternal", get_upload.error));
        }
        let upload_url = get_upload
            .upload_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing upload_url"))?;
        let file_id = get_upload
            .file_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing file_id"))?;

        let upload_response = self
            .client
            .http()
            .post(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(content.to_string())
            .send()
            .await
            .context("failed to upload snippet to slack external upload URL")?;
        if !upload_response.status().is_success() {
            let status = upload_response.status();
            let body = upload_response.text().await.unwrap_or_default();
            bail!(
                "slack external upload failed: status={} body={}",
                status,
                truncate_for_error(&body, 320)
            );
        }

        let complete_url = self.method_url("files.completeUploadExternal");
        let complete_payload = json!({
            "files": [{ "id": file_id.clone(), "title": SNIPPET_FILENAME }],
            "channels": channels.join(","),
            "initial_comment": caption,
        });
        let complete: SlackCompleteUploadExternalResponse = self
            .client
            .request_json("files.completeUploadExternal", || {
                self.client.http().post(&complete_url).json(&complete_payload)
            })
            .await?;
        if !complete.ok {
            return Err(slack_failure("files.completeUploadExternal", complete.error));
        }

        let permalink = self.permalink(&file_id).await?;
        Ok(UploadedFile { file_id, permalink })
    }
}
