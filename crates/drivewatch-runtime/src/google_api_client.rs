//! Google Drive, Drive Activity and People API client.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use drivewatch_drive::{ActivitySource, DriveFile, DriveStorage, PersonDirectory, StorageError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http_json_client::{ApiRequestError, HttpClientSettings, HttpJsonClient};

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DRIVE_ACTIVITY_API_BASE: &str = "https://driveactivity.googleapis.com/v2";
pub const DEFAULT_PEOPLE_API_BASE: &str = "https://people.googleapis.com/v1";

const FILE_FIELDS: &str = "id,name,mimeType,webViewLink,parents,trashed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleApiBases {
    pub drive: String,
    pub drive_activity: String,
    pub people: String,
}

impl Default for GoogleApiBases {
    fn default() -> Self {
        Self {
            drive: DEFAULT_DRIVE_API_BASE.to_string(),
            drive_activity: DEFAULT_DRIVE_ACTIVITY_API_BASE.to_string(),
            people: DEFAULT_PEOPLE_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityQueryResponse {
    #[serde(default)]
    activities: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonResponse {
    #[serde(default)]
    names: Vec<PersonName>,
}

#[derive(Clone)]
pub struct GoogleApiClient {
    client: HttpJsonClient,
    bases: GoogleApiBases,
}

impl GoogleApiClient {
    pub fn new(
        access_token: &str,
        bases: GoogleApiBases,
        settings: HttpClientSettings,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access_token.trim()))
                .context("invalid google authorization header")?,
        );
        Ok(Self {
            client: HttpJsonClient::new("google", "drivewatch", headers, settings)?,
            bases: GoogleApiBases {
                drive: bases.drive.trim_end_matches('/').to_string(),
                drive_activity: bases.drive_activity.trim_end_matches('/').to_string(),
                people: bases.people.trim_end_matches('/').to_string(),
            },
        })
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{id}", self.bases.drive)
    }
}

fn storage_error(id: &str, error: ApiRequestError) -> StorageError {
    match error.status() {
        Some(404) => StorageError::NotFound { id: id.to_string() },
        Some(403) => StorageError::PermissionDenied { id: id.to_string() },
        _ => StorageError::Transport(anyhow::Error::new(error)),
    }
}

#[async_trait]
impl DriveStorage for GoogleApiClient {
    async fn get_by_id(&self, id: &str, _is_container: bool) -> Result<DriveFile, StorageError> {
        let url = self.file_url(id);
        self.client
            .request_json("files.get", || {
                self.client.http().get(&url).query(&[
                    ("fields", FILE_FIELDS),
                    ("supportsAllDrives", "true"),
                ])
            })
            .await
            .map_err(|error| storage_error(id, error))
    }

    async fn is_trashed(&self, file: &DriveFile) -> Result<bool, StorageError> {
        Ok(self.get_by_id(&file.id, file.is_folder()).await?.trashed)
    }

    async fn duplicate(&self, file: &DriveFile, name: &str) -> Result<DriveFile, StorageError> {
        let url = format!("{}/copy", self.file_url(&file.id));
        let body = json!({ "name": name });
        self.client
            .request_json("files.copy", || {
                self.client
                    .http()
                    .post(&url)
                    .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
                    .json(&body)
            })
            .await
            .map_err(|error| storage_error(&file.id, error))
    }

    async fn attach_to_parent(
        &self,
        file: &DriveFile,
        parent_id: &str,
    ) -> Result<(), StorageError> {
        let url = self.file_url(&file.id);
        self.client
            .request_empty("files.update", || {
                self.client
                    .http()
                    .patch(&url)
                    .query(&[
                        ("addParents", parent_id),
                        ("fields", "id"),
                        ("supportsAllDrives", "true"),
                    ])
                    .json(&json!({}))
            })
            .await
            .map_err(|error| storage_error(&file.id, error))
    }
}

#[async_trait]
impl ActivitySource for GoogleApiClient {
    async fn query_activities(
        &self,
        root_id: &str,
        since_unix_ms: Option<u64>,
    ) -> anyhow::Result<Vec<Value>> {
        let url = format!("{}/activity:query", self.bases.drive_activity);
        let filter = since_unix_ms
            .map(|since| format!("time > {since}"))
            .unwrap_or_default();
        let mut activities = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({
                "ancestorName": format!("items/{root_id}"),
                "filter": filter,
                "consolidationStrategy": { "legacy": {} },
            });
            if let Some(token) = page_token.as_deref() {
                body["pageToken"] = Value::String(token.to_string());
            }
            let page: ActivityQueryResponse = self
                .client
                .query_json("activity.query", || self.client.http().post(&url).json(&body))
                .await?;
            activities.extend(page.activities);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(root_id, count = activities.len(), "fetched drive activity");
        Ok(activities)
    }
}

#[async_trait]
impl PersonDirectory for GoogleApiClient {
    async fn display_name(&self, person_name: &str) -> anyhow::Result<Option<String>> {
        if !person_name.starts_with("people/") {
            return Err(anyhow!("'{person_name}' is not a people resource name"));
        }
        let url = format!("{}/{person_name}", self.bases.people);
        let response = self
            .client
            .request_json::<PersonResponse, _>("people.get", || {
                self.client
                    .http()
                    .get(&url)
                    .query(&[("personFields", "names")])
            })
            .await;
        match response {
            Ok(person) => Ok(person
                .names
                .into_iter()
                .find_map(|name| name.display_name.filter(|value| !value.trim().is_empty()))),
            Err(error) if error.status() == Some(404) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}
