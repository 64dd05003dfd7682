//! Interfaces to the external systems the pipeline reads from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::activity::FOLDER_MIME_TYPE;

/// Live metadata for a storage node, as returned by the storage transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("drive item {id} was not found")]
    NotFound { id: String },
    #[error("no permission to access drive item {id}")]
    PermissionDenied { id: String },
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[async_trait]
/// Storage tree operations used for resolution and recovery.
pub trait DriveStorage: Send + Sync {
    async fn get_by_id(&self, id: &str, is_container: bool) -> Result<DriveFile, StorageError>;

    async fn is_trashed(&self, file: &DriveFile) -> Result<bool, StorageError> {
        Ok(file.trashed)
    }

    /// Copies `file` under a new name and returns the copy.
    async fn duplicate(&self, file: &DriveFile, name: &str) -> Result<DriveFile, StorageError>;

    async fn attach_to_parent(
        &self,
        file: &DriveFile,
        parent_id: &str,
    ) -> Result<(), StorageError>;
}

#[async_trait]
/// Paginated activity log below a root container.
pub trait ActivitySource: Send + Sync {
    /// Returns raw activity records newer than `since_unix_ms`, in the order the log reports them.
    async fn query_activities(
        &self,
        root_id: &str,
        since_unix_ms: Option<u64>,
    ) -> anyhow::Result<Vec<Value>>;
}

#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// Display name for a person resource such as `people/123`, if the directory knows one.
    async fn display_name(&self, person_name: &str) -> anyhow::Result<Option<String>>;
}
