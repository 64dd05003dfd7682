//! Per-run memo of resolved storage items.

use std::{collections::HashMap, sync::Arc};

use crate::{
    activity::{ItemReference, TargetRef},
    collaborators::{DriveFile, DriveStorage},
};

/// Canonical share link for an item id, used when the item itself cannot be asked.
pub fn share_url(id: &str, is_container: bool) -> String {
    if is_container {
        format!("https://drive.google.com/drive/folders/{id}?usp=sharing")
    } else {
        format!("https://drive.google.com/file/d/{id}/view?usp=sharing")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveItem {
    pub id: String,
    pub name: String,
    pub is_container: bool,
    pub url: String,
    pub file: DriveFile,
}

impl LiveItem {
    fn from_file(id: &str, is_container: bool, file: DriveFile) -> Self {
        let url = file
            .web_view_link
            .clone()
            .unwrap_or_else(|| share_url(id, is_container));
        Self {
            id: id.to_string(),
            name: file.name.clone(),
            is_container,
            url,
            file,
        }
    }
}

/// An item that no longer resolves. Name and url stay empty until a caller supplies them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TombstoneItem {
    pub id: String,
    pub is_container: bool,
    pub name: Option<String>,
    pub url: Option<String>,
}

impl TombstoneItem {
    pub fn new(id: impl Into<String>, is_container: bool) -> Self {
        Self {
            id: id.into(),
            is_container,
            name: None,
            url: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.url = Some(share_url(&self.id, self.is_container));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveItem {
    Live(LiveItem),
    Tombstone(TombstoneItem),
}

impl DriveItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Live(item) => &item.id,
            Self::Tombstone(item) => &item.id,
        }
    }

    pub fn is_container(&self) -> bool {
        match self {
            Self::Live(item) => item.is_container,
            Self::Tombstone(item) => item.is_container,
        }
    }

    /// Best available name; a nameless tombstone falls back to its id.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Live(item) => &item.name,
            Self::Tombstone(item) => item.name.as_deref().unwrap_or(&item.id),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Live(item) => Some(&item.url),
            Self::Tombstone(item) => item.url.as_deref(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone(_))
    }
}

pub struct ItemResolver {
    storage: Arc<dyn DriveStorage>,
    cache: HashMap<String, DriveItem>,
}

impl ItemResolver {
    pub fn new(storage: Arc<dyn DriveStorage>) -> Self {
        Self {
            storage,
            cache: HashMap::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn DriveStorage> {
        &self.storage
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolves `reference`, wrapping `hint` directly when the caller already holds live metadata.
    ///
    /// A cached entry wins unconditionally. Lookup failures are logged and
    /// become tombstones; they never escape this call.
    pub async fn resolve(&mut self, reference: &ItemReference, hint: Option<DriveFile>) -> DriveItem {
        if let Some(cached) = self.cache.get(&reference.id) {
            return cached.clone();
        }
        let item = match hint {
            Some(file) => DriveItem::Live(LiveItem::from_file(
                &reference.id,
                reference.is_container,
                file,
            )),
            None => match self
                .storage
                .get_by_id(&reference.id, reference.is_container)
                .await
            {
                Ok(file) => DriveItem::Live(LiveItem::from_file(
                    &reference.id,
                    reference.is_container,
                    file,
                )),
                Err(error) => {
                    tracing::warn!(
                        item_id = %reference.id,
                        error = %error,
                        "drive item lookup failed; using tombstone"
                    );
                    DriveItem::Tombstone(TombstoneItem::new(
                        reference.id.clone(),
                        reference.is_container,
                    ))
                }
            },
        };
        self.cache.insert(reference.id.clone(), item.clone());
        item
    }

    /// Resolves an activity target and applies the title carried by the activity.
    pub async fn resolve_target(&mut self, target: &TargetRef) -> DriveItem {
        let reference = target.reference();
        let title = target.raw_name();
        match self.resolve(&reference, None).await {
            DriveItem::Live(mut live) => {
                if !title.is_empty() && live.name != title {
                    live.name = title.to_string();
                    self.cache
                        .insert(live.id.clone(), DriveItem::Live(live.clone()));
                }
                DriveItem::Live(live)
            }
            DriveItem::Tombstone(tombstone) => DriveItem::Tombstone(tombstone.with_name(title)),
        }
    }

    /// Resolves every parent of `item` as a container, in the order the storage reports them.
    ///
    /// Parents go through the same memo as any other reference, so an
    /// unreadable parent becomes a tombstone and siblings share one lookup.
    pub async fn parents_of(&mut self, item: &LiveItem) -> Vec<DriveItem> {
        let mut parents = Vec::with_capacity(item.file.parents.len());
        for parent_id in &item.file.parents {
            parents.push(self.resolve(&ItemReference::container(parent_id.clone()), None).await);
        }
        parents
    }
}
