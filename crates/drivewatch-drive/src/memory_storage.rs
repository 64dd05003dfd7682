//! In-process storage tree for tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::{
    activity::FOLDER_MIME_TYPE,
    collaborators::{DriveFile, DriveStorage, StorageError},
};

#[derive(Default)]
struct DriveTree {
    files: BTreeMap<String, DriveFile>,
    denied: HashSet<String>,
    lookups: HashMap<String, usize>,
    copies: Vec<(String, String)>,
    attachments: Vec<(String, String)>,
}

pub struct InMemoryDrive {
    tree: Mutex<DriveTree>,
}

impl InMemoryDrive {
    /// Creates a tree holding only the root folder `root_id`.
    pub fn new(root_id: &str) -> Self {
        let drive = Self {
            tree: Mutex::new(DriveTree::default()),
        };
        drive.add_folder(root_id, "My Drive", &[]);
        drive
    }

    pub fn add_folder(&self, id: &str, name: &str, parents: &[&str]) -> DriveFile {
        self.insert(id, name, FOLDER_MIME_TYPE, parents)
    }

    pub fn add_file(&self, id: &str, name: &str, parents: &[&str]) -> DriveFile {
        self.insert(id, name, "text/plain", parents)
    }

    pub fn trash(&self, id: &str) {
        if let Some(file) = self.tree().files.get_mut(id) {
            file.trashed = true;
        }
    }

    pub fn remove(&self, id: &str) {
        self.tree().files.remove(id);
    }

    pub fn deny_access(&self, id: &str) {
        self.tree().denied.insert(id.to_string());
    }

    pub fn file(&self, id: &str) -> Option<DriveFile> {
        self.tree().files.get(id).cloned()
    }

    pub fn lookup_count(&self, id: &str) -> usize {
        self.tree().lookups.get(id).copied().unwrap_or(0)
    }

    /// `(source id, copy id)` pairs in the order copies were made.
    pub fn copies(&self) -> Vec<(String, String)> {
        self.tree().copies.clone()
    }

    /// `(item id, parent id)` pairs in the order they were attached.
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.tree().attachments.clone()
    }

    fn insert(&self, id: &str, name: &str, mime_type: &str, parents: &[&str]) -> DriveFile {
        let file = DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            web_view_link: Some(format!("https://drive.test/{id}")),
            parents: parents.iter().map(|parent| parent.to_string()).collect(),
            trashed: false,
        };
        self.tree().files.insert(id.to_string(), file.clone());
        file
    }

    fn tree(&self) -> MutexGuard<'_, DriveTree> {
        self.tree
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DriveStorage for InMemoryDrive {
    async fn get_by_id(&self, id: &str, _is_container: bool) -> Result<DriveFile, StorageError> {
        let mut tree = self.tree();
        *tree.lookups.entry(id.to_string()).or_default() += 1;
        if tree.denied.contains(id) {
            return Err(StorageError::PermissionDenied { id: id.to_string() });
        }
        tree.files
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn is_trashed(&self, file: &DriveFile) -> Result<bool, StorageError> {
        Ok(self
            .tree()
            .files
            .get(&file.id)
            .map(|current| current.trashed)
            .unwrap_or(file.trashed))
    }

    async fn duplicate(&self, file: &DriveFile, name: &str) -> Result<DriveFile, StorageError> {
        let mut tree = self.tree();
        if !tree.files.contains_key(&file.id) {
            return Err(StorageError::NotFound {
                id: file.id.clone(),
            });
        }
        let copy_id = format!("{}-copy-{}", file.id, tree.copies.len() + 1);
        let copy = DriveFile {
            id: copy_id.clone(),
            name: name.to_string(),
            mime_type: file.mime_type.clone(),
            web_view_link: Some(format!("https://drive.test/{copy_id}")),
            parents: Vec::new(),
            trashed: false,
        };
        tree.files.insert(copy_id.clone(), copy.clone());
        tree.copies.push((file.id.clone(), copy_id));
        Ok(copy)
    }

    async fn attach_to_parent(
        &self,
        file: &DriveFile,
        parent_id: &str,
    ) -> Result<(), StorageError> {
        let mut tree = self.tree();
        if !tree.files.contains_key(parent_id) {
            return Err(StorageError::Transport(anyhow!(
                "parent {parent_id} does not exist"
            )));
        }
        let entry = tree
            .files
            .get_mut(&file.id)
            .ok_or_else(|| StorageError::NotFound {
                id: file.id.clone(),
            })?;
        if !entry.parents.iter().any(|existing| existing == parent_id) {
            entry.parents.push(parent_id.to_string());
        }
        tree.attachments.push((file.id.clone(), parent_id.to_string()));
        Ok(())
    }
}
