//! Reconstructs `/A/B/item` paths by walking parent edges up to the root.

use std::{collections::HashMap, future::Future, pin::Pin};

use crate::item_resolver::{DriveItem, ItemResolver, LiveItem};

type AscentFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

pub struct PathResolver {
    root_id: String,
    paths: HashMap<String, String>,
}

impl PathResolver {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            paths: HashMap::new(),
        }
    }

    pub fn cached_path(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(String::as_str)
    }

    /// Path of `item` relative to the root, or its bare name when no parent chain reaches the root.
    ///
    /// The root itself maps to `""`. Tombstones never ascend.
    pub async fn path_of(&mut self, items: &mut ItemResolver, item: &DriveItem) -> String {
        match item {
            DriveItem::Tombstone(_) => item.display_name().to_string(),
            DriveItem::Live(live) => match self.ascend(items, live.clone()).await {
                Some(path) => path,
                None => live.name.clone(),
            },
        }
    }

    fn ascend<'a>(&'a mut self, items: &'a mut ItemResolver, item: LiveItem) -> AscentFuture<'a> {
        Box::pin(async move {
            if item.id == self.root_id {
                return Some(String::new());
            }
            if let Some(path) = self.paths.get(&item.id) {
                return Some(path.clone());
            }

            for parent in items.parents_of(&item).await {
                let parent_item = match parent {
                    DriveItem::Live(live) => live,
                    DriveItem::Tombstone(tombstone) => {
                        tracing::debug!(item_id = %item.id, parent_id = %tombstone.id, "skipping unreadable parent");
                        continue;
                    }
                };
                if let Some(parent_path) = self.ascend(items, parent_item).await {
                    let path = format!("{parent_path}/{}", item.name);
                    self.paths.insert(item.id.clone(), path.clone());
                    return Some(path);
                }
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::PathResolver;
    use crate::{
        activity::ItemReference,
        item_resolver::{ItemResolver, TombstoneItem},
        memory_storage::InMemoryDrive,
        DriveItem,
    };

    fn tree() -> Arc<InMemoryDrive> {
        let drive = Arc::new(InMemoryDrive::new("root"));
        drive.add_folder("a", "A", &["root"]);
        drive.add_folder("b", "B", &["a"]);
        drive.add_file("f", "file.txt", &["b"]);
        drive
    }

    #[tokio::test]
    async fn unit_root_path_is_empty_and_child_is_slash_name() {
        let drive = tree();
        let mut items = ItemResolver::new(drive);
        let mut paths = PathResolver::new("root");

        let root = items.resolve(&ItemReference::container("root"), None).await;
        assert_eq!(paths.path_of(&mut items, &root).await, "");
        let child = items.resolve(&ItemReference::container("a"), None).await;
        assert_eq!(paths.path_of(&mut items, &child).await, "/A");
    }

    #[tokio::test]
    async fn functional_nested_path_is_memoized_without_requery() {
        let drive = tree();
        let mut items = ItemResolver::new(drive.clone());
        let mut paths = PathResolver::new("root");

        let file = items.resolve(&ItemReference::leaf("f"), None).await;
        assert_eq!(paths.path_of(&mut items, &file).await, "/A/B/file.txt");
        assert_eq!(paths.cached_path("b"), Some("/A/B"));

        assert_eq!(paths.path_of(&mut items, &file).await, "/A/B/file.txt");
        assert_eq!(drive.lookup_count("f"), 1);
        assert_eq!(drive.lookup_count("b"), 1);
        assert_eq!(drive.lookup_count("a"), 1);
    }

    #[tokio::test]
    async fn regression_orphan_falls_back_to_bare_name() {
        let drive = tree();
        drive.add_file("orphan", "loose.txt", &[]);
        drive.add_folder("outside", "Elsewhere", &[]);
        drive.add_file("stray", "stray.txt", &["outside"]);
        let mut items = ItemResolver::new(drive);
        let mut paths = PathResolver::new("root");

        let orphan = items.resolve(&ItemReference::leaf("orphan"), None).await;
        assert_eq!(paths.path_of(&mut items, &orphan).await, "loose.txt");
        let stray = items.resolve(&ItemReference::leaf("stray"), None).await;
        assert_eq!(paths.path_of(&mut items, &stray).await, "stray.txt");
        assert_eq!(paths.cached_path("stray"), None);
    }

    #[tokio::test]
    async fn functional_second_parent_is_used_when_first_cannot_reach_root() {
        let drive = tree();
        drive.add_folder("outside", "Elsewhere", &[]);
        drive.add_file("multi", "shared.txt", &["outside", "b"]);
        let mut items = ItemResolver::new(drive);
        let mut paths = PathResolver::new("root");

        let item = items.resolve(&ItemReference::leaf("multi"), None).await;
        assert_eq!(paths.path_of(&mut items, &item).await, "/A/B/shared.txt");
    }

    #[tokio::test]
    async fn regression_unreadable_first_parent_falls_through_to_next() {
        let drive = tree();
        drive.add_folder("secret", "Secret", &["root"]);
        drive.deny_access("secret");
        drive.add_file("f1", "a.txt", &["secret", "root"]);
        let mut items = ItemResolver::new(drive.clone());
        let mut paths = PathResolver::new("root");

        let item = items.resolve(&ItemReference::leaf("f1"), None).await;
        assert_eq!(paths.path_of(&mut items, &item).await, "/a.txt");
        assert!(items
            .resolve(&ItemReference::container("secret"), None)
            .await
            .is_tombstone());
        assert_eq!(drive.lookup_count("secret"), 1);
    }

    #[tokio::test]
    async fn functional_siblings_share_parent_lookups() {
        let drive = tree();
        drive.add_file("g", "other.txt", &["b"]);
        let mut items = ItemResolver::new(drive.clone());
        let mut paths = PathResolver::new("root");

        for id in ["f", "g"] {
            let item = items.resolve(&ItemReference::leaf(id), None).await;
            paths.path_of(&mut items, &item).await;
        }
        assert_eq!(paths.cached_path("g"), Some("/A/B/other.txt"));
        assert_eq!(drive.lookup_count("b"), 1);
    }

    #[tokio::test]
    async fn functional_first_valid_parent_wins() {
        let drive = tree();
        drive.add_file("multi", "shared.txt", &["a", "b"]);
        let mut items = ItemResolver::new(drive);
        let mut paths = PathResolver::new("root");

        let item = items.resolve(&ItemReference::leaf("multi"), None).await;
        assert_eq!(paths.path_of(&mut items, &item).await, "/A/shared.txt");
    }

    #[tokio::test]
    async fn unit_tombstone_path_is_carried_name() {
        let drive = tree();
        let mut items = ItemResolver::new(drive);
        let mut paths = PathResolver::new("root");
        let tombstone = DriveItem::Tombstone(TombstoneItem::new("gone", false).with_name("old.txt"));
        assert_eq!(paths.path_of(&mut items, &tombstone).await, "old.txt");
    }
}
