//! Deny-list classification with unanimous-ancestor propagation.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    pin::Pin,
};

use crate::item_resolver::{DriveItem, ItemResolver};

type ClassifyFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

pub struct IgnoreClassifier {
    root_id: String,
    deny_list: HashSet<String>,
    ignored: HashMap<String, bool>,
}

impl IgnoreClassifier {
    pub fn new<I>(root_id: impl Into<String>, deny_list: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            root_id: root_id.into(),
            deny_list: deny_list.into_iter().collect(),
            ignored: HashMap::new(),
        }
    }

    pub fn cached(&self, id: &str) -> Option<bool> {
        self.ignored.get(id).copied()
    }

    /// An item is ignored when it is denied outright, or when every one of its parents is ignored.
    ///
    /// The root is never ignored and tombstones are always surfaced. The
    /// tree is assumed acyclic.
    pub async fn is_ignored(&mut self, items: &mut ItemResolver, item: &DriveItem) -> bool {
        self.classify(items, item.clone()).await
    }

    fn classify<'a>(&'a mut self, items: &'a mut ItemResolver, item: DriveItem) -> ClassifyFuture<'a> {
        Box::pin(async move {
            let id = item.id().to_string();
            if let Some(ignored) = self.ignored.get(&id) {
                return *ignored;
            }
            if id == self.root_id {
                self.ignored.insert(id, false);
                return false;
            }
            if self.deny_list.contains(&id) {
                self.ignored.insert(id, true);
                return true;
            }

            let DriveItem::Live(live) = item else {
                return false;
            };
            let parents = items.parents_of(&live).await;
            if parents.is_empty() {
                self.ignored.insert(id, false);
                return false;
            }
            for parent_item in parents {
                if !self.classify(items, parent_item).await {
                    self.ignored.insert(id, false);
                    return false;
                }
            }
            self.ignored.insert(id, true);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::IgnoreClassifier;
    use crate::{
        activity::ItemReference,
        item_resolver::{DriveItem, ItemResolver, TombstoneItem},
        memory_storage::InMemoryDrive,
    };

    fn tree() -> Arc<InMemoryDrive> {
        let drive = Arc::new(InMemoryDrive::new("root"));
        drive.add_folder("archive", "Archive", &["root"]);
        drive.add_folder("old", "Old", &["archive"]);
        drive.add_folder("live", "Live", &["root"]);
        drive.add_file("deep", "deep.txt", &["old"]);
        drive
    }

    fn classifier(denied: &[&str]) -> IgnoreClassifier {
        IgnoreClassifier::new("root", denied.iter().map(|id| id.to_string()))
    }

    #[tokio::test]
    async fn functional_descendants_of_denied_folder_are_ignored() {
        let mut items = ItemResolver::new(tree());
        let mut ignore = classifier(&["archive"]);
        let deep = items.resolve(&ItemReference::leaf("deep"), None).await;
        assert!(ignore.is_ignored(&mut items, &deep).await);
        assert_eq!(ignore.cached("old"), Some(true));
        let live = items.resolve(&ItemReference::container("live"), None).await;
        assert!(!ignore.is_ignored(&mut items, &live).await);
    }

    #[tokio::test]
    async fn functional_one_visible_parent_keeps_item_visible() {
        let drive = tree();
        drive.add_file("both", "both.txt", &["old", "live"]);
        let mut items = ItemResolver::new(drive);
        let mut ignore = classifier(&["archive"]);
        let both = items.resolve(&ItemReference::leaf("both"), None).await;
        assert!(!ignore.is_ignored(&mut items, &both).await);
    }

    #[tokio::test]
    async fn functional_all_parents_ignored_hides_item() {
        let drive = tree();
        drive.add_folder("trash-bin", "Bin", &["root"]);
        drive.add_file("both", "both.txt", &["old", "trash-bin"]);
        let mut items = ItemResolver::new(drive);
        let mut ignore = classifier(&["archive", "trash-bin"]);
        let both = items.resolve(&ItemReference::leaf("both"), None).await;
        assert!(ignore.is_ignored(&mut items, &both).await);
    }

    #[tokio::test]
    async fn unit_root_orphans_and_tombstones_are_never_ignored() {
        let drive = tree();
        drive.add_file("orphan", "orphan.txt", &[]);
        let mut items = ItemResolver::new(drive);
        let mut ignore = classifier(&["root", "gone"]);

        let root = items.resolve(&ItemReference::container("root"), None).await;
        assert!(!ignore.is_ignored(&mut items, &root).await);
        let orphan = items.resolve(&ItemReference::leaf("orphan"), None).await;
        assert!(!ignore.is_ignored(&mut items, &orphan).await);
        let tombstone = DriveItem::Tombstone(TombstoneItem::new("missing", false));
        assert!(!ignore.is_ignored(&mut items, &tombstone).await);
    }

    #[tokio::test]
    async fn unit_explicit_denial_short_circuits_parent_lookup() {
        let drive = tree();
        let mut items = ItemResolver::new(drive.clone());
        let mut ignore = classifier(&["deep"]);
        let deep = items.resolve(&ItemReference::leaf("deep"), None).await;
        assert!(ignore.is_ignored(&mut items, &deep).await);
        assert_eq!(drive.lookup_count("old"), 0);
    }

    #[tokio::test]
    async fn functional_classification_is_memoized() {
        let drive = tree();
        let mut items = ItemResolver::new(drive.clone());
        let mut ignore = classifier(&["archive"]);
        let deep = items.resolve(&ItemReference::leaf("deep"), None).await;
        assert!(ignore.is_ignored(&mut items, &deep).await);
        assert!(ignore.is_ignored(&mut items, &deep).await);
        assert_eq!(drive.lookup_count("old"), 1);
        assert_eq!(drive.lookup_count("archive"), 1);
    }

    #[tokio::test]
    async fn regression_unreadable_parent_is_classified_on_its_own() {
        let drive = tree();
        drive.add_folder("secret", "Secret", &["root"]);
        drive.deny_access("secret");
        drive.add_file("hidden", "hidden.txt", &["old", "secret"]);
        drive.add_file("shared", "shared.txt", &["secret", "old"]);
        let mut items = ItemResolver::new(drive.clone());
        let mut ignore = classifier(&["archive"]);

        let hidden = items.resolve(&ItemReference::leaf("hidden"), None).await;
        assert!(!ignore.is_ignored(&mut items, &hidden).await);
        assert_eq!(ignore.cached("old"), Some(true));
        let shared = items.resolve(&ItemReference::leaf("shared"), None).await;
        assert!(!ignore.is_ignored(&mut items, &shared).await);
        assert_eq!(drive.lookup_count("secret"), 1);
    }
}
