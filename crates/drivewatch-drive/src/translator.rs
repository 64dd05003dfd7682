//! Turns validated activity records into display payloads.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::{
    action_catalog::{action_color, action_label, DELETE_ACTION},
    activity::{parse_activity, ActivityShapeError, DriveActivity, ItemReference},
    collaborators::DriveStorage,
    ignore_classifier::IgnoreClassifier,
    item_resolver::{share_url, DriveItem, ItemResolver},
    path_resolver::PathResolver,
    person_names::PersonNameResolver,
    time_text::format_activity_time,
};

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub root_id: String,
    pub ignored_items: Vec<String>,
    pub ignored_actions: Vec<String>,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub reference: ItemReference,
    pub path: String,
    pub url: String,
    pub item: DriveItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedActivity {
    pub action: String,
    pub label: String,
    pub color: &'static str,
    pub actors_text: String,
    pub time_text: String,
    pub occurred_at: DateTime<Utc>,
    /// Target count before ignore filtering.
    pub total_targets: usize,
    /// Targets that survived ignore filtering, in activity order.
    pub targets: Vec<ResolvedTarget>,
    pub unfiltered_targets: Vec<ItemReference>,
}

impl TranslatedActivity {
    pub fn summary_text(&self) -> String {
        format!(
            "{}が *{}* 件のアイテムを *{}* しました。\n発生日時: {}",
            self.actors_text, self.total_targets, self.label, self.time_text
        )
    }

    pub fn is_deletion(&self) -> bool {
        self.action == DELETE_ACTION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    IgnoredAction,
    AllTargetsIgnored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(Box<TranslatedActivity>),
    Skipped(SkipReason),
}

/// Holds the per-run item, path and ignore caches.
pub struct ActivityTranslator {
    ignored_actions: HashSet<String>,
    timezone: Tz,
    items: ItemResolver,
    paths: PathResolver,
    ignore: IgnoreClassifier,
    people: PersonNameResolver,
}

impl ActivityTranslator {
    pub fn new(
        config: TranslatorConfig,
        storage: Arc<dyn DriveStorage>,
        people: PersonNameResolver,
    ) -> Self {
        Self {
            ignored_actions: config.ignored_actions.into_iter().collect(),
            timezone: config.timezone,
            items: ItemResolver::new(storage),
            paths: PathResolver::new(config.root_id.clone()),
            ignore: IgnoreClassifier::new(config.root_id, config.ignored_items),
            people,
        }
    }

    pub fn items(&self) -> &ItemResolver {
        &self.items
    }

    /// Validates a raw record and translates it.
    pub async fn translate_record(
        &mut self,
        record: &Value,
    ) -> Result<TranslationOutcome, ActivityShapeError> {
        let activity = parse_activity(record)?;
        Ok(self.translate(&activity).await)
    }

    pub async fn translate(&mut self, activity: &DriveActivity) -> TranslationOutcome {
        if self.ignored_actions.contains(&activity.action) {
            tracing::debug!(action = %activity.action, "skipping ignored action");
            return TranslationOutcome::Skipped(SkipReason::IgnoredAction);
        }

        let mut targets = Vec::new();
        for target in &activity.targets {
            let item = self.items.resolve_target(target).await;
            if self.ignore.is_ignored(&mut self.items, &item).await {
                tracing::debug!(item_id = %item.id(), "target is in an ignored subtree");
                continue;
            }
            let path = self.paths.path_of(&mut self.items, &item).await;
            let url = item
                .url()
                .map(str::to_string)
                .unwrap_or_else(|| share_url(item.id(), item.is_container()));
            targets.push(ResolvedTarget {
                reference: target.reference(),
                path,
                url,
                item,
            });
        }
        if targets.is_empty() {
            return TranslationOutcome::Skipped(SkipReason::AllTargetsIgnored);
        }

        let actors_text = self.people.actors_text(&activity.actors).await;
        TranslationOutcome::Translated(Box::new(TranslatedActivity {
            action: activity.action.clone(),
            label: action_label(&activity.action),
            color: action_color(&activity.action),
            actors_text,
            time_text: format_activity_time(&activity.time, self.timezone),
            occurred_at: activity.time.occurred_at(),
            total_targets: activity.targets.len(),
            targets,
            unfiltered_targets: activity
                .targets
                .iter()
                .map(|target| target.reference())
                .collect(),
        }))
    }
}
