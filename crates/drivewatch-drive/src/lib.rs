//! Drive activity model and the resolution pipeline that turns raw activity
//! records into display-ready notifications.
//!
//! The storage tree, the activity log and the people directory are reached
//! only through the traits in [`collaborators`]; every cache in this crate
//! lives for a single run.

pub mod action_catalog;
pub mod activity;
pub mod collaborators;
pub mod ignore_classifier;
pub mod item_resolver;
#[cfg(any(test, feature = "test-support"))]
pub mod memory_storage;
pub mod path_resolver;
pub mod person_names;
pub mod time_text;
pub mod translator;

pub use action_catalog::{action_color, action_label, DELETE_ACTION};
pub use activity::{
    parse_activity, ActivityShapeError, ActivityTime, ActorRef, DriveActivity, ItemReference,
    TargetRef,
};
pub use collaborators::{ActivitySource, DriveFile, DriveStorage, PersonDirectory, StorageError};
pub use ignore_classifier::IgnoreClassifier;
pub use item_resolver::{DriveItem, ItemResolver, LiveItem, TombstoneItem};
#[cfg(any(test, feature = "test-support"))]
pub use memory_storage::InMemoryDrive;
pub use path_resolver::PathResolver;
pub use person_names::{PersonNameResolver, PERSON_NAME_TTL_MS};
pub use time_text::{format_activity_time, format_due, format_instant};
pub use translator::{
    ActivityTranslator, ResolvedTarget, SkipReason, TranslatedActivity, TranslationOutcome,
    TranslatorConfig,
};
