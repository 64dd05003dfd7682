//! Activity records as reported by the Drive Activity API, validated into
//! strongly typed values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Identifies a storage node without promising that it still exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    pub id: String,
    #[serde(alias = "isFolder")]
    pub is_container: bool,
}

impl ItemReference {
    pub fn new(id: impl Into<String>, is_container: bool) -> Self {
        Self {
            id: id.into(),
            is_container,
        }
    }

    pub fn container(id: impl Into<String>) -> Self {
        Self::new(id, true)
    }

    pub fn leaf(id: impl Into<String>) -> Self {
        Self::new(id, false)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityShapeError {
    #[error("activity record is not a valid object: {0}")]
    InvalidRecord(String),
    #[error("activity has no primary action detail")]
    MissingActionDetail,
    #[error("activity has more than one primary action tag: {0:?}")]
    MultipleActionDetails(Vec<String>),
    #[error("activity has no targets")]
    NoTargets,
    #[error("activity target is not recognised: {0}")]
    InvalidTarget(String),
    #[error("activity carries neither a timestamp nor a time range")]
    MissingTime,
    #[error("activity carries both a timestamp and a time range")]
    AmbiguousTime,
    #[error("activity time '{0}' is not RFC 3339")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTime {
    Instant(DateTime<Utc>),
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ActivityTime {
    /// The moment the activity counts as having happened: the instant, or the end of the range.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Instant(at) => *at,
            Self::Range { end, .. } => *end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRef {
    KnownUser { person_name: String },
    Impersonation { person_name: String },
    DeletedUser,
    UnknownUser,
    Anonymous,
    Administrator,
    System,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItemTarget {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub folder: Option<Value>,
    #[serde(default)]
    pub file: Option<Value>,
}

impl DriveItemTarget {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some() || self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDriveTarget {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub root: Option<DriveItemTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentTarget {
    pub parent: DriveItemTarget,
    #[serde(default)]
    pub legacy_comment_id: Option<String>,
    #[serde(default)]
    pub link_to_discussion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetRef {
    DriveItem(DriveItemTarget),
    #[serde(alias = "teamDrive")]
    Drive(SharedDriveTarget),
    FileComment(CommentTarget),
}

impl TargetRef {
    fn resource_name(&self) -> &str {
        match self {
            Self::DriveItem(item) => &item.name,
            Self::Drive(drive) => &drive.name,
            Self::FileComment(comment) => &comment.parent.name,
        }
    }

    /// Item id with the `items/` (or `drives/`) resource prefix removed.
    pub fn item_id(&self) -> &str {
        let name = self.resource_name();
        name.split_once('/').map(|(_, id)| id).unwrap_or(name)
    }

    /// Title carried by the activity payload, usable even when the item is gone.
    pub fn raw_name(&self) -> &str {
        match self {
            Self::DriveItem(item) => &item.title,
            Self::Drive(drive) => &drive.title,
            Self::FileComment(comment) => &comment.parent.title,
        }
    }

    pub fn is_container(&self) -> bool {
        match self {
            Self::DriveItem(item) => item.is_folder(),
            Self::Drive(_) => true,
            Self::FileComment(comment) => comment.parent.is_folder(),
        }
    }

    pub fn reference(&self) -> ItemReference {
        ItemReference::new(self.item_id(), self.is_container())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveActivity {
    pub action: String,
    pub actors: Vec<ActorRef>,
    pub targets: Vec<TargetRef>,
    pub time: ActivityTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTimeRange {
    start_time: String,
    end_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    #[serde(default)]
    primary_action_detail: Option<Map<String, Value>>,
    #[serde(default)]
    actors: Vec<Value>,
    #[serde(default)]
    targets: Vec<Value>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    time_range: Option<RawTimeRange>,
}

/// Validates one raw activity record.
pub fn parse_activity(record: &Value) -> Result<DriveActivity, ActivityShapeError> {
    let raw = RawActivity::deserialize(record)
        .map_err(|error| ActivityShapeError::InvalidRecord(error.to_string()))?;

    let detail = raw
        .primary_action_detail
        .ok_or(ActivityShapeError::MissingActionDetail)?;
    let mut kinds = detail.keys().cloned().collect::<Vec<_>>();
    let action = match kinds.len() {
        0 => return Err(ActivityShapeError::MissingActionDetail),
        1 => kinds.remove(0),
        _ => return Err(ActivityShapeError::MultipleActionDetails(kinds)),
    };

    if raw.targets.is_empty() {
        return Err(ActivityShapeError::NoTargets);
    }
    let targets = raw
        .targets
        .iter()
        .map(|target| {
            TargetRef::deserialize(target)
                .map_err(|error| ActivityShapeError::InvalidTarget(error.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let time = match (raw.timestamp, raw.time_range) {
        (Some(_), Some(_)) => return Err(ActivityShapeError::AmbiguousTime),
        (None, None) => return Err(ActivityShapeError::MissingTime),
        (Some(timestamp), None) => ActivityTime::Instant(parse_timestamp(&timestamp)?),
        (None, Some(range)) => ActivityTime::Range {
            start: parse_timestamp(&range.start_time)?,
            end: parse_timestamp(&range.end_time)?,
        },
    };

    Ok(DriveActivity {
        action,
        actors: raw.actors.iter().map(parse_actor).collect(),
        targets,
        time,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ActivityShapeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ActivityShapeError::InvalidTimestamp(raw.to_string()))
}

fn parse_user(user: &Value) -> ActorRef {
    if let Some(person_name) = user
        .pointer("/knownUser/personName")
        .and_then(Value::as_str)
    {
        return ActorRef::KnownUser {
            person_name: person_name.to_string(),
        };
    }
    if user.get("deletedUser").is_some() {
        return ActorRef::DeletedUser;
    }
    ActorRef::UnknownUser
}

fn parse_actor(actor: &Value) -> ActorRef {
    if let Some(user) = actor.get("user") {
        return parse_user(user);
    }
    if let Some(person_name) = actor
        .pointer("/impersonation/impersonatedUser/knownUser/personName")
        .and_then(Value::as_str)
    {
        return ActorRef::Impersonation {
            person_name: person_name.to_string(),
        };
    }
    if actor.get("anonymous").is_some() {
        return ActorRef::Anonymous;
    }
    if actor.get("administrator").is_some() {
        return ActorRef::Administrator;
    }
    if actor.get("system").is_some() {
        return ActorRef::System;
    }
    ActorRef::Unrecognized
}
