//! Local mirrors of remote-owned state: tags, upload units and training
//! iterations. Always advisory; each run refetches before use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Remote-assigned tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub Uuid);

/// Remote-assigned training iteration identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IterationId(pub Uuid);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label name → remote tag id
///
/// Seeded from the live tag listing and only ever grown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTagMap {
    tags: BTreeMap<String, TagId>,
}

impl RemoteTagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tag; an existing entry for `name` is kept
    pub fn insert(&mut self, name: impl Into<String>, id: TagId) {
        self.tags.entry(name.into()).or_insert(id);
    }

    pub fn get(&self, name: &str) -> Option<TagId> {
        self.tags.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<(String, TagId)> for RemoteTagMap {
    fn from_iter<I: IntoIterator<Item = (String, TagId)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, id) in iter {
            map.insert(name, id);
        }
        map
    }
}

/// Region in remote wire format, coordinates normalized to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub tag_id: TagId,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// One image ready for upload: file name plus its tagged regions
#[derive(Debug, Clone, PartialEq)]
pub struct UploadUnit {
    pub file_name: String,
    pub regions: Vec<Region>,
}

/// Training iteration status as reported remotely
///
/// Unrecognized status strings are treated as `Requested` (still pending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IterationStatus {
    Requested,
    Training,
    Completed,
    Failed,
    Canceled,
}

impl IterationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IterationStatus::Requested => "Requested",
            IterationStatus::Training => "Training",
            IterationStatus::Completed => "Completed",
            IterationStatus::Failed => "Failed",
            IterationStatus::Canceled => "Canceled",
        }
    }
}

impl From<String> for IterationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Training" => IterationStatus::Training,
            "Completed" => IterationStatus::Completed,
            "Failed" => IterationStatus::Failed,
            "Canceled" | "Cancelled" => IterationStatus::Canceled,
            _ => IterationStatus::Requested,
        }
    }
}

impl From<IterationStatus> for String {
    fn from(status: IterationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trained (or training) model snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingIteration {
    pub id: IterationId,
    pub name: String,
    pub status: IterationStatus,
    #[serde(default)]
    pub publish_name: Option<String>,
    /// RFC 3339 timestamp of the last remote modification
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl TrainingIteration {
    pub fn last_modified_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.last_modified.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}

/// How the poll stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingOutcome {
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

impl TrainingOutcome {
    pub fn is_success(self) -> bool {
        self == TrainingOutcome::Completed
    }
}

impl fmt::Display for TrainingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TrainingOutcome::Completed => "completed",
            TrainingOutcome::Failed => "failed",
            TrainingOutcome::Canceled => "canceled",
            TrainingOutcome::TimedOut => "timed out",
        };
        f.write_str(text)
    }
}
