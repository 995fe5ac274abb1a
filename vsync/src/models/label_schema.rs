//! Label schema: label name → category id → acceptance threshold
//!
//! Built once from configuration and shared read-only by every stage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use vsync_common::config::LabelEntry;

use crate::error::{SyncError, SyncResult};

/// Numeric category id (stable, positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u32);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One label the detector recognizes and the remote service trains against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    /// Category id
    #[serde(rename = "id")]
    pub category_id: CategoryId,
    /// Label name, matched exactly against remote tag names
    pub name: String,
    /// Minimum confidence (inclusive) for a detection to be kept
    #[serde(default)]
    pub threshold: f64,
}

impl LabelDefinition {
    pub fn new(name: impl Into<String>, category_id: u32, threshold: f64) -> Self {
        Self {
            category_id: CategoryId(category_id),
            name: name.into(),
            threshold,
        }
    }
}

/// Ordered, validated set of label definitions
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSchema {
    labels: Vec<LabelDefinition>,
}

impl LabelSchema {
    /// Build a schema, rejecting duplicate names/ids and out-of-range thresholds
    pub fn new(labels: Vec<LabelDefinition>) -> SyncResult<Self> {
        validate_labels(&labels)?;
        Ok(Self { labels })
    }

    /// Compiled-in schema used when the config file does not override it
    pub fn default_schema() -> Self {
        Self {
            labels: vec![
                LabelDefinition::new("브랜드/로고", 1, 0.8),
                LabelDefinition::new("인물", 2, 0.8),
                LabelDefinition::new("캐릭터", 3, 0.7),
                LabelDefinition::new("텍스트", 4, 0.8),
            ],
        }
    }

    /// Build from the TOML `[[labels]]` array
    pub fn from_entries(entries: &[LabelEntry]) -> SyncResult<Self> {
        Self::new(
            entries
                .iter()
                .map(|e| LabelDefinition::new(e.name.clone(), e.id, e.threshold))
                .collect(),
        )
    }

    /// Labels in configuration order
    pub fn labels(&self) -> &[LabelDefinition] {
        &self.labels
    }

    /// Label names as a set (order-insensitive comparison with remote tags)
    pub fn names(&self) -> BTreeSet<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&LabelDefinition> {
        self.labels.iter().find(|l| l.name == name)
    }

    /// Label definition if `label` is known and `confidence` meets its threshold
    pub fn accepts(&self, label: &str, confidence: f64) -> Option<&LabelDefinition> {
        self.get(label).filter(|def| confidence >= def.threshold)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn validate_labels(labels: &[LabelDefinition]) -> SyncResult<()> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for label in labels {
        if label.name.trim().is_empty() {
            return Err(invalid("label name must not be empty".to_string()));
        }
        if !names.insert(label.name.as_str()) {
            return Err(invalid(format!("duplicate label name '{}'", label.name)));
        }
        if label.category_id.0 == 0 {
            return Err(invalid(format!(
                "label '{}' has category id 0 (ids start at 1)",
                label.name
            )));
        }
        if !ids.insert(label.category_id) {
            return Err(invalid(format!(
                "duplicate category id {}",
                label.category_id
            )));
        }
        if !(0.0..=1.0).contains(&label.threshold) {
            return Err(invalid(format!(
                "label '{}' threshold {} outside [0, 1]",
                label.name, label.threshold
            )));
        }
    }

    Ok(())
}

fn invalid(message: String) -> SyncError {
    SyncError::Common(vsync_common::Error::InvalidInput(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = LabelSchema::default_schema();
        assert!(validate_labels(schema.labels()).is_ok());
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.get("캐릭터").unwrap().threshold, 0.7);
        assert_eq!(schema.labels()[3].category_id, CategoryId(4));
        assert_eq!(schema.labels()[3].name, "텍스트");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let schema = LabelSchema::new(vec![LabelDefinition::new("logo", 1, 0.8)]).unwrap();
        assert!(schema.accepts("logo", 0.8).is_some());
        assert!(schema.accepts("logo", 0.79999).is_none());
        assert!(schema.accepts("unknown", 1.0).is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_thresholds() {
        assert!(LabelSchema::new(vec![
            LabelDefinition::new("logo", 1, 0.8),
            LabelDefinition::new("logo", 2, 0.8),
        ])
        .is_err());
        assert!(LabelSchema::new(vec![
            LabelDefinition::new("logo", 1, 0.8),
            LabelDefinition::new("text", 1, 0.8),
        ])
        .is_err());
        assert!(LabelSchema::new(vec![LabelDefinition::new("logo", 0, 0.8)]).is_err());
        assert!(LabelSchema::new(vec![LabelDefinition::new("logo", 1, 1.2)]).is_err());
    }

    #[test]
    fn test_from_entries_keeps_order() {
        let entries = vec![
            LabelEntry { name: "text".into(), id: 2, threshold: 0.8 },
            LabelEntry { name: "logo".into(), id: 1, threshold: 0.8 },
        ];
        let schema = LabelSchema::from_entries(&entries).unwrap();
        assert_eq!(schema.labels()[0].name, "text");
        assert_eq!(schema.names().into_iter().collect::<Vec<_>>(), vec!["logo", "text"]);
    }
}
