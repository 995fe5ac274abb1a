//! Run results and isolated failures
//!
//! Per-item failures (one image, one batch, one tag) never abort a run; they
//! are collected here with their severity so the end-of-run summary can
//! report them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::remote::TrainingOutcome;
use crate::error::SyncError;

/// Severity of a recorded issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Stage incomplete, data still synced (training/publish)
    Warning,
    /// One item skipped, run continues
    Skip,
    /// Run aborted
    Critical,
}

/// One failure recorded during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl RunIssue {
    pub fn from_error(error: &SyncError) -> Self {
        let severity = match error {
            SyncError::TrainingIncomplete { .. } => IssueSeverity::Warning,
            e if e.is_fatal() => IssueSeverity::Critical,
            _ => IssueSeverity::Skip,
        };
        Self {
            severity,
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Counts and issues for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // Ingestion
    pub images_scanned: usize,
    pub images_ingested: usize,
    pub annotations_retained: usize,

    // Diff
    pub remote_images_known: usize,
    pub delta_images: usize,
    pub delta_annotations: usize,

    // Upload
    pub tags_created: usize,
    pub upload_units: usize,
    pub images_sent: usize,
    pub images_missing_locally: usize,
    pub batches_failed: usize,

    // Training
    pub iteration_name: Option<String>,
    pub training_outcome: Option<TrainingOutcome>,
    pub published: bool,

    pub issues: Vec<RunIssue>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            images_scanned: 0,
            images_ingested: 0,
            annotations_retained: 0,
            remote_images_known: 0,
            delta_images: 0,
            delta_annotations: 0,
            tags_created: 0,
            upload_units: 0,
            images_sent: 0,
            images_missing_locally: 0,
            batches_failed: 0,
            iteration_name: None,
            training_outcome: None,
            published: false,
            issues: Vec::new(),
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: &SyncError) {
        self.issues.push(RunIssue::from_error(error));
    }

    pub fn record_all<'a>(&mut self, errors: impl IntoIterator<Item = &'a SyncError>) {
        for error in errors {
            self.record(error);
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count_by_severity(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
    }

    /// One-line summary for the end-of-run log
    pub fn summary(&self) -> String {
        format!(
            "{} images ingested ({} annotations), {} new, {} sent, {} batches failed, training {}",
            self.images_ingested,
            self.annotations_retained,
            self.delta_images,
            self.images_sent,
            self.batches_failed,
            self.training_outcome
                .map(|o| o.to_string())
                .unwrap_or_else(|| "not run".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_severity_mapping() {
        let mut report = RunReport::new();
        report.record(&SyncError::PartialWriteFailure {
            item: "batch 1".into(),
            reason: "HTTP 500".into(),
        });
        report.record(&SyncError::TrainingIncomplete {
            iteration: "Iteration-4".into(),
            outcome: TrainingOutcome::Failed,
        });
        report.record(&SyncError::Document("bad".into()));

        assert_eq!(report.count_by_severity(IssueSeverity::Skip), 1);
        assert_eq!(report.count_by_severity(IssueSeverity::Warning), 1);
        assert_eq!(report.count_by_severity(IssueSeverity::Critical), 1);
    }

    #[test]
    fn test_summary_before_training() {
        let report = RunReport::new();
        assert!(report.summary().ends_with("training not run"));
        assert!(report.duration_seconds().is_none());
    }

    #[test]
    fn test_default_report_is_empty() {
        let report = RunReport::default();
        assert_eq!(report.images_sent, 0);
        assert!(report.finished_at.is_none());
        assert!(report.training_outcome.is_none());
        assert!(!report.published);
        assert!(report.issues.is_empty());
    }
}
