//! Core types and trait definitions at the external boundaries
//!
//! Two collaborators sit outside the pipeline:
//! - [`RemoteVisionService`]: the remote training service, bound to one project
//! - [`ImageDetector`]: produces raw detections for one local image
//!
//! Both are traits so the pipeline can run against the HTTP clients in
//! production and against in-memory doubles in tests.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{IterationId, Region, TagId, TrainingIteration};

// ============================================================================
// Errors
// ============================================================================

/// Remote call failure
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Per-image detection failure
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Cannot read image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// ============================================================================
// Wire types
// ============================================================================

/// Tag as listed by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: TagId,
    pub name: String,
}

/// Image as listed by the remote service
///
/// Only the original file name matters for diffing; entries without one
/// cannot be matched and are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One image in an upload batch request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFileEntry {
    pub name: String,
    /// Base64-encoded file bytes
    pub contents: String,
    pub regions: Vec<Region>,
}

/// Upload batch request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFileBatch {
    pub images: Vec<ImageFileEntry>,
}

/// Per-image result in an upload batch response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCreateResult {
    #[serde(default)]
    pub source_url: Option<String>,
    pub status: String,
}

impl ImageCreateResult {
    /// `OK` and `OKDuplicate` both mean the image is now stored remotely
    pub fn is_ok(&self) -> bool {
        self.status == "OK" || self.status == "OKDuplicate"
    }
}

/// Upload batch response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatchSummary {
    #[serde(default = "default_true")]
    pub is_batch_successful: bool,
    #[serde(default)]
    pub images: Vec<ImageCreateResult>,
}

fn default_true() -> bool {
    true
}

/// Box with coordinates normalized to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// One raw detection before thresholding
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub normalized_box: NormalizedBox,
}

// ============================================================================
// Traits
// ============================================================================

/// Remote vision training service, bound to one project
///
/// Every call is a single request; failures surface as [`RemoteError`] and
/// callers decide whether they are fatal.
#[async_trait::async_trait]
pub trait RemoteVisionService: Send + Sync {
    /// Project this client is bound to (for logging)
    fn project_id(&self) -> &str;

    async fn list_tags(&self) -> Result<Vec<RemoteTag>, RemoteError>;

    async fn create_tag(&self, name: &str) -> Result<RemoteTag, RemoteError>;

    /// One page of stored images
    async fn list_images(&self, take: usize, skip: usize) -> Result<Vec<RemoteImage>, RemoteError>;

    /// Store a batch of images with their regions
    async fn upload_images(
        &self,
        batch: &[ImageFileEntry],
    ) -> Result<UploadBatchSummary, RemoteError>;

    /// Queue a training run; returns the new iteration
    async fn train(&self, advanced: bool) -> Result<TrainingIteration, RemoteError>;

    async fn list_iterations(&self) -> Result<Vec<TrainingIteration>, RemoteError>;

    async fn get_iteration(&self, id: IterationId) -> Result<TrainingIteration, RemoteError>;

    /// Bind a completed iteration to a prediction resource under `publish_name`
    async fn publish_iteration(
        &self,
        id: IterationId,
        publish_name: &str,
        prediction_resource_id: &str,
    ) -> Result<(), RemoteError>;
}

/// Object detector for a single local image
#[async_trait::async_trait]
pub trait ImageDetector: Send + Sync {
    async fn detect(&self, image_path: &Path) -> Result<Vec<RawPrediction>, DetectionError>;
}
