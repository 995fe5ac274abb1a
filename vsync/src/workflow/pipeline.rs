//! Run orchestration
//!
//! Stages run strictly in sequence, each on the committed result of the one
//! before:
//! - **Prediction**: validate schema → resolve detector → ingest → save
//! - **Upload**: load → diff → sync tags → upload → train → poll → publish
//!
//! Read-side and validation failures abort the run with an error. Per-item
//! write failures are recorded in the [`RunReport`] and the run continues.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{AnnotationDocument, RunReport};
use crate::services::image_source::{latest_dataset, DatasetPaths, ImageSource};
use crate::services::prediction_client::{resolve_publish_name, PredictionClient};
use crate::services::training_controller::TrainingController;
use crate::services::{
    batch_uploader, prediction_ingestor, schema_validator, state_differ,
    CustomVisionTrainingClient,
};
use crate::types::{ImageDetector, RemoteVisionService};

/// Pipeline bound to one configuration and its two remote projects
pub struct SyncPipeline {
    config: SyncConfig,
    /// Project validated against the label schema and used for detection
    prediction_remote: Arc<dyn RemoteVisionService>,
    /// Project receiving uploads and training
    upload_remote: Arc<dyn RemoteVisionService>,
    /// Fixed detector; when absent one is resolved from the latest
    /// published iteration on every prediction run
    detector: Option<Arc<dyn ImageDetector>>,
}

impl SyncPipeline {
    /// Pipeline talking to the configured Custom Vision projects
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        let prediction_remote =
            CustomVisionTrainingClient::new(&config.training, config.prediction_project_id.clone())
                .map_err(|e| SyncError::remote("create prediction project client", e))?;
        let upload_remote =
            CustomVisionTrainingClient::new(&config.training, config.upload_project_id.clone())
                .map_err(|e| SyncError::remote("create upload project client", e))?;

        Ok(Self::with_services(
            config,
            Arc::new(prediction_remote),
            Arc::new(upload_remote),
        ))
    }

    /// Pipeline over caller-supplied remote services
    pub fn with_services(
        config: SyncConfig,
        prediction_remote: Arc<dyn RemoteVisionService>,
        upload_remote: Arc<dyn RemoteVisionService>,
    ) -> Self {
        Self {
            config,
            prediction_remote,
            upload_remote,
            detector: None,
        }
    }

    /// Use a fixed detector instead of resolving the published iteration
    pub fn with_detector(mut self, detector: Arc<dyn ImageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Detect objects in `image_folder` and write the document to `output`
    pub async fn run_prediction(&self, image_folder: &Path, output: &Path) -> SyncResult<RunReport> {
        let mut report = RunReport::new();
        self.predict(image_folder, output, &mut report).await?;
        report.finish();
        info!("Prediction run finished: {}", report.summary());
        Ok(report)
    }

    /// Upload the new part of the document at `document` and train on it
    pub async fn run_upload(&self, image_folder: &Path, document: &Path) -> SyncResult<RunReport> {
        let mut report = RunReport::new();
        self.upload(image_folder, document, &mut report).await?;
        report.finish();
        info!("Upload run finished: {}", report.summary());
        Ok(report)
    }

    /// Prediction then upload on the newest dataset under `data_folder`
    pub async fn run_full(&self, data_folder: &Path) -> SyncResult<RunReport> {
        let dataset = self.locate_dataset(data_folder)?;
        info!(dataset = %dataset.root.display(), "Starting full run");

        let mut report = RunReport::new();
        self.predict(&dataset.image_folder, &dataset.document_path, &mut report)
            .await?;
        self.upload(&dataset.image_folder, &dataset.document_path, &mut report)
            .await?;
        report.finish();

        info!(
            duration_secs = report.duration_seconds().unwrap_or(0),
            issues = report.issues.len(),
            "Full run finished: {}",
            report.summary()
        );
        Ok(report)
    }

    /// Newest dataset folder, or `NotFound` if there is none
    pub fn locate_dataset(&self, data_folder: &Path) -> SyncResult<DatasetPaths> {
        latest_dataset(data_folder, &self.config.pipeline.dataset_prefix)?.ok_or_else(|| {
            SyncError::Common(vsync_common::Error::NotFound(format!(
                "no '{}*' dataset in {}",
                self.config.pipeline.dataset_prefix,
                data_folder.display()
            )))
        })
    }

    async fn predict(
        &self,
        image_folder: &Path,
        output: &Path,
        report: &mut RunReport,
    ) -> SyncResult<()> {
        let schema = &self.config.labels;

        // Never leave a previous run's document behind for the upload stage
        if output.exists() {
            info!(path = %output.display(), "Removing stale annotation document");
            std::fs::remove_file(output)?;
        }

        schema_validator::validate_remote(self.prediction_remote.as_ref(), schema).await?;

        let detector = self.detector().await?;

        let scan = ImageSource::new(image_folder).scan()?;
        report.images_scanned = scan.images.len() + scan.unreadable.len();
        for (file_name, reason) in scan.unreadable {
            report.record(&SyncError::ImageSkipped { file_name, reason });
        }

        let outcome = prediction_ingestor::ingest(&scan.images, detector.as_ref(), schema).await?;
        report.images_ingested = outcome.document.images().len();
        report.annotations_retained = outcome.document.annotations().len();
        report.record_all(&outcome.skipped);

        outcome.document.save(output)?;
        info!(path = %output.display(), "Annotation document saved");
        Ok(())
    }

    async fn detector(&self) -> SyncResult<Arc<dyn ImageDetector>> {
        if let Some(detector) = &self.detector {
            return Ok(Arc::clone(detector));
        }

        let publish_name = resolve_publish_name(self.prediction_remote.as_ref()).await?;
        let client = PredictionClient::new(
            &self.config.prediction,
            &self.config.prediction_project_id,
            &publish_name,
        )
        .map_err(|e| SyncError::remote("create prediction client", e))?;
        Ok(Arc::new(client))
    }

    async fn upload(
        &self,
        image_folder: &Path,
        document: &Path,
        report: &mut RunReport,
    ) -> SyncResult<()> {
        let settings = &self.config.pipeline;
        let remote = self.upload_remote.as_ref();

        let local = AnnotationDocument::load(document)?;

        let existing = state_differ::existing(remote, settings.page_size).await?;
        report.remote_images_known = existing.len();

        let delta = state_differ::delta(&local, &existing);
        report.delta_images = delta.images().len();
        report.delta_annotations = delta.annotations().len();
        info!(
            local = local.images().len(),
            new = delta.images().len(),
            annotations = delta.annotations().len(),
            "Computed upload delta"
        );

        if delta.images().is_empty() {
            info!("No new images, skipping upload and training");
            return Ok(());
        }
        if state_differ::is_noop(&delta) {
            warn!("New images carry no annotations, skipping upload and training");
            return Ok(());
        }

        let tag_names: Vec<&str> = delta.categories().iter().map(|c| c.name.as_str()).collect();
        let tags = batch_uploader::sync_tags(remote, tag_names).await?;
        report.tags_created = tags.created;
        report.record_all(&tags.failures);

        let units = batch_uploader::to_upload_units(&delta, &tags.tags);
        report.upload_units = units.len();
        if units.is_empty() {
            warn!("No image has a mappable region, skipping upload and training");
            return Ok(());
        }

        let uploaded =
            batch_uploader::upload(remote, &units, image_folder, settings.batch_size).await;
        report.images_sent = uploaded.sent;
        report.images_missing_locally = uploaded.missing_locally;
        report.batches_failed = uploaded.batches_failed;
        report.record_all(&uploaded.failures);

        if uploaded.sent == 0 {
            warn!("Nothing was uploaded, skipping training");
            return Ok(());
        }

        let controller = TrainingController::new(
            remote,
            settings.poll,
            settings.advanced_training,
            self.config.prediction_resource_id.clone(),
        );
        let training = controller.run(&settings.iteration_prefix).await;
        report.iteration_name = Some(training.iteration_name);
        report.training_outcome = training.outcome;
        report.published = training.published;
        report.record_all(&training.issues);

        Ok(())
    }
}
