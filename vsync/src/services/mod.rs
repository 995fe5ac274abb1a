//! Pipeline stages and the clients they talk to

pub mod batch_uploader;
pub mod custom_vision_client;
pub mod image_source;
pub mod prediction_client;
pub mod prediction_ingestor;
pub mod schema_validator;
pub mod state_differ;
pub mod training_controller;

pub use batch_uploader::{TagSyncOutcome, UploadOutcome};
pub use custom_vision_client::CustomVisionTrainingClient;
pub use image_source::{latest_dataset, DatasetPaths, ImageSource, ScanResult, SourceError, SourceImage};
pub use prediction_client::PredictionClient;
pub use prediction_ingestor::IngestOutcome;
pub use training_controller::{NextAction, TrainingController, TrainingRun};
