//! Data models for the sync pipeline

pub mod annotation;
pub mod label_schema;
pub mod remote;
pub mod run_report;

pub use annotation::{
    AnnotationDocument, AnnotationId, AnnotationRecord, BoundingBox, DocumentBuilder, ImageId,
    ImageRecord,
};
pub use label_schema::{CategoryId, LabelDefinition, LabelSchema};
pub use remote::{
    IterationId, IterationStatus, Region, RemoteTagMap, TagId, TrainingIteration,
    TrainingOutcome, UploadUnit,
};
pub use run_report::{IssueSeverity, RunIssue, RunReport};
