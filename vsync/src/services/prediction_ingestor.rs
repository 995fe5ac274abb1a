//! Prediction ingestion
//!
//! Runs the detector over every source image, keeps the detections that
//! clear their label's threshold and converts them to absolute-pixel
//! annotations. A failing image is skipped on its own; the rest of the run
//! continues.

use crate::error::{SyncError, SyncResult};
use crate::models::{AnnotationDocument, BoundingBox, DocumentBuilder, ImageId, ImageRecord, LabelSchema};
use crate::services::image_source::SourceImage;
use crate::types::{ImageDetector, NormalizedBox, RawPrediction};

/// Ingestion output: the document plus the images that were skipped
#[derive(Debug)]
pub struct IngestOutcome {
    pub document: AnnotationDocument,
    /// One `ImageSkipped` per image whose detection failed
    pub skipped: Vec<SyncError>,
}

/// Scale a normalized box to image pixels (not clipped)
pub fn denormalize(b: &NormalizedBox, width: u32, height: u32) -> BoundingBox {
    let (w, h) = (f64::from(width), f64::from(height));
    BoundingBox {
        x: b.left * w,
        y: b.top * h,
        width: b.width * w,
        height: b.height * h,
    }
}

/// Detect, filter and convert every image in input order
///
/// Image ids follow the input position (first image is 1), so ids stay
/// stable even when an earlier image is skipped. Annotation ids run across
/// the whole document.
pub async fn ingest(
    images: &[SourceImage],
    detector: &dyn ImageDetector,
    schema: &LabelSchema,
) -> SyncResult<IngestOutcome> {
    tracing::info!("Ingesting predictions for {} images", images.len());

    let mut builder = DocumentBuilder::new(schema.labels().to_vec());
    let mut skipped = Vec::new();

    for (index, source) in images.iter().enumerate() {
        let image_id = ImageId(index as u64 + 1);

        let predictions = match detector.detect(&source.path).await {
            Ok(predictions) => predictions,
            Err(e) => {
                tracing::warn!(file_name = %source.file_name, "Detection failed, skipping image: {}", e);
                skipped.push(SyncError::ImageSkipped {
                    file_name: source.file_name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        builder.push_image(ImageRecord {
            id: image_id,
            file_name: source.file_name.clone(),
            width: source.width,
            height: source.height,
        });

        let retained = retain_predictions(&mut builder, image_id, source, &predictions, schema);
        tracing::debug!(
            file_name = %source.file_name,
            raw = predictions.len(),
            retained,
            "Image ingested"
        );
    }

    tracing::info!(
        images = builder.image_count(),
        annotations = builder.annotation_count(),
        skipped = skipped.len(),
        "Ingestion complete"
    );

    Ok(IngestOutcome {
        document: builder.build()?,
        skipped,
    })
}

fn retain_predictions(
    builder: &mut DocumentBuilder,
    image_id: ImageId,
    source: &SourceImage,
    predictions: &[RawPrediction],
    schema: &LabelSchema,
) -> usize {
    let mut retained = 0;
    for prediction in predictions {
        let Some(label) = schema.accepts(&prediction.label, prediction.confidence) else {
            continue;
        };
        let raw = denormalize(&prediction.normalized_box, source.width, source.height);
        let bbox = raw.clamp_to(source.width, source.height);
        if bbox != raw {
            tracing::debug!(
                file_name = %source.file_name,
                label = %prediction.label,
                "Clipped detection to image bounds"
            );
        }
        builder.push_annotation(image_id, label.category_id, bbox, prediction.confidence);
        retained += 1;
    }
    retained
}
