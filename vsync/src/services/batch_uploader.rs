//! Tag sync and batched image upload
//!
//! Write-side failures stay local: a tag that cannot be created only loses
//! its regions, and a failed batch only delays its images to the next run
//! (the differ will find them missing again).

use base64::{engine::general_purpose, Engine as _};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::models::{AnnotationDocument, ImageId, Region, RemoteTagMap, UploadUnit};
use crate::types::{ImageFileEntry, RemoteVisionService};

/// Tag map plus the tags that could not be created
#[derive(Debug)]
pub struct TagSyncOutcome {
    pub tags: RemoteTagMap,
    pub created: usize,
    /// One `PartialWriteFailure` per tag that could not be created
    pub failures: Vec<SyncError>,
}

/// Per-run upload counters
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// Images in batches the service accepted
    pub sent: usize,
    pub missing_locally: usize,
    pub batches_failed: usize,
    /// One `PartialWriteFailure` per failed batch
    pub failures: Vec<SyncError>,
}

/// Make sure every required label exists as a remote tag
///
/// The listing itself must succeed; creating an individual tag may fail.
pub async fn sync_tags<'a, I>(
    remote: &dyn RemoteVisionService,
    required_names: I,
) -> SyncResult<TagSyncOutcome>
where
    I: IntoIterator<Item = &'a str>,
{
    let listed = remote
        .list_tags()
        .await
        .map_err(|e| SyncError::remote("list tags", e))?;

    let mut tags: RemoteTagMap = listed.into_iter().map(|t| (t.name, t.id)).collect();
    let mut created = 0;
    let mut failures = Vec::new();

    for name in required_names {
        if tags.contains(name) {
            continue;
        }
        match remote.create_tag(name).await {
            Ok(tag) => {
                tracing::info!(tag = %name, id = %tag.id, "Created remote tag");
                tags.insert(name, tag.id);
                created += 1;
            }
            Err(e) => {
                tracing::error!(tag = %name, "Failed to create remote tag: {}", e);
                failures.push(SyncError::PartialWriteFailure {
                    item: format!("tag '{name}'"),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(TagSyncOutcome {
        tags,
        created,
        failures,
    })
}

/// Convert a delta to upload units, one per image with at least one region
///
/// Regions are normalized by the image size. Annotations whose category has
/// no label or no remote tag are dropped.
pub fn to_upload_units(delta: &AnnotationDocument, tag_map: &RemoteTagMap) -> Vec<UploadUnit> {
    let mut regions_by_image: BTreeMap<ImageId, Vec<Region>> = BTreeMap::new();
    let mut dropped = 0usize;

    for ann in delta.annotations() {
        let (Some(image), Some(category)) = (delta.image(ann.image_id), delta.category(ann.category_id))
        else {
            dropped += 1;
            continue;
        };
        let Some(tag_id) = tag_map.get(&category.name) else {
            dropped += 1;
            continue;
        };

        let (w, h) = (f64::from(image.width), f64::from(image.height));
        regions_by_image.entry(image.id).or_default().push(Region {
            tag_id,
            left: ann.bbox.x / w,
            top: ann.bbox.y / h,
            width: ann.bbox.width / w,
            height: ann.bbox.height / h,
        });
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} annotations without a remote tag", dropped);
    }

    delta
        .images()
        .iter()
        .filter_map(|image| {
            regions_by_image.remove(&image.id).map(|regions| UploadUnit {
                file_name: image.file_name.clone(),
                regions,
            })
        })
        .collect()
}

/// Send units in batches of at most `batch_size` images
///
/// Files no longer present in `image_folder` are skipped. A batch that fails
/// is logged and not retried.
pub async fn upload(
    remote: &dyn RemoteVisionService,
    units: &[UploadUnit],
    image_folder: &Path,
    batch_size: usize,
) -> UploadOutcome {
    let mut outcome = UploadOutcome::default();
    let mut entries = Vec::with_capacity(units.len());

    for unit in units {
        let path = image_folder.join(&unit.file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => entries.push(ImageFileEntry {
                name: unit.file_name.clone(),
                contents: general_purpose::STANDARD.encode(&bytes),
                regions: unit.regions.clone(),
            }),
            Err(e) => {
                tracing::warn!(file_name = %unit.file_name, "Image missing locally, not uploaded: {}", e);
                outcome.missing_locally += 1;
            }
        }
    }

    let batch_size = batch_size.max(1);
    let total_batches = entries.len().div_ceil(batch_size);
    tracing::info!(
        images = entries.len(),
        batches = total_batches,
        project = %remote.project_id(),
        "Uploading images"
    );

    for (index, batch) in entries.chunks(batch_size).enumerate() {
        let batch_no = index + 1;
        match remote.upload_images(batch).await {
            Ok(summary) => {
                for result in summary.images.iter().filter(|r| !r.is_ok()) {
                    tracing::warn!(
                        batch = batch_no,
                        source = result.source_url.as_deref().unwrap_or("?"),
                        status = %result.status,
                        "Image rejected by remote service"
                    );
                }
                if !summary.is_batch_successful {
                    tracing::warn!(batch = batch_no, "Batch reported as not fully successful");
                }
                outcome.sent += batch.len();
                tracing::info!(batch = batch_no, of = total_batches, images = batch.len(), "Batch uploaded");
            }
            Err(e) => {
                tracing::error!(batch = batch_no, of = total_batches, "Batch upload failed: {}", e);
                outcome.batches_failed += 1;
                outcome.failures.push(SyncError::PartialWriteFailure {
                    item: format!("upload batch {batch_no}/{total_batches}"),
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}
