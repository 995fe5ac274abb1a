//! Remote state diffing
//!
//! The remote store is the single source of truth for what has been
//! uploaded. The differ lists it in full and filters the local document
//! down to images the remote side does not know by file name.

use std::collections::HashSet;

use crate::error::{SyncError, SyncResult};
use crate::models::AnnotationDocument;
use crate::types::RemoteVisionService;

/// File names of every image already stored remotely
///
/// Pages until the service returns an empty page. Any failed page aborts the
/// listing: a partial set would make already-uploaded images look new.
pub async fn existing(
    remote: &dyn RemoteVisionService,
    page_size: usize,
) -> SyncResult<HashSet<String>> {
    let take = page_size.max(1);
    let mut names = HashSet::new();
    let mut skip = 0;

    loop {
        let page = remote
            .list_images(take, skip)
            .await
            .map_err(|e| SyncError::remote(format!("list images (skip {skip})"), e))?;

        if page.is_empty() {
            break;
        }

        skip += page.len();
        names.extend(page.into_iter().filter_map(|img| img.name));
    }

    tracing::info!(
        project = %remote.project_id(),
        listed = skip,
        named = names.len(),
        "Fetched remote image listing"
    );
    Ok(names)
}

/// Local images whose file name the remote side does not hold yet
pub fn delta(local: &AnnotationDocument, existing: &HashSet<String>) -> AnnotationDocument {
    local.retain_images(|img| !existing.contains(&img.file_name))
}

/// A delta without annotations is not worth uploading
pub fn is_noop(delta: &AnnotationDocument) -> bool {
    delta.annotations().is_empty()
}
