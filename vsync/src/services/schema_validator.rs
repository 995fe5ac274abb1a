//! Label schema validation against the remote tag set
//!
//! Runs before any other stage. Category ids and thresholds are only
//! meaningful if the remote project exposes exactly the configured labels,
//! so any difference stops the pipeline before it writes anything.

use std::collections::BTreeSet;

use crate::error::{SyncError, SyncResult};
use crate::models::LabelSchema;
use crate::types::RemoteVisionService;

/// Compare a remote tag name set with the schema (order-insensitive)
///
/// `missing` holds schema labels the remote lacks; `extra` holds remote tags
/// the schema does not define.
pub fn validate(remote_tags: &BTreeSet<String>, schema: &LabelSchema) -> SyncResult<()> {
    let local = schema.names();

    if *remote_tags == local {
        return Ok(());
    }

    let missing: BTreeSet<String> = local.difference(remote_tags).cloned().collect();
    let extra: BTreeSet<String> = remote_tags.difference(&local).cloned().collect();

    if !missing.is_empty() {
        tracing::error!("Labels missing from remote project: {:?}", missing);
    }
    if !extra.is_empty() {
        tracing::error!("Remote tags not defined in label schema: {:?}", extra);
    }

    Err(SyncError::SchemaMismatch { missing, extra })
}

/// Fetch the remote tag listing and validate it
///
/// A listing failure is fatal: without the tag set there is nothing to
/// validate against.
pub async fn validate_remote(
    remote: &dyn RemoteVisionService,
    schema: &LabelSchema,
) -> SyncResult<()> {
    tracing::info!(project = %remote.project_id(), "Validating label schema against remote tags");

    let tags = remote
        .list_tags()
        .await
        .map_err(|e| SyncError::remote("list tags", e))?;
    let names: BTreeSet<String> = tags.into_iter().map(|t| t.name).collect();

    validate(&names, schema)?;
    tracing::info!("Label schema matches remote tags ({} labels)", schema.len());
    Ok(())
}
