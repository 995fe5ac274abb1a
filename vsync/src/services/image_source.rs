//! Local image source
//!
//! Enumerates the images an external acquisition step left in a folder and
//! reads their pixel dimensions. Also locates the newest dataset folder.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::SyncError;

/// Extensions accepted as images (compared case-insensitively)
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Image source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for SyncError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::PathNotFound(path) => {
                SyncError::Common(vsync_common::Error::NotFound(path.display().to_string()))
            }
            SourceError::NotADirectory(path) => SyncError::Common(
                vsync_common::Error::InvalidInput(format!("not a directory: {}", path.display())),
            ),
            SourceError::Io(e) => SyncError::Io(e),
        }
    }
}

/// One local image with its dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// Result of scanning an image folder
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Readable images in file-name order
    pub images: Vec<SourceImage>,
    /// Files with an image extension whose header could not be read
    pub unreadable: Vec<(String, String)>,
}

/// Folder of images
pub struct ImageSource {
    folder: PathBuf,
}

impl ImageSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// List images directly inside the folder (no recursion)
    pub fn scan(&self) -> Result<ScanResult, SourceError> {
        if !self.folder.exists() {
            return Err(SourceError::PathNotFound(self.folder.clone()));
        }
        if !self.folder.is_dir() {
            return Err(SourceError::NotADirectory(self.folder.clone()));
        }

        let mut candidates: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.folder)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry in {}: {}", self.folder.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !has_image_extension(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                candidates.push((name.to_string(), path.clone()));
            }
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut result = ScanResult::default();
        for (file_name, path) in candidates {
            match read_dimensions(&path) {
                Ok((width, height)) if width > 0 && height > 0 => {
                    result.images.push(SourceImage {
                        path,
                        file_name,
                        width,
                        height,
                    });
                }
                Ok(_) => {
                    tracing::warn!(file_name = %file_name, "Skipping zero-sized image");
                    result
                        .unreadable
                        .push((file_name, "zero width or height".to_string()));
                }
                Err(e) => {
                    tracing::warn!(file_name = %file_name, "Skipping unreadable image: {}", e);
                    result.unreadable.push((file_name, e.to_string()));
                }
            }
        }

        tracing::debug!(
            folder = %self.folder.display(),
            images = result.images.len(),
            unreadable = result.unreadable.len(),
            "Image folder scanned"
        );

        Ok(result)
    }
}

/// Pixel dimensions from the file header, sniffing the format from content
fn read_dimensions(path: &Path) -> Result<(u32, u32), image::ImageError> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Locations inside one crawled dataset folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub root: PathBuf,
    pub image_folder: PathBuf,
    pub document_path: PathBuf,
}

impl DatasetPaths {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            image_folder: root.join("thumbnails"),
            document_path: root.join("predictions.json"),
            root,
        }
    }
}

/// Newest dataset under `base`: greatest subdirectory name starting with `prefix`
///
/// Dataset folder names embed a sortable timestamp, so lexicographic order is
/// chronological order.
pub fn latest_dataset(base: &Path, prefix: &str) -> Result<Option<DatasetPaths>, SourceError> {
    if !base.exists() {
        return Ok(None);
    }

    let mut latest: Option<String> = None;
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(prefix) && latest.as_ref().map_or(true, |l| name > *l) {
            latest = Some(name);
        }
    }

    Ok(latest.map(|name| DatasetPaths::for_root(base.join(name))))
}
