//! Annotation document: the interchange format between ingestion, diffing
//! and upload, persisted as JSON between runs.
//!
//! A document is only ever constructed through [`AnnotationDocument::new`],
//! [`DocumentBuilder::build`] or [`AnnotationDocument::load`], all of which
//! check the structural invariants:
//! - image ids and file names are unique
//! - annotation ids are unique
//! - every annotation references an existing image and category
//! - every bbox lies inside its image

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use super::label_schema::{CategoryId, LabelDefinition};
use crate::error::{SyncError, SyncResult};

/// Slack allowed when checking bbox bounds, to absorb float rounding of
/// normalized coordinates that touch the image edge.
const BOUNDS_EPSILON: f64 = 1e-6;

/// Image id, unique within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

/// Annotation id, unique within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One source image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    /// Join key against the remote store
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// Bounding box in absolute pixels, persisted as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether the box lies inside a `width` × `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (w, h) = (f64::from(width), f64::from(height));
        let eps_x = BOUNDS_EPSILON * w.max(1.0);
        let eps_y = BOUNDS_EPSILON * h.max(1.0);

        self.x >= -eps_x
            && self.y >= -eps_y
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= w + eps_x
            && self.y + self.height <= h + eps_y
    }

    /// The part of the box that lies inside a `width` × `height` image
    ///
    /// A box entirely outside the image collapses to zero size on the
    /// nearest edge.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        let x0 = self.x.clamp(0.0, w);
        let y0 = self.y.clamp(0.0, h);
        let x1 = (self.x + self.width.max(0.0)).clamp(x0, w);
        let y1 = (self.y + self.height.max(0.0)).clamp(y0, h);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// One retained detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: BoundingBox,
    pub area: f64,
    #[serde(alias = "score")]
    pub confidence: f64,
}

/// Images, their retained detections and the category definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    images: Vec<ImageRecord>,
    #[serde(default)]
    annotations: Vec<AnnotationRecord>,
    categories: Vec<LabelDefinition>,
}

impl AnnotationDocument {
    /// Build a document, enforcing the structural invariants
    pub fn new(
        images: Vec<ImageRecord>,
        annotations: Vec<AnnotationRecord>,
        categories: Vec<LabelDefinition>,
    ) -> SyncResult<Self> {
        let document = Self {
            images,
            annotations,
            categories,
        };
        document.validate()?;
        Ok(document)
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn annotations(&self) -> &[AnnotationRecord] {
        &self.annotations
    }

    pub fn categories(&self) -> &[LabelDefinition] {
        &self.categories
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&LabelDefinition> {
        self.categories.iter().find(|c| c.category_id == id)
    }

    /// Check every structural invariant
    pub fn validate(&self) -> SyncResult<()> {
        let mut image_sizes: HashMap<ImageId, (u32, u32)> = HashMap::new();
        let mut file_names = HashSet::new();

        for image in &self.images {
            if image.width == 0 || image.height == 0 {
                return Err(SyncError::Document(format!(
                    "image {} ({}) has zero width or height",
                    image.id, image.file_name
                )));
            }
            if image_sizes
                .insert(image.id, (image.width, image.height))
                .is_some()
            {
                return Err(SyncError::Document(format!(
                    "duplicate image id {}",
                    image.id
                )));
            }
            if !file_names.insert(image.file_name.as_str()) {
                return Err(SyncError::Document(format!(
                    "duplicate file name '{}'",
                    image.file_name
                )));
            }
        }

        let category_ids: HashSet<CategoryId> =
            self.categories.iter().map(|c| c.category_id).collect();
        if category_ids.len() != self.categories.len() {
            return Err(SyncError::Document("duplicate category id".to_string()));
        }

        let mut annotation_ids = HashSet::new();
        for ann in &self.annotations {
            if !annotation_ids.insert(ann.id) {
                return Err(SyncError::Document(format!(
                    "duplicate annotation id {}",
                    ann.id
                )));
            }
            let Some(&(width, height)) = image_sizes.get(&ann.image_id) else {
                return Err(SyncError::Document(format!(
                    "annotation {} references unknown image {}",
                    ann.id, ann.image_id
                )));
            };
            if !category_ids.contains(&ann.category_id) {
                return Err(SyncError::Document(format!(
                    "annotation {} references unknown category {}",
                    ann.id, ann.category_id
                )));
            }
            if !ann.bbox.fits_within(width, height) {
                return Err(SyncError::Document(format!(
                    "annotation {} bbox {:?} outside {}x{} image {}",
                    ann.id,
                    <[f64; 4]>::from(ann.bbox),
                    width,
                    height,
                    ann.image_id
                )));
            }
        }

        Ok(())
    }

    /// Subset keeping only images accepted by `keep`, their annotations and
    /// all categories. The result satisfies the invariants by construction.
    pub fn retain_images<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&ImageRecord) -> bool,
    {
        let images: Vec<ImageRecord> = self.images.iter().filter(|img| keep(img)).cloned().collect();
        let kept: HashSet<ImageId> = images.iter().map(|img| img.id).collect();
        let annotations = self
            .annotations
            .iter()
            .filter(|a| kept.contains(&a.image_id))
            .cloned()
            .collect();

        Self {
            images,
            annotations,
            categories: self.categories.clone(),
        }
    }

    /// Parse from JSON text and validate
    ///
    /// Boxes running past their image are clipped to it and their area
    /// recomputed, so documents written by other tools still load.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let mut document: Self = serde_json::from_str(json)?;
        document.clip_boxes();
        document.validate()?;
        Ok(document)
    }

    fn clip_boxes(&mut self) {
        let image_sizes: HashMap<ImageId, (u32, u32)> = self
            .images
            .iter()
            .map(|img| (img.id, (img.width, img.height)))
            .collect();

        for ann in &mut self.annotations {
            let Some(&(width, height)) = image_sizes.get(&ann.image_id) else {
                continue;
            };
            if ann.bbox.fits_within(width, height) {
                continue;
            }
            warn!(
                annotation = %ann.id,
                image = %ann.image_id,
                "Clipping bbox {:?} to {}x{} image",
                <[f64; 4]>::from(ann.bbox),
                width,
                height
            );
            ann.bbox = ann.bbox.clamp_to(width, height);
            ann.area = ann.bbox.area();
        }
    }

    /// Serialize to pretty JSON (non-ASCII label names written as-is)
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a persisted document
    pub fn load(path: &Path) -> SyncResult<Self> {
        debug!("Loading annotation document from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_json(&content)?;
        info!(
            images = document.images.len(),
            annotations = document.annotations.len(),
            "Loaded annotation document {}",
            path.display()
        );
        Ok(document)
    }

    /// Persist the document, creating parent directories as needed
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(
            images = self.images.len(),
            annotations = self.annotations.len(),
            "Saved annotation document to {}",
            path.display()
        );
        Ok(())
    }
}

/// Incremental document construction used by ingestion
///
/// Annotation ids increase monotonically across the whole document, starting
/// at 1, regardless of which image they belong to.
#[derive(Debug)]
pub struct DocumentBuilder {
    images: Vec<ImageRecord>,
    annotations: Vec<AnnotationRecord>,
    categories: Vec<LabelDefinition>,
    next_annotation_id: u64,
}

impl DocumentBuilder {
    pub fn new(categories: Vec<LabelDefinition>) -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            categories,
            next_annotation_id: 1,
        }
    }

    pub fn push_image(&mut self, image: ImageRecord) {
        self.images.push(image);
    }

    /// Append an annotation, computing its area and assigning the next id
    pub fn push_annotation(
        &mut self,
        image_id: ImageId,
        category_id: CategoryId,
        bbox: BoundingBox,
        confidence: f64,
    ) -> AnnotationId {
        let id = AnnotationId(self.next_annotation_id);
        self.next_annotation_id += 1;
        self.annotations.push(AnnotationRecord {
            id,
            image_id,
            category_id,
            bbox,
            area: bbox.area(),
            confidence,
        });
        id
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn build(self) -> SyncResult<AnnotationDocument> {
        AnnotationDocument::new(self.images, self.annotations, self.categories)
    }
}
