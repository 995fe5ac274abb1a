//! Scripted ImageDetector
//!
//! Returns canned predictions per file name; files without a script get no
//! detections.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vsync::types::{DetectionError, ImageDetector, NormalizedBox, RawPrediction, RemoteError};

/// Build a raw prediction
pub fn prediction(label: &str, confidence: f64, left: f64, top: f64, width: f64, height: f64) -> RawPrediction {
    RawPrediction {
        label: label.to_string(),
        confidence,
        normalized_box: NormalizedBox {
            left,
            top,
            width,
            height,
        },
    }
}

#[derive(Default)]
pub struct ScriptedDetector {
    scripts: HashMap<String, Result<Vec<RawPrediction>, String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, predictions: Vec<RawPrediction>) -> Self {
        self.scripts.insert(file_name.to_string(), Ok(predictions));
        self
    }

    pub fn failing(mut self, file_name: &str, message: &str) -> Self {
        self.scripts
            .insert(file_name.to_string(), Err(message.to_string()));
        self
    }

    /// Sleep this long in every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ImageDetector for ScriptedDetector {
    async fn detect(&self, image_path: &Path) -> Result<Vec<RawPrediction>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        match self.scripts.get(file_name) {
            Some(Ok(predictions)) => Ok(predictions.clone()),
            Some(Err(message)) => Err(RemoteError::Api(500, message.clone()).into()),
            None => Ok(Vec::new()),
        }
    }
}
