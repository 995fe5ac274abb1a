//! Prediction API client (object detection)
//!
//! Sends raw image bytes to a published iteration of the prediction project
//! and maps the response to [`RawPrediction`]s.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::Credentials;
use crate::error::{SyncError, SyncResult};
use crate::models::TrainingIteration;
use crate::types::{
    DetectionError, ImageDetector, NormalizedBox, RawPrediction, RemoteError,
    RemoteVisionService,
};

const API_PATH: &str = "customvision/v3.0/Prediction";
const USER_AGENT: &str = concat!("vsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<PredictionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionItem {
    tag_name: String,
    probability: f64,
    bounding_box: Option<NormalizedBox>,
}

/// Detection client bound to one published iteration
pub struct PredictionClient {
    http_client: reqwest::Client,
    detect_url: String,
    key: String,
}

impl PredictionClient {
    pub fn new(
        credentials: &Credentials,
        project_id: &str,
        publish_name: &str,
    ) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let mut detect_url = reqwest::Url::parse(&format!(
            "{}/{}/{}/detect/iterations/",
            credentials.endpoint.trim_end_matches('/'),
            API_PATH,
            project_id
        ))
        .map_err(|e| RemoteError::Parse(format!("invalid prediction endpoint: {}", e)))?;
        detect_url
            .path_segments_mut()
            .map_err(|_| RemoteError::Parse("prediction endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push(publish_name)
            .push("image");

        Ok(Self {
            http_client,
            detect_url: detect_url.to_string(),
            key: credentials.key.clone(),
        })
    }

    pub fn detect_url(&self) -> &str {
        &self.detect_url
    }
}

#[async_trait::async_trait]
impl ImageDetector for PredictionClient {
    async fn detect(&self, image_path: &Path) -> Result<Vec<RawPrediction>, DetectionError> {
        let bytes = tokio::fs::read(image_path).await?;

        let response = self
            .http_client
            .post(&self.detect_url)
            .header("Prediction-Key", &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(status.as_u16(), error_text).into());
        }

        let body: PredictionResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(body
            .predictions
            .into_iter()
            .filter_map(|p| {
                p.bounding_box.map(|normalized_box| RawPrediction {
                    label: p.tag_name,
                    confidence: p.probability,
                    normalized_box,
                })
            })
            .collect())
    }
}

/// Most recently modified published iteration
pub fn latest_published(iterations: &[TrainingIteration]) -> Option<&TrainingIteration> {
    iterations
        .iter()
        .filter(|it| it.publish_name.as_deref().is_some_and(|n| !n.is_empty()))
        .max_by(|a, b| {
            a.last_modified_at()
                .cmp(&b.last_modified_at())
                .then_with(|| a.last_modified.cmp(&b.last_modified))
        })
}

/// Find the publish name detection should run against
///
/// No published iteration means there is nothing to detect with; the run
/// cannot proceed.
pub async fn resolve_publish_name(remote: &dyn RemoteVisionService) -> SyncResult<String> {
    let iterations = remote
        .list_iterations()
        .await
        .map_err(|e| SyncError::remote("list iterations", e))?;

    let latest = latest_published(&iterations).ok_or_else(|| {
        SyncError::remote(
            "resolve published iteration",
            RemoteError::Api(404, "no published iteration".to_string()),
        )
    })?;

    let publish_name = latest.publish_name.clone().unwrap_or_default();
    tracing::info!(
        project = %remote.project_id(),
        iteration = %latest.name,
        publish_name = %publish_name,
        "Detection will use published iteration"
    );
    Ok(publish_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IterationId, IterationStatus};
    use uuid::Uuid;

    fn iteration(name: &str, publish: Option<&str>, modified: &str) -> TrainingIteration {
        TrainingIteration {
            id: IterationId(Uuid::new_v4()),
            name: name.to_string(),
            status: IterationStatus::Completed,
            publish_name: publish.map(str::to_string),
            last_modified: Some(modified.to_string()),
        }
    }

    #[test]
    fn test_latest_published_ignores_unpublished() {
        let iterations = vec![
            iteration("Iteration 1", Some("Iteration-1"), "2025-06-01T00:00:00Z"),
            iteration("Iteration 2", None, "2025-06-09T00:00:00Z"),
            iteration("Iteration 3", Some("Iteration-3"), "2025-06-05T00:00:00.250Z"),
        ];
        assert_eq!(
            latest_published(&iterations).unwrap().publish_name.as_deref(),
            Some("Iteration-3")
        );
    }

    #[test]
    fn test_latest_published_none() {
        let iterations = vec![iteration("Iteration 1", None, "2025-06-01T00:00:00Z")];
        assert!(latest_published(&iterations).is_none());
        assert!(latest_published(&[]).is_none());
    }

    #[test]
    fn test_detect_url_encodes_publish_name() {
        let creds = Credentials {
            endpoint: "https://predict.example/".to_string(),
            key: "k".to_string(),
        };
        let client = PredictionClient::new(&creds, "proj", "Iteration 7").unwrap();
        assert_eq!(
            client.detect_url(),
            "https://predict.example/customvision/v3.0/Prediction/proj/detect/iterations/Iteration%207/image"
        );
    }

    #[test]
    fn test_prediction_response_parsing() {
        let body: PredictionResponse = serde_json::from_str(
            r#"{"id":"x","predictions":[
                {"probability":0.93,"tagId":"t","tagName":"logo",
                 "boundingBox":{"left":0.1,"top":0.2,"width":0.3,"height":0.4}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(body.predictions[0].tag_name, "logo");
        assert_eq!(body.predictions[0].bounding_box.unwrap().height, 0.4);
    }
}
