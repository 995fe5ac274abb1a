//! Custom Vision training API client
//!
//! REST v3.3 training endpoints, bound to one project. Implements
//! [`RemoteVisionService`] for the pipeline.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Credentials;
use crate::models::{IterationId, TrainingIteration};
use crate::types::{
    ImageFileBatch, ImageFileEntry, RemoteError, RemoteImage, RemoteTag, RemoteVisionService,
    UploadBatchSummary,
};

const API_PATH: &str = "customvision/v3.3/training/projects";
const USER_AGENT: &str = concat!("vsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const UPLOAD_TIMEOUT_SECS: u64 = 180;

/// Custom Vision training API client
pub struct CustomVisionTrainingClient {
    http_client: reqwest::Client,
    base_url: String,
    key: String,
    project_id: String,
}

impl CustomVisionTrainingClient {
    pub fn new(credentials: &Credentials, project_id: impl Into<String>) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let project_id = project_id.into();
        let base_url = format!(
            "{}/{}/{}",
            credentials.endpoint.trim_end_matches('/'),
            API_PATH,
            project_id
        );

        Ok(Self {
            http_client,
            base_url,
            key: credentials.key.clone(),
            project_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client
            .get(self.url(path))
            .header("Training-Key", &self.key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(self.url(path))
            .header("Training-Key", &self.key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RemoteVisionService for CustomVisionTrainingClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_tags(&self) -> Result<Vec<RemoteTag>, RemoteError> {
        tracing::debug!(project = %self.project_id, "Listing tags");
        self.send_json(self.get("tags")).await
    }

    async fn create_tag(&self, name: &str) -> Result<RemoteTag, RemoteError> {
        tracing::debug!(project = %self.project_id, tag = %name, "Creating tag");
        self.send_json(self.post("tags").query(&[("name", name)]))
            .await
    }

    async fn list_images(&self, take: usize, skip: usize) -> Result<Vec<RemoteImage>, RemoteError> {
        tracing::debug!(project = %self.project_id, take, skip, "Listing images");
        self.send_json(self.get("images").query(&[("take", take), ("skip", skip)]))
            .await
    }

    async fn upload_images(
        &self,
        batch: &[ImageFileEntry],
    ) -> Result<UploadBatchSummary, RemoteError> {
        let body = ImageFileBatch {
            images: batch.to_vec(),
        };
        self.send_json(
            self.post("images/files")
                .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
                .json(&body),
        )
        .await
    }

    async fn train(&self, advanced: bool) -> Result<TrainingIteration, RemoteError> {
        self.send_json(
            self.post("train")
                .query(&[("advancedTraining", advanced)]),
        )
        .await
    }

    async fn list_iterations(&self) -> Result<Vec<TrainingIteration>, RemoteError> {
        self.send_json(self.get("iterations")).await
    }

    async fn get_iteration(&self, id: IterationId) -> Result<TrainingIteration, RemoteError> {
        self.send_json(self.get(&format!("iterations/{}", id)))
            .await
    }

    async fn publish_iteration(
        &self,
        id: IterationId,
        publish_name: &str,
        prediction_resource_id: &str,
    ) -> Result<(), RemoteError> {
        self.send(
            self.post(&format!("iterations/{}/publish", id))
                .query(&[
                    ("publishName", publish_name),
                    ("predictionId", prediction_resource_id),
                ]),
        )
        .await?;
        Ok(())
    }
}
