//! In-memory RemoteVisionService
//!
//! Holds tags, stored image names and iterations behind a mutex, records
//! every call, and fails on demand.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use vsync::models::{IterationId, IterationStatus, TagId, TrainingIteration};
use vsync::types::{
    ImageCreateResult, ImageFileEntry, RemoteError, RemoteImage, RemoteTag, RemoteVisionService,
    UploadBatchSummary,
};

/// One scripted `get_iteration` answer
#[derive(Debug, Clone, Copy)]
pub enum ScriptedStatus {
    Status(IterationStatus),
    /// Query fails with HTTP 503
    Error,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub tags: Vec<RemoteTag>,
    /// Names of images stored remotely, in upload order
    pub images: Vec<String>,
    pub iterations: Vec<TrainingIteration>,
    /// Answers for successive status queries; the last one repeats
    pub status_script: VecDeque<ScriptedStatus>,

    pub fail_list_tags: bool,
    pub fail_list_iterations: bool,
    /// `list_images` fails when asked for this offset
    pub fail_list_images_at: Option<usize>,
    pub failing_tags: HashSet<String>,
    /// 1-based upload call numbers that fail
    pub failing_batches: HashSet<usize>,
    pub fail_train: bool,
    pub fail_publish: bool,

    pub list_images_calls: Vec<(usize, usize)>,
    pub created_tags: Vec<String>,
    /// File names per upload call (failed calls included)
    pub upload_calls: Vec<Vec<String>>,
    pub uploaded: Vec<ImageFileEntry>,
    pub train_calls: usize,
    pub status_queries: usize,
    /// (iteration id, publish name, prediction resource id)
    pub published: Vec<(IterationId, String, String)>,
}

pub struct MockRemote {
    project_id: String,
    state: Mutex<MockState>,
}

impl MockRemote {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_tags(self, names: &[&str]) -> Self {
        {
            let mut state = self.state();
            for name in names {
                state.tags.push(RemoteTag {
                    id: TagId(Uuid::new_v4()),
                    name: name.to_string(),
                });
            }
        }
        self
    }

    pub fn with_images(self, names: &[&str]) -> Self {
        self.state()
            .images
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_iteration(self, name: &str, publish_name: Option<&str>, last_modified: &str) -> Self {
        self.state().iterations.push(TrainingIteration {
            id: IterationId(Uuid::new_v4()),
            name: name.to_string(),
            status: IterationStatus::Completed,
            publish_name: publish_name.map(str::to_string),
            last_modified: Some(last_modified.to_string()),
        });
        self
    }

    pub fn with_status_script(self, script: Vec<ScriptedStatus>) -> Self {
        self.state().status_script = script.into();
        self
    }

    /// Lock the state for setup or inspection
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.state()
            .tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }

    fn unavailable() -> RemoteError {
        RemoteError::Api(503, "service unavailable".to_string())
    }
}

#[async_trait::async_trait]
impl RemoteVisionService for MockRemote {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_tags(&self) -> Result<Vec<RemoteTag>, RemoteError> {
        let state = self.state();
        if state.fail_list_tags {
            return Err(Self::unavailable());
        }
        Ok(state.tags.clone())
    }

    async fn create_tag(&self, name: &str) -> Result<RemoteTag, RemoteError> {
        let mut state = self.state();
        if state.failing_tags.contains(name) {
            return Err(RemoteError::Api(400, format!("cannot create tag {name}")));
        }
        let tag = RemoteTag {
            id: TagId(Uuid::new_v4()),
            name: name.to_string(),
        };
        state.tags.push(tag.clone());
        state.created_tags.push(name.to_string());
        Ok(tag)
    }

    async fn list_images(&self, take: usize, skip: usize) -> Result<Vec<RemoteImage>, RemoteError> {
        let mut state = self.state();
        state.list_images_calls.push((take, skip));
        if state.fail_list_images_at == Some(skip) {
            return Err(Self::unavailable());
        }
        Ok(state
            .images
            .iter()
            .enumerate()
            .skip(skip)
            .take(take)
            .map(|(i, name)| RemoteImage {
                id: format!("img-{i}"),
                name: Some(name.clone()),
            })
            .collect())
    }

    async fn upload_images(
        &self,
        batch: &[ImageFileEntry],
    ) -> Result<UploadBatchSummary, RemoteError> {
        let mut state = self.state();
        state
            .upload_calls
            .push(batch.iter().map(|e| e.name.clone()).collect());
        let call_no = state.upload_calls.len();
        if state.failing_batches.contains(&call_no) {
            return Err(RemoteError::Api(500, "batch rejected".to_string()));
        }

        let mut results = Vec::new();
        for entry in batch {
            let status = if state.images.contains(&entry.name) {
                "OKDuplicate"
            } else {
                state.images.push(entry.name.clone());
                "OK"
            };
            results.push(ImageCreateResult {
                source_url: Some(entry.name.clone()),
                status: status.to_string(),
            });
            state.uploaded.push(entry.clone());
        }
        Ok(UploadBatchSummary {
            is_batch_successful: true,
            images: results,
        })
    }

    async fn train(&self, _advanced: bool) -> Result<TrainingIteration, RemoteError> {
        let mut state = self.state();
        state.train_calls += 1;
        if state.fail_train {
            return Err(RemoteError::Api(400, "nothing to train".to_string()));
        }
        let iteration = TrainingIteration {
            id: IterationId(Uuid::new_v4()),
            name: format!("Iteration {}", state.iterations.len() + 1),
            status: IterationStatus::Requested,
            publish_name: None,
            last_modified: None,
        };
        state.iterations.push(iteration.clone());
        Ok(iteration)
    }

    async fn list_iterations(&self) -> Result<Vec<TrainingIteration>, RemoteError> {
        let state = self.state();
        if state.fail_list_iterations {
            return Err(Self::unavailable());
        }
        Ok(state.iterations.clone())
    }

    async fn get_iteration(&self, id: IterationId) -> Result<TrainingIteration, RemoteError> {
        let mut state = self.state();
        state.status_queries += 1;

        let answer = if state.status_script.len() > 1 {
            state.status_script.pop_front()
        } else {
            state.status_script.front().copied()
        };
        let status = match answer {
            Some(ScriptedStatus::Status(status)) => status,
            Some(ScriptedStatus::Error) => return Err(Self::unavailable()),
            None => IterationStatus::Completed,
        };

        let iteration = state
            .iterations
            .iter_mut()
            .find(|it| it.id == id)
            .ok_or_else(|| RemoteError::Api(404, format!("iteration {id} not found")))?;
        iteration.status = status;
        Ok(iteration.clone())
    }

    async fn publish_iteration(
        &self,
        id: IterationId,
        publish_name: &str,
        prediction_resource_id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        if state.fail_publish {
            return Err(RemoteError::Api(400, "publish rejected".to_string()));
        }
        state
            .published
            .push((id, publish_name.to_string(), prediction_resource_id.to_string()));
        if let Some(iteration) = state.iterations.iter_mut().find(|it| it.id == id) {
            iteration.publish_name = Some(publish_name.to_string());
        }
        Ok(())
    }
}
