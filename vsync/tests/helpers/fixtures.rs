//! Test fixtures: images on disk, configs, an HTTP stand-in server

use std::path::{Path, PathBuf};
use std::time::Duration;

use vsync::config::{Credentials, PipelineSettings, PollPolicy, SyncConfig};
use vsync::models::{LabelDefinition, LabelSchema};

/// Write a blank PNG of the given size and return its path
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(width, height)
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("write test png");
    path
}

/// `logo` and `text`, both at threshold 0.8
pub fn two_label_schema() -> LabelSchema {
    LabelSchema::new(vec![
        LabelDefinition::new("logo", 1, 0.8),
        LabelDefinition::new("text", 2, 0.8),
    ])
    .expect("valid schema")
}

/// Config with fast polling and small batches
pub fn test_config() -> SyncConfig {
    let credentials = |endpoint: &str| Credentials {
        endpoint: endpoint.to_string(),
        key: "test-key".to_string(),
    };
    SyncConfig {
        training: credentials("http://127.0.0.1:9/"),
        prediction: credentials("http://127.0.0.1:9/"),
        prediction_project_id: "prediction-project".to_string(),
        upload_project_id: "upload-project".to_string(),
        prediction_resource_id: "/subscriptions/test/resource".to_string(),
        pipeline: PipelineSettings {
            page_size: 2,
            batch_size: 2,
            poll: PollPolicy {
                interval: Duration::from_millis(10),
                timeout: Duration::from_secs(2),
            },
            iteration_prefix: "Iteration".to_string(),
            advanced_training: false,
            dataset_prefix: "youtube_trending_".to_string(),
        },
        labels: two_label_schema(),
    }
}

/// Serve `router` on an ephemeral local port; returns `http://127.0.0.1:PORT`
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{}", addr)
}
