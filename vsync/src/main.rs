//! vsync - annotation sync and training controller
//!
//! Runs detection over the newest crawled dataset, uploads the images the
//! remote project has not seen yet and trains/publishes a new iteration.
//! Either immediately (`run --now`) or every day at the configured time.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use vsync::services::DatasetPaths;
use vsync::workflow::{run_once, Scheduler};
use vsync::{SyncConfig, SyncPipeline};
use vsync_common::config::{load_toml_config, resolve_config_path, resolve_data_folder, TomlConfig};

/// Command-line arguments for vsync
#[derive(Parser, Debug)]
#[command(name = "vsync")]
#[command(about = "Incremental annotation sync and training for Custom Vision projects")]
#[command(version)]
struct Args {
    /// Config file (default: $VSYNC_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the crawled datasets
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full pipeline: daily at the configured time, or once with --now
    Run {
        /// Run once immediately instead of waiting for the schedule
        #[arg(long)]
        now: bool,
    },
    /// Detection only: write the annotation document of a dataset
    Predict {
        /// Dataset folder (default: newest under the data folder)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Upload and training only, from a previously written document
    Upload {
        /// Dataset folder (default: newest under the data folder)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

fn init_tracing(toml_config: &TomlConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = load_toml_config(config_path.as_deref())
        .context("Failed to load config file")?;

    init_tracing(&toml_config);

    info!(
        "Starting vsync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("VSYNC_GIT_HASH"),
        env!("VSYNC_BUILD_TIMESTAMP"),
        env!("VSYNC_BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file location available, using defaults"),
    }

    let data_folder = resolve_data_folder(args.data_folder.as_deref(), &toml_config);
    info!("Data folder: {}", data_folder.display());

    let config = match SyncConfig::resolve(&toml_config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    let pipeline = Arc::new(SyncPipeline::new(config)?);

    match args.command {
        Command::Run { now: true } => {
            info!("Immediate mode: running the pipeline once");
            run_once(&pipeline, &data_folder).await;
        }
        Command::Run { now: false } => {
            let at = vsync_common::time::parse_daily_time(&toml_config.schedule.daily_at)?;
            info!("Scheduled mode: pipeline runs daily at {}", at.format("%H:%M"));
            Scheduler::new(pipeline, data_folder, at).run().await;
        }
        Command::Predict { dataset } => {
            let dataset = dataset_paths(&pipeline, dataset.as_deref(), &data_folder)?;
            match pipeline
                .run_prediction(&dataset.image_folder, &dataset.document_path)
                .await
            {
                Ok(report) => info!("Prediction succeeded: {}", report.summary()),
                Err(e) => error!("Prediction aborted: {}", e),
            }
        }
        Command::Upload { dataset } => {
            let dataset = dataset_paths(&pipeline, dataset.as_deref(), &data_folder)?;
            match pipeline
                .run_upload(&dataset.image_folder, &dataset.document_path)
                .await
            {
                Ok(report) => info!("Upload succeeded: {}", report.summary()),
                Err(e) => error!("Upload aborted: {}", e),
            }
        }
    }

    Ok(())
}

fn dataset_paths(
    pipeline: &SyncPipeline,
    dataset: Option<&Path>,
    data_folder: &Path,
) -> Result<DatasetPaths> {
    match dataset {
        Some(root) => Ok(DatasetPaths::for_root(root)),
        None => Ok(pipeline.locate_dataset(data_folder)?),
    }
}
