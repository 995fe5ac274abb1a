//! Daily trigger for full runs
//!
//! Each run is spawned onto its own task so a long training poll never
//! delays the trigger loop. A tick that fires while the previous run is
//! still going is skipped.

use chrono::{Local, NaiveTime};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vsync_common::time::{duration_until, next_daily_occurrence};

use super::pipeline::SyncPipeline;
use crate::models::IssueSeverity;

/// Single-run permit shared between the trigger loop and the running task
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Held for the duration of one run; releases the guard on drop
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the permit, or `None` if a run is already in progress
    pub fn try_start(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Run the full pipeline once and log its outcome
pub async fn run_once(pipeline: &SyncPipeline, data_folder: &std::path::Path) -> bool {
    match pipeline.run_full(data_folder).await {
        Ok(report) => {
            let warnings = report.count_by_severity(IssueSeverity::Warning);
            let skipped = report.count_by_severity(IssueSeverity::Skip);
            if warnings + skipped > 0 {
                warn!(warnings, skipped, "Run finished with isolated failures");
            }
            info!("Run succeeded: {}", report.summary());
            true
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            false
        }
    }
}

/// Daily scheduler for full runs
pub struct Scheduler {
    pipeline: Arc<SyncPipeline>,
    data_folder: PathBuf,
    at: NaiveTime,
    guard: RunGuard,
}

impl Scheduler {
    pub fn new(pipeline: Arc<SyncPipeline>, data_folder: PathBuf, at: NaiveTime) -> Self {
        Self {
            pipeline,
            data_folder,
            at,
            guard: RunGuard::new(),
        }
    }

    /// Spawn a run unless one is already in progress
    pub fn trigger(&self) -> Option<JoinHandle<bool>> {
        let Some(permit) = self.guard.try_start() else {
            warn!("Previous run still in progress, skipping this trigger");
            return None;
        };

        let pipeline = Arc::clone(&self.pipeline);
        let data_folder = self.data_folder.clone();
        Some(tokio::spawn(async move {
            let _permit = permit;
            run_once(&pipeline, &data_folder).await
        }))
    }

    /// Trigger a run every day at the configured local time, forever
    pub async fn run(self) {
        info!(at = %self.at.format("%H:%M"), "Scheduler started");
        loop {
            let now = Local::now().naive_local();
            let next = next_daily_occurrence(now, self.at);
            info!(next_run = %next, "Waiting for next scheduled run");
            tokio::time::sleep(duration_until(now, next)).await;

            info!("Scheduled run triggered");
            self.trigger();
        }
    }
}
