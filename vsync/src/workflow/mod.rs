//! Run orchestration and scheduling

pub mod pipeline;
pub mod scheduler;

pub use pipeline::SyncPipeline;
pub use scheduler::{run_once, RunGuard, Scheduler};
