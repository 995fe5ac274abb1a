//! vsync library interface
//!
//! Incremental annotation sync and training lifecycle for a remote vision
//! service. Exposes the pipeline stages for the binary and for integration
//! tests.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::config::SyncConfig;
pub use crate::error::{SyncError, SyncResult};
pub use crate::workflow::SyncPipeline;
