//! Test Helper Utilities
//!
//! Shared utilities for testing vsync

#![allow(dead_code)]

pub mod detector;
pub mod fixtures;
pub mod mock_remote;

// Re-export commonly used items
pub use detector::{prediction, ScriptedDetector};
pub use fixtures::{spawn_server, test_config, two_label_schema, write_png};
pub use mock_remote::{MockRemote, ScriptedStatus};
