//! # vsync Common Library
//!
//! Shared code for the vsync workspace:
//! - Error and result types
//! - Bootstrap configuration (TOML file, data folder resolution)
//! - Time helpers for the daily schedule

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
