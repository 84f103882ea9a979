//! Shared utilities for stepback.
//!
//! This crate provides common utilities used across the stepback workspace:
//! - Logging setup with tracing
//! - Well-known directories and path helpers

pub mod log;
pub mod path;

pub use log::{LogConfig, LogLevel};
