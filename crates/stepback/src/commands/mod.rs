//! Command handlers for the stepback CLI.

pub mod config;
pub mod logging;
pub mod snapshot;

pub use config::*;
pub use logging::*;
pub use snapshot::*;
