//! Raven Core — error taxonomy and configuration for the regulatory
//! retrieval pipeline.

pub mod config;
pub mod error;

pub use config::{DataPaths, RavenConfig};
pub use error::{Error, Result};
