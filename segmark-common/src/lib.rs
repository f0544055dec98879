//! # Segmark Common Library
//!
//! Shared code for the Segmark segmentation labeling backend:
//! - Error taxonomy used across the service layers
//! - Configuration loading and data folder resolution

pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::{Error, Result};
