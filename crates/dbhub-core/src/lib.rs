//! Core utilities and types shared across all DBHub crates

pub mod problemdetails;
pub use problemdetails::ProblemDetails;
pub mod types;
pub mod validation;
mod viewer;

// Re-export commonly used types
pub use types::*;
pub use validation::*;
pub use viewer::Viewer;

// Re-export external dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
