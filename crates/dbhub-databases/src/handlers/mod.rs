//! HTTP handlers for database endpoints

mod handler;
mod types;

pub use handler::*;
pub use types::*;
