mod service;

pub use service::{ConfigServiceError, ReadLimits, ServerConfig};
