//! Shared type aliases

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used across all DBHub crates
///
/// This is the canonical datetime type for metadata store TIMESTAMPTZ columns
/// and for timestamps carried in API responses.
///
/// # Example
/// ```rust
/// use dbhub_core::DBDateTime;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// pub struct Response {
///     pub last_modified: DBDateTime,
/// }
/// ```
pub type DBDateTime = ChronoDateTime<Utc>;
