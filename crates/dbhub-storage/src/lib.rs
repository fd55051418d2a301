//! dbhub-storage: object store access for uploaded database files
//!
//! Database files are stored as opaque objects addressed by
//! (bucket, object id). The [`ObjectStore`] trait is the only surface the
//! rest of the server sees; backends live under [`backends`].

pub mod backends;
pub mod error;
mod store;

pub use backends::{MemoryObjectStore, S3ObjectStore, S3Settings};
pub use error::StorageError;
pub use store::{read_to_end, ObjectStore, ObjectStream};
