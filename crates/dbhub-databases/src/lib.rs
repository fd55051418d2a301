//! dbhub-databases: resolving, reading and serving stored SQLite databases
//!
//! Every read endpoint runs the same pipeline: authorize, resolve the
//! stored object (through the location cache), consult the rendered-result
//! cache, and only on a miss fetch the object, materialize it locally and
//! read a bounded result from it.

pub mod error;
pub mod handlers;
pub mod services;

#[cfg(test)]
mod test_support;

pub use error::DatabaseError;
pub use handlers::{configure_routes, DatabaseApiDoc, DatabaseAppState};
pub use services::{
    DatabaseViewService, IdentityProvider, MetadataStore, ObjectResolver, SeaOrmMetadataStore,
    SessionIdentityProvider, UploadService,
};
