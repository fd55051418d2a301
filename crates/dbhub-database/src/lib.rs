//! Metadata store connection bootstrap

pub use sea_orm;
mod connection;

pub use connection::{establish_connection, ConnectionError, DbConnection, PoolOptions};

// Exported so other crates can build a migrated metadata store in their tests
pub mod test_utils;
