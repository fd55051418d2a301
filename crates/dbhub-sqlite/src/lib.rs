//! dbhub-sqlite: bounded, typed reads from user-uploaded SQLite files
//!
//! Table and column names cannot be bound as query parameters, so every
//! identifier that ends up in query text is an [`Identifier`], and the only
//! way to obtain one is to match a candidate against the live enumeration
//! read from the file itself. Filter values are always bound.

mod error;
mod identifier;
mod materialize;
mod projection;
mod reader;
mod result;

pub use error::ReaderError;
pub use identifier::Identifier;
pub use materialize::MaterializedFile;
pub use projection::{Filter, FilterOp, Projection};
pub use reader::SqliteReader;
pub use result::{Cell, CellType, ResultSet, BINARY_MARKER, NULL_MARKER};
