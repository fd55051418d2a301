use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Not a readable SQLite database: {0}")]
    InvalidDatabase(String),

    #[error("Database contains no tables")]
    NoTables,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Unknown identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Reader task failed: {0}")]
    Task(String),
}
