//! Error types for database reads and uploads

use axum::http::StatusCode;
use dbhub_core::problemdetails::{self, Problem};
use dbhub_core::ValidationError;
use dbhub_sqlite::ReaderError;
use dbhub_storage::StorageError;
use thiserror::Error;
use tracing::error;

/// Everything a request against a stored database can fail with
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Sign in required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl From<ValidationError> for DatabaseError {
    fn from(error: ValidationError) -> Self {
        DatabaseError::BadRequest(error.to_string())
    }
}

impl From<ReaderError> for DatabaseError {
    fn from(error: ReaderError) -> Self {
        match error {
            ReaderError::InvalidDatabase(msg) => DatabaseError::InvalidDatabase(msg),
            ReaderError::NoTables => {
                DatabaseError::InvalidDatabase("database has no tables".to_string())
            }
            ReaderError::TableNotFound(table) => {
                DatabaseError::NotFound(format!("table '{}'", table))
            }
            ReaderError::InvalidIdentifier(name) => DatabaseError::InvalidIdentifier(name),
            ReaderError::Io(e) => DatabaseError::UpstreamUnavailable(e.to_string()),
            e @ (ReaderError::QueryFailed(_) | ReaderError::Csv(_) | ReaderError::Task(_)) => {
                DatabaseError::QueryFailed(e.to_string())
            }
        }
    }
}

impl From<StorageError> for DatabaseError {
    fn from(error: StorageError) -> Self {
        if let StorageError::NotFound { .. } = &error {
            error!("Metadata references a missing object: {}", error);
        }
        DatabaseError::UpstreamUnavailable(error.to_string())
    }
}

impl From<sea_orm::DbErr> for DatabaseError {
    fn from(error: sea_orm::DbErr) -> Self {
        DatabaseError::UpstreamUnavailable(format!("metadata store: {}", error))
    }
}

impl From<DatabaseError> for Problem {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::BadRequest(msg) => problemdetails::new(StatusCode::BAD_REQUEST)
                .with_title("Bad Request")
                .with_detail(msg),

            DatabaseError::Unauthorized => problemdetails::new(StatusCode::UNAUTHORIZED)
                .with_title("Authentication Required")
                .with_detail("You need to be signed in to do this"),

            DatabaseError::Forbidden => problemdetails::new(StatusCode::FORBIDDEN)
                .with_title("Access Denied")
                .with_detail("You do not have access to the requested database version"),

            DatabaseError::NotFound(what) => problemdetails::new(StatusCode::NOT_FOUND)
                .with_title("Not Found")
                .with_detail(format!("Requested {} does not exist", what)),

            DatabaseError::Conflict(msg) => problemdetails::new(StatusCode::CONFLICT)
                .with_title("Conflict")
                .with_detail(msg),

            DatabaseError::InvalidDatabase(msg) => {
                error!("Invalid database file: {}", msg);
                problemdetails::new(StatusCode::UNPROCESSABLE_ENTITY)
                    .with_title("Invalid Database")
                    .with_detail("The file is not a readable SQLite database with at least one table")
            }

            DatabaseError::InvalidIdentifier(name) => problemdetails::new(StatusCode::BAD_REQUEST)
                .with_title("Invalid Identifier")
                .with_detail(format!("'{}' is not present in the requested table", name)),

            // Backend text stays in the log
            DatabaseError::QueryFailed(msg) => {
                error!("Query failed: {}", msg);
                problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_title("Query Failed")
                    .with_detail("Database query failed")
            }

            DatabaseError::UpstreamUnavailable(msg) => {
                error!("Upstream unavailable: {}", msg);
                problemdetails::new(StatusCode::SERVICE_UNAVAILABLE)
                    .with_title("Service Unavailable")
                    .with_detail("A storage backend is currently unavailable")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_failure_detail_is_generic() {
        let problem: Problem =
            DatabaseError::QueryFailed("no such column: secret_col".to_string()).into();
        assert_eq!(problem.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(problem.detail(), Some("Database query failed"));
    }

    #[test]
    fn test_upstream_detail_is_generic() {
        let problem: Problem =
            DatabaseError::UpstreamUnavailable("connection refused 10.0.0.5:9000".into()).into();
        assert_eq!(problem.status_code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!problem.detail().unwrap_or_default().contains("10.0.0.5"));
    }

    #[test]
    fn test_reader_errors_map_onto_taxonomy() {
        assert!(matches!(
            DatabaseError::from(ReaderError::NoTables),
            DatabaseError::InvalidDatabase(_)
        ));
        assert!(matches!(
            DatabaseError::from(ReaderError::TableNotFound("t".into())),
            DatabaseError::NotFound(_)
        ));
        assert!(matches!(
            DatabaseError::from(ReaderError::InvalidIdentifier("c".into())),
            DatabaseError::InvalidIdentifier(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (DatabaseError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (DatabaseError::Unauthorized, StatusCode::UNAUTHORIZED),
            (DatabaseError::Forbidden, StatusCode::FORBIDDEN),
            (DatabaseError::NotFound("database".into()), StatusCode::NOT_FOUND),
            (DatabaseError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                DatabaseError::InvalidDatabase("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DatabaseError::InvalidIdentifier("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            let problem: Problem = error.into();
            assert_eq!(problem.status_code, status);
        }
    }
}
