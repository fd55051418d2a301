//! Shape validation for names arriving in request paths and query strings
//!
//! These checks reject obviously malformed input early with a `BadRequest`.
//! They are not an injection defense for SQLite identifiers; that is done by
//! whitelisting against the live table and column enumeration.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Longest table, column or filter value accepted from a request.
pub const MAX_IDENTIFIER_LEN: usize = 1024;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.\-]{0,62}$").expect("valid username regex"));

static DBNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9 _.,()'\-]{0,255}$").expect("valid database name regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid user name")]
    Username,

    #[error("Invalid database name")]
    DatabaseName,

    #[error("Invalid {field}")]
    Field { field: &'static str },
}

pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::Username)
    }
}

pub fn validate_dbname(name: &str) -> Result<(), ValidationError> {
    if DBNAME_RE.is_match(name) && !name.contains("..") {
        Ok(())
    } else {
        Err(ValidationError::DatabaseName)
    }
}

pub fn validate_owner_and_db(owner: &str, dbname: &str) -> Result<(), ValidationError> {
    validate_username(owner)?;
    validate_dbname(dbname)
}

/// Checks a free-form request field (table, column, filter value).
///
/// Empty strings, control characters and overly long values are rejected.
pub fn validate_field(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || value.len() > MAX_IDENTIFIER_LEN
        || value.chars().any(|c| c.is_control())
    {
        return Err(ValidationError::Field { field });
    }
    Ok(())
}
