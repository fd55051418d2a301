//! Request and response types for database handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dbhub_core::Viewer;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::{
    DatabaseViewService, IdentityProvider, StoredObject, UploadService, VisOptions,
};

/// Application state for database handlers
pub struct DatabaseAppState {
    pub view_service: Arc<DatabaseViewService>,
    pub upload_service: Arc<UploadService>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Identity of the caller, resolved from the session cookie
pub struct CurrentViewer(pub Viewer);

impl FromRequestParts<Arc<DatabaseAppState>> for CurrentViewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<DatabaseAppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentViewer(state.identity.viewer(&parts.headers).await))
    }
}

// =============================================================================
// Query Types
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TableQuery {
    /// Table to read; defaults to the first table in the file
    pub table: Option<String>,
    /// Database version; defaults to the latest visible version
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VersionQuery {
    /// Database version; defaults to the latest visible version
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VisDataQuery {
    pub table: Option<String>,
    pub version: Option<i32>,
    /// X axis column; must be given together with `ycol`
    pub xcol: Option<String>,
    /// Y axis column; must be given together with `xcol`
    pub ycol: Option<String>,
    /// Filter column
    pub wherecol: Option<String>,
    /// Filter operator: LIKE, =, !=, <, <=, >, >=
    pub wheretype: Option<String>,
    /// Filter value, always bound as a query parameter
    pub whereval: Option<String>,
}

impl From<VisDataQuery> for VisOptions {
    fn from(query: VisDataQuery) -> Self {
        VisOptions {
            table: query.table,
            x_col: query.xcol,
            y_col: query.ycol,
            where_col: query.wherecol,
            where_type: query.wheretype,
            where_val: query.whereval,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A newly stored database version
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    #[schema(example = "justinclift")]
    pub owner: String,
    #[schema(example = "Marine Litter.sqlite")]
    pub database: String,
    #[schema(example = 2)]
    pub version: i32,
    pub size: i64,
    /// Hex-encoded SHA-256 of the stored file
    pub sha256: String,
    pub public: bool,
}

impl From<StoredObject> for UploadResponse {
    fn from(stored: StoredObject) -> Self {
        Self {
            owner: stored.owner,
            database: stored.dbname,
            version: stored.version,
            size: stored.size,
            sha256: stored.sha256,
            public: stored.public,
        }
    }
}

/// Multipart body of an upload, for the API docs
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The SQLite file; its file name becomes the database name
    #[schema(value_type = String, format = Binary)]
    pub database: Vec<u8>,
    /// "true" or "false"
    pub public: String,
}
