//! HTTP handlers for database reads, downloads and uploads

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use dbhub_core::problemdetails::Problem;
use dbhub_sqlite::ResultSet;
use tracing::info;
use utoipa::OpenApi;

use super::types::*;
use crate::error::DatabaseError;
use crate::services::{
    DatabaseSummary, DatabaseTarget, PageData, UploadRequest, VisPageData, SQLITE_CONTENT_TYPE,
};

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// OpenAPI documentation for database endpoints
#[derive(OpenApi)]
#[openapi(
    paths(
        table_view,
        download_csv,
        vis_data,
        page_data,
        vis_page,
        download,
        upload_data,
        user_databases,
    ),
    components(
        schemas(
            ResultSet,
            dbhub_sqlite::Cell,
            PageData,
            VisPageData,
            UploadResponse,
            UploadForm,
            DatabaseSummary,
            dbhub_core::ProblemDetails,
        )
    ),
    tags(
        (name = "Databases", description = "Reading, downloading and uploading SQLite databases")
    )
)]
pub struct DatabaseApiDoc;

/// Configure database routes
pub fn configure_routes() -> Router<Arc<DatabaseAppState>> {
    Router::new()
        .route("/x/table/{owner}/{db}", get(table_view))
        .route("/x/downloadcsv/{owner}/{db}", get(download_csv))
        .route("/x/visdata/{owner}/{db}", get(vis_data))
        .route("/x/pagedata/{owner}/{db}", get(page_data))
        .route("/x/vispage/{owner}/{db}", get(vis_page))
        .route("/x/download/{owner}/{db}", get(download))
        .route("/x/databases/{owner}", get(user_databases))
        .route(
            "/x/uploaddata",
            post(upload_data).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// Databases of one user, newest first
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/databases/{owner}",
    params(
        ("owner" = String, Path, description = "User whose databases are listed")
    ),
    responses(
        (status = 200, description = "Latest visible version of each database", body = Vec<DatabaseSummary>),
        (status = 400, description = "Invalid user name", body = dbhub_core::ProblemDetails),
        (status = 404, description = "Unknown user", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn user_databases(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<DatabaseSummary>>, Problem> {
    let listed = state.view_service.user_databases(&viewer, &owner).await?;
    Ok(Json(listed))
}

/// Rows of one table as JSON
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/table/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        TableQuery
    ),
    responses(
        (status = 200, description = "Table rows, or [] when the page is empty", body = ResultSet),
        (status = 400, description = "Invalid request", body = dbhub_core::ProblemDetails),
        (status = 403, description = "Version is private", body = dbhub_core::ProblemDetails),
        (status = 404, description = "Database or table not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn table_view(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<TableQuery>,
) -> Result<Response, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let result = state
        .view_service
        .table_view(&viewer, &target, query.table.as_deref())
        .await?;

    let body = result
        .to_json()
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Export one table as CSV
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/downloadcsv/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        TableQuery
    ),
    responses(
        (status = 200, description = "Header-less CSV of the table", content_type = "text/csv", body = String),
        (status = 400, description = "No table given", body = dbhub_core::ProblemDetails),
        (status = 404, description = "Database or table not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn download_csv(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<TableQuery>,
) -> Result<Response, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let export = state
        .view_service
        .csv_export(&viewer, &target, query.table.as_deref())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export.filename),
            ),
        ],
        export.body,
    )
        .into_response())
}

/// Chart data for one table
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/visdata/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        VisDataQuery
    ),
    responses(
        (status = 200, description = "Projected and filtered rows", body = ResultSet),
        (status = 400, description = "Invalid column, operator or value", body = dbhub_core::ProblemDetails),
        (status = 404, description = "Database or table not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn vis_data(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<VisDataQuery>,
) -> Result<Json<ResultSet>, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let options = query.into();
    let result = state.view_service.vis_data(&viewer, &target, &options).await?;
    Ok(Json(result))
}

/// Everything the database page shows
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/pagedata/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        TableQuery
    ),
    responses(
        (status = 200, description = "Table list and a page of rows", body = PageData),
        (status = 404, description = "Database or table not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn page_data(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<TableQuery>,
) -> Result<Json<PageData>, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let data = state
        .view_service
        .page_data(&viewer, &target, query.table.as_deref())
        .await?;
    Ok(Json(data))
}

/// Everything the visualisation page shows
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/vispage/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        TableQuery
    ),
    responses(
        (status = 200, description = "Column names and rows", body = VisPageData),
        (status = 404, description = "Database or table not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn vis_page(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<TableQuery>,
) -> Result<Json<VisPageData>, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let data = state
        .view_service
        .vis_page(&viewer, &target, query.table.as_deref())
        .await?;
    Ok(Json(data))
}

/// Download the stored SQLite file
#[utoipa::path(
    tag = "Databases",
    get,
    path = "/x/download/{owner}/{db}",
    params(
        ("owner" = String, Path, description = "Database owner"),
        ("db" = String, Path, description = "Database name"),
        VersionQuery
    ),
    responses(
        (status = 200, description = "The database file", content_type = "application/x-sqlite3", body = Vec<u8>),
        (status = 403, description = "Version is private", body = dbhub_core::ProblemDetails),
        (status = 404, description = "Database not found", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn download(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    Path((owner, db)): Path<(String, String)>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, Problem> {
    let target = DatabaseTarget::new(owner, db, query.version);
    let download = state.view_service.download(&viewer, &target).await?;

    info!(
        "Serving {}/{} version {} ({} bytes)",
        target.owner, target.dbname, download.version, download.size
    );
    Ok((
        [
            (header::CONTENT_TYPE, SQLITE_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename={}",
                    urlencoding::encode(&download.filename)
                ),
            ),
            (header::CONTENT_LENGTH, download.size.to_string()),
        ],
        Body::from_stream(download.stream),
    )
        .into_response())
}

/// Upload a new database version
#[utoipa::path(
    tag = "Databases",
    post,
    path = "/x/uploaddata",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Version stored", body = UploadResponse),
        (status = 400, description = "Missing or malformed fields", body = dbhub_core::ProblemDetails),
        (status = 401, description = "Not signed in", body = dbhub_core::ProblemDetails),
        (status = 422, description = "Not a SQLite database with tables", body = dbhub_core::ProblemDetails)
    )
)]
pub async fn upload_data(
    CurrentViewer(viewer): CurrentViewer,
    State(state): State<Arc<DatabaseAppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Problem> {
    if viewer.is_anonymous() {
        return Err(DatabaseError::Unauthorized.into());
    }

    let mut database: Option<(String, Bytes)> = None;
    let mut public: Option<bool> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DatabaseError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        match field.name() {
            Some("database") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| DatabaseError::BadRequest("Database file name missing".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| DatabaseError::BadRequest(format!("Malformed upload: {}", e)))?;
                database = Some((filename, data));
            }
            Some("public") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| DatabaseError::BadRequest(format!("Malformed upload: {}", e)))?;
                public = Some(parse_bool(&value).ok_or_else(|| {
                    DatabaseError::BadRequest("Public value incorrect".to_string())
                })?);
            }
            _ => {}
        }
    }

    let (dbname, data) = database
        .ok_or_else(|| DatabaseError::BadRequest("Database file missing from upload".into()))?;
    let public =
        public.ok_or_else(|| DatabaseError::BadRequest("Public value missing".to_string()))?;

    let stored = state
        .upload_service
        .upload(&viewer, UploadRequest { dbname, public, data })
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(stored))))
}

/// Boolean form values as browsers and scripts tend to send them
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
