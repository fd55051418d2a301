//! Read pipeline shared by every database view endpoint
//!
//! authorize -> locate (location cache, then resolver) -> rendered cache
//! -> fetch -> materialize -> read -> cache store
//!
//! Cache keys are built from the audience the data was resolved for:
//! owner requests get private keys bound to the owner's identity, all
//! other requests share public keys. Nothing is looked up in the cache
//! before the request has passed validation, and failures are never
//! cached.

use std::sync::Arc;
use std::time::Duration;

use dbhub_cache::{CacheKey, CacheKeyBuilder, Namespace, ResultCache};
use dbhub_config::{ReadLimits, ServerConfig};
use dbhub_core::{validate_field, validate_owner_and_db, validate_username, Viewer};
use dbhub_sqlite::{
    Filter, MaterializedFile, Projection, ReaderError, ResultSet, SqliteReader,
};
use dbhub_storage::{ObjectStore, ObjectStream};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::metadata::{DatabaseSummary, MetadataStore, StoredObject};
use super::resolver::ObjectResolver;
use crate::error::DatabaseError;

/// Which database a request is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub owner: String,
    pub dbname: String,
    /// None means the latest version visible to the viewer
    pub version: Option<i32>,
}

impl DatabaseTarget {
    pub fn new(owner: impl Into<String>, dbname: impl Into<String>, version: Option<i32>) -> Self {
        Self {
            owner: owner.into(),
            dbname: dbname.into(),
            version,
        }
    }
}

/// What the location cache holds for a resolved version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub object_id: String,
    pub version: i32,
    pub size: i64,
}

impl From<&StoredObject> for ObjectLocation {
    fn from(stored: &StoredObject) -> Self {
        Self {
            bucket: stored.bucket.clone(),
            object_id: stored.object_id.clone(),
            version: stored.version,
            size: stored.size,
        }
    }
}

/// Chart options as they arrive from the query string
#[derive(Debug, Clone, Default)]
pub struct VisOptions {
    pub table: Option<String>,
    pub x_col: Option<String>,
    pub y_col: Option<String>,
    pub where_col: Option<String>,
    pub where_type: Option<String>,
    pub where_val: Option<String>,
}

impl VisOptions {
    fn projection(&self) -> Result<Option<Projection>, DatabaseError> {
        let filter = match (&self.where_col, &self.where_type, &self.where_val) {
            (None, None, None) => None,
            (Some(column), Some(op), Some(value)) => Some(Filter {
                column: column.clone(),
                op: op.parse().map_err(DatabaseError::BadRequest)?,
                value: value.clone(),
            }),
            _ => {
                return Err(DatabaseError::BadRequest(
                    "wherecol, wheretype and whereval must be given together".to_string(),
                ))
            }
        };

        let columns = match (&self.x_col, &self.y_col) {
            (Some(x), Some(y)) => Some(Projection::columns([x.clone(), y.clone()]).plottable()),
            (None, None) => None,
            _ => {
                return Err(DatabaseError::BadRequest(
                    "xcol and ycol must be given together".to_string(),
                ))
            }
        };

        Ok(match (columns, filter) {
            (Some(projection), Some(filter)) => Some(projection.with_filter(filter)),
            (Some(projection), None) => Some(projection),
            (None, Some(filter)) => Some(Projection::default().with_filter(filter)),
            (None, None) => None,
        })
    }
}

/// Data behind the database page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageData {
    pub owner: String,
    pub database: String,
    pub version: i32,
    pub tables: Vec<String>,
    pub max_rows: u32,
    pub data: ResultSet,
}

/// Data behind the visualisation page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisPageData {
    pub owner: String,
    pub database: String,
    pub version: i32,
    pub tables: Vec<String>,
    pub col_names: Vec<String>,
    pub data: ResultSet,
}

pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

pub struct Download {
    pub filename: String,
    pub version: i32,
    pub size: i64,
    pub stream: ObjectStream,
}

pub struct DatabaseViewService {
    resolver: ObjectResolver,
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
    cache: ResultCache,
    limits: ReadLimits,
    cache_ttl: Duration,
    location_ttl: Duration,
}

impl DatabaseViewService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        store: Arc<dyn ObjectStore>,
        cache: ResultCache,
        config: &ServerConfig,
    ) -> Self {
        Self {
            resolver: ObjectResolver::new(metadata.clone()),
            metadata,
            store,
            cache,
            limits: config.limits.clone(),
            cache_ttl: config.get_cache_ttl(),
            location_ttl: config.get_location_cache_ttl(),
        }
    }

    /// JSON table view: a page of rows sized for the viewer
    pub async fn table_view(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
        table: Option<&str>,
    ) -> Result<ResultSet, DatabaseError> {
        authorize(target, &[("table", table)])?;
        let location = self.locate("table", viewer, target).await?;
        let rows = self.row_limit(viewer).await?;

        let key = self
            .key(Namespace::TableView, viewer, target)
            .table(table.unwrap_or_default())
            .param("rows", rows);
        let table = table.map(str::to_string);
        self.rendered(key, &location, move |reader| {
            reader.read_table(table.as_deref(), rows, None)
        })
        .await
    }

    /// Whole-table CSV export, capped at the configured ceiling
    pub async fn csv_export(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
        table: Option<&str>,
    ) -> Result<CsvExport, DatabaseError> {
        let table = table
            .ok_or_else(|| DatabaseError::BadRequest("No table name given".to_string()))?;
        authorize(target, &[("table", Some(table))])?;
        let location = self.locate("csv", viewer, target).await?;
        let rows = self.limits.csv_max_rows;

        let key = self
            .key(Namespace::CsvExport, viewer, target)
            .table(table)
            .param("rows", rows);
        let requested = table.to_string();
        let body: String = self
            .rendered(key, &location, move |reader| {
                reader.read_table(Some(&requested), rows, None)?.to_csv()
            })
            .await?;

        Ok(CsvExport {
            filename: format!("{}.csv", urlencoding::encode(table)),
            body,
        })
    }

    /// Chart data, optionally projected onto two columns and filtered
    pub async fn vis_data(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
        options: &VisOptions,
    ) -> Result<ResultSet, DatabaseError> {
        authorize(
            target,
            &[
                ("table", options.table.as_deref()),
                ("xcol", options.x_col.as_deref()),
                ("ycol", options.y_col.as_deref()),
                ("wherecol", options.where_col.as_deref()),
                ("whereval", options.where_val.as_deref()),
            ],
        )?;
        let projection = options.projection()?;
        let location = self.locate("visdata", viewer, target).await?;
        let rows = self.limits.vis_data_rows;

        let key = self
            .key(Namespace::VisData, viewer, target)
            .table(options.table.as_deref().unwrap_or_default())
            .param("xcol", options.x_col.as_deref().unwrap_or_default())
            .param("ycol", options.y_col.as_deref().unwrap_or_default())
            .param("wherecol", options.where_col.as_deref().unwrap_or_default())
            .param("wheretype", options.where_type.as_deref().unwrap_or_default())
            .param("whereval", options.where_val.as_deref().unwrap_or_default())
            .param("rows", rows);
        let table = options.table.clone();
        self.rendered(key, &location, move |reader| {
            reader.read_table(table.as_deref(), rows, projection.as_ref())
        })
        .await
    }

    /// Table list plus a page of the selected table
    pub async fn page_data(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
        table: Option<&str>,
    ) -> Result<PageData, DatabaseError> {
        authorize(target, &[("table", table)])?;
        let location = self.locate("page", viewer, target).await?;
        let rows = self.row_limit(viewer).await?;

        let key = self
            .key(Namespace::PageData, viewer, target)
            .table(table.unwrap_or_default())
            .param("rows", rows);
        let table = table.map(str::to_string);
        let (owner, database, version) =
            (target.owner.clone(), target.dbname.clone(), location.version);
        self.rendered(key, &location, move |reader| {
            let tables = reader.list_tables()?;
            let data = reader.read_table(table.as_deref(), rows, None)?;
            Ok(PageData {
                owner,
                database,
                version,
                tables,
                max_rows: rows,
                data,
            })
        })
        .await
    }

    /// Column names and chartable rows of the selected table
    pub async fn vis_page(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
        table: Option<&str>,
    ) -> Result<VisPageData, DatabaseError> {
        authorize(target, &[("table", table)])?;
        let location = self.locate("vispage", viewer, target).await?;
        let rows = self.limits.vis_page_rows;

        let key = self
            .key(Namespace::VisPage, viewer, target)
            .table(table.unwrap_or_default())
            .param("rows", rows);
        let table = table.map(str::to_string);
        let (owner, database, version) =
            (target.owner.clone(), target.dbname.clone(), location.version);
        self.rendered(key, &location, move |reader| {
            let tables = reader.list_tables()?;
            let selected = reader.validate_table(table.as_deref())?;
            let col_names = reader.columns(&selected)?;
            let mut data = reader.read_rows(&selected, rows, None)?;
            data.total_rows = reader.count_rows(&selected)?;
            Ok(VisPageData {
                owner,
                database,
                version,
                tables,
                col_names,
                data,
            })
        })
        .await
    }

    /// Stream the stored file itself
    pub async fn download(
        &self,
        viewer: &Viewer,
        target: &DatabaseTarget,
    ) -> Result<Download, DatabaseError> {
        authorize(target, &[])?;
        let location = self.locate("download", viewer, target).await?;
        let stream = self.store.get(&location.bucket, &location.object_id).await?;

        Ok(Download {
            filename: target.dbname.clone(),
            version: location.version,
            size: location.size,
            stream,
        })
    }

    /// Databases of `owner` the viewer may see. The owner also sees private
    /// ones; everyone else gets the newest public version of each.
    pub async fn user_databases(
        &self,
        viewer: &Viewer,
        owner: &str,
    ) -> Result<Vec<DatabaseSummary>, DatabaseError> {
        validate_username(owner)?;
        if self.metadata.user_bucket(owner).await?.is_none() {
            return Err(DatabaseError::NotFound(format!("user '{}'", owner)));
        }
        self.metadata
            .list_databases(owner, viewer.is_owner(owner))
            .await
    }

    fn key(&self, namespace: Namespace, viewer: &Viewer, target: &DatabaseTarget) -> CacheKeyBuilder {
        let builder = match viewer.username() {
            Some(user) if user == target.owner => CacheKey::private(namespace, user),
            _ => CacheKey::public(namespace),
        };
        builder
            .owner(&target.owner)
            .database(&target.dbname)
            .version(target.version)
    }

    async fn locate(
        &self,
        endpoint: &'static str,
        viewer: &Viewer,
        target: &DatabaseTarget,
    ) -> Result<ObjectLocation, DatabaseError> {
        let key = self
            .key(Namespace::Location, viewer, target)
            .param("endpoint", endpoint)
            .build();
        if let Some(location) = self.cache.get::<ObjectLocation>(&key).await {
            return Ok(location);
        }

        let stored = self
            .resolver
            .resolve(&target.owner, &target.dbname, target.version, viewer)
            .await?;
        let location = ObjectLocation::from(&stored);
        self.remember(&key, &location, self.location_ttl).await;
        Ok(location)
    }

    async fn row_limit(&self, viewer: &Viewer) -> Result<u32, DatabaseError> {
        match viewer.username() {
            None => Ok(self.limits.anonymous_rows),
            Some(user) => Ok(self
                .limits
                .clamp_pref(self.metadata.pref_max_rows(user).await?)),
        }
    }

    /// Serve from the rendered cache, or fetch the object and run `read`
    /// against a local copy. The object id is part of the key so a new
    /// version never reuses an older version's entry.
    async fn rendered<T, F>(
        &self,
        key: CacheKeyBuilder,
        location: &ObjectLocation,
        read: F,
    ) -> Result<T, DatabaseError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(&SqliteReader) -> Result<T, ReaderError> + Send + 'static,
    {
        let key = key.param("object", &location.object_id).build();
        if let Some(hit) = self.cache.get::<T>(&key).await {
            return Ok(hit);
        }

        let stream = self.store.get(&location.bucket, &location.object_id).await?;
        let file = MaterializedFile::from_stream(stream).await?;
        debug!(
            "Reading {}/{} ({} bytes) for {}",
            location.bucket,
            location.object_id,
            file.size(),
            key
        );
        let value = file.read(read).await?;

        self.remember(&key, &value, self.cache_ttl).await;
        Ok(value)
    }

    async fn remember<T: Serialize + Sync>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if let Err(e) = self.cache.put(key, value, ttl).await {
            warn!("Failed to cache {}: {}", key, e);
        }
    }
}

/// Shape checks that run before any lookup
fn authorize(
    target: &DatabaseTarget,
    fields: &[(&'static str, Option<&str>)],
) -> Result<(), DatabaseError> {
    validate_owner_and_db(&target.owner, &target.dbname)?;
    if let Some(version) = target.version {
        if version < 1 {
            return Err(DatabaseError::BadRequest(
                "version must be a positive number".to_string(),
            ));
        }
    }
    for &(field, value) in fields {
        if let Some(value) = value {
            validate_field(field, value)?;
        }
    }
    Ok(())
}
