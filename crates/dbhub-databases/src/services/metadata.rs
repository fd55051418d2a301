//! Metadata store lookups for stored database versions

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dbhub_core::DBDateTime;
use dbhub_database::DbConnection;
use dbhub_entities::{database_versions, databases, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::DatabaseError;

/// One stored version of a database and where its bytes live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub owner: String,
    pub dbname: String,
    pub version: i32,
    pub bucket: String,
    pub object_id: String,
    pub size: i64,
    pub sha256: String,
    pub public: bool,
    pub last_modified: DBDateTime,
}

impl StoredObject {
    fn from_models(database: &databases::Model, version: database_versions::Model) -> Self {
        Self {
            owner: database.username.clone(),
            dbname: database.dbname.clone(),
            version: version.version,
            bucket: database.minio_bucket.clone(),
            object_id: version.minio_id,
            size: version.size,
            sha256: version.sha256,
            public: version.public,
            last_modified: version.last_modified,
        }
    }
}

/// One entry of a user's database list: the newest version the viewer may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DatabaseSummary {
    #[schema(example = "Marine Litter.sqlite")]
    pub database: String,
    pub version: i32,
    pub size: i64,
    pub public: bool,
    #[schema(value_type = String, format = DateTime)]
    pub last_modified: DBDateTime,
}

/// A version about to be recorded. The object must already be stored.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub owner: String,
    pub dbname: String,
    pub bucket: String,
    pub object_id: String,
    pub size: i64,
    pub sha256: String,
    pub public: bool,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Highest version of (owner, dbname), optionally restricted to public ones
    async fn latest_version(
        &self,
        owner: &str,
        dbname: &str,
        include_private: bool,
    ) -> Result<Option<StoredObject>, DatabaseError>;

    /// One exact version, regardless of visibility
    async fn version(
        &self,
        owner: &str,
        dbname: &str,
        version: i32,
    ) -> Result<Option<StoredObject>, DatabaseError>;

    /// Stored rows-per-page preference of a user
    async fn pref_max_rows(&self, username: &str) -> Result<Option<i32>, DatabaseError>;

    /// Bucket holding a user's files
    async fn user_bucket(&self, username: &str) -> Result<Option<String>, DatabaseError>;

    /// Every database of `owner` with its highest version, most recently
    /// modified first. Databases without a matching version are left out.
    async fn list_databases(
        &self,
        owner: &str,
        include_private: bool,
    ) -> Result<Vec<DatabaseSummary>, DatabaseError>;

    /// Record the next version of (owner, dbname) as `highest + 1`, creating
    /// the database row on first upload. All rows are written atomically.
    async fn record_version(&self, new: NewVersion) -> Result<StoredObject, DatabaseError>;
}

pub struct SeaOrmMetadataStore {
    db: Arc<DbConnection>,
}

impl SeaOrmMetadataStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

async fn find_database<C: ConnectionTrait>(
    conn: &C,
    owner: &str,
    dbname: &str,
) -> Result<Option<databases::Model>, DbErr> {
    databases::Entity::find()
        .filter(databases::Column::Username.eq(owner))
        .filter(databases::Column::Dbname.eq(dbname))
        .one(conn)
        .await
}

fn is_unique_violation(error: &DbErr) -> bool {
    matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Run `attempt`, running it once more if it lost a race on a unique index.
/// A second lost race is reported as a conflict.
async fn retry_on_conflict<T, F, Fut>(what: &str, mut attempt: F) -> Result<T, DatabaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    match attempt().await {
        Err(e) if is_unique_violation(&e) => {
            warn!("Concurrent write to {}, retrying: {}", what, e);
        }
        other => return Ok(other?),
    }
    match attempt().await {
        Err(e) if is_unique_violation(&e) => Err(DatabaseError::Conflict(format!(
            "{} was modified by another request, please try again",
            what
        ))),
        other => Ok(other?),
    }
}

impl SeaOrmMetadataStore {
    async fn try_record(&self, new: &NewVersion) -> Result<StoredObject, DbErr> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let database = match find_database(&txn, &new.owner, &new.dbname).await? {
            Some(database) => database,
            None => {
                databases::ActiveModel {
                    username: Set(new.owner.clone()),
                    folder: Set("/".to_string()),
                    dbname: Set(new.dbname.clone()),
                    minio_bucket: Set(new.bucket.clone()),
                    last_modified: Set(now),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        let highest = database_versions::Entity::find()
            .filter(database_versions::Column::DbId.eq(database.id))
            .order_by_desc(database_versions::Column::Version)
            .one(&txn)
            .await?
            .map(|v| v.version)
            .unwrap_or(0);

        let version = database_versions::ActiveModel {
            db_id: Set(database.id),
            version: Set(highest + 1),
            size: Set(new.size),
            sha256: Set(new.sha256.clone()),
            public: Set(new.public),
            minio_id: Set(new.object_id.clone()),
            last_modified: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut touched: databases::ActiveModel = database.into();
        touched.last_modified = Set(now);
        let database = touched.update(&txn).await?;

        txn.commit().await?;
        Ok(StoredObject::from_models(&database, version))
    }
}

#[async_trait]
impl MetadataStore for SeaOrmMetadataStore {
    async fn latest_version(
        &self,
        owner: &str,
        dbname: &str,
        include_private: bool,
    ) -> Result<Option<StoredObject>, DatabaseError> {
        let Some(database) = find_database(self.db.as_ref(), owner, dbname).await? else {
            return Ok(None);
        };

        let mut query = database_versions::Entity::find()
            .filter(database_versions::Column::DbId.eq(database.id));
        if !include_private {
            query = query.filter(database_versions::Column::Public.eq(true));
        }

        let latest = query
            .order_by_desc(database_versions::Column::Version)
            .one(self.db.as_ref())
            .await?;

        Ok(latest.map(|v| StoredObject::from_models(&database, v)))
    }

    async fn version(
        &self,
        owner: &str,
        dbname: &str,
        version: i32,
    ) -> Result<Option<StoredObject>, DatabaseError> {
        let Some(database) = find_database(self.db.as_ref(), owner, dbname).await? else {
            return Ok(None);
        };

        let found = database_versions::Entity::find()
            .filter(database_versions::Column::DbId.eq(database.id))
            .filter(database_versions::Column::Version.eq(version))
            .one(self.db.as_ref())
            .await?;

        Ok(found.map(|v| StoredObject::from_models(&database, v)))
    }

    async fn pref_max_rows(&self, username: &str) -> Result<Option<i32>, DatabaseError> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;
        Ok(user.map(|u| u.pref_max_rows))
    }

    async fn user_bucket(&self, username: &str) -> Result<Option<String>, DatabaseError> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;
        Ok(user.map(|u| u.minio_bucket))
    }

    async fn list_databases(
        &self,
        owner: &str,
        include_private: bool,
    ) -> Result<Vec<DatabaseSummary>, DatabaseError> {
        let owned = databases::Entity::find()
            .filter(databases::Column::Username.eq(owner))
            .all(self.db.as_ref())
            .await?;
        if owned.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = database_versions::Entity::find().filter(
            database_versions::Column::DbId.is_in(owned.iter().map(|db| db.id).collect::<Vec<_>>()),
        );
        if !include_private {
            query = query.filter(database_versions::Column::Public.eq(true));
        }
        let mut latest: HashMap<i32, database_versions::Model> = HashMap::new();
        for version in query.all(self.db.as_ref()).await? {
            let newer = latest
                .get(&version.db_id)
                .map_or(true, |seen| version.version > seen.version);
            if newer {
                latest.insert(version.db_id, version);
            }
        }

        // Timestamps come from the listed version so a newer private upload
        // does not show through to other viewers
        let mut listed: Vec<DatabaseSummary> = owned
            .into_iter()
            .filter_map(|db| {
                latest.remove(&db.id).map(|v| DatabaseSummary {
                    database: db.dbname,
                    version: v.version,
                    size: v.size,
                    public: v.public,
                    last_modified: v.last_modified,
                })
            })
            .collect();
        listed.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.database.cmp(&b.database))
        });
        Ok(listed)
    }

    async fn record_version(&self, new: NewVersion) -> Result<StoredObject, DatabaseError> {
        let what = format!("{}/{}", new.owner, new.dbname);
        let stored = retry_on_conflict(&what, || self.try_record(&new)).await?;
        info!("Recorded {} version {}", what, stored.version);
        Ok(stored)
    }
}
