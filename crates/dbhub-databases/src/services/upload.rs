use std::sync::Arc;

use bytes::Bytes;
use dbhub_core::{validate_dbname, Viewer};
use dbhub_sqlite::MaterializedFile;
use dbhub_storage::ObjectStore;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use super::metadata::{MetadataStore, NewVersion, StoredObject};
use crate::error::DatabaseError;

pub const SQLITE_CONTENT_TYPE: &str = "application/x-sqlite3";

const OBJECT_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const OBJECT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub dbname: String,
    pub public: bool,
    pub data: Bytes,
}

/// Stores a new version of a database file.
///
/// The bytes are written to the object store before the metadata rows, so
/// a recorded version always has a backing object.
pub struct UploadService {
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
}

impl UploadService {
    pub fn new(metadata: Arc<dyn MetadataStore>, store: Arc<dyn ObjectStore>) -> Self {
        Self { metadata, store }
    }

    pub async fn upload(
        &self,
        viewer: &Viewer,
        request: UploadRequest,
    ) -> Result<StoredObject, DatabaseError> {
        let owner = viewer.username().ok_or(DatabaseError::Unauthorized)?;
        validate_dbname(&request.dbname)?;
        if request.data.is_empty() {
            return Err(DatabaseError::BadRequest("Uploaded file is empty".to_string()));
        }

        // Must open as SQLite and hold at least one table
        let file = MaterializedFile::from_bytes(request.data.clone()).await?;
        let tables = file.read(|reader| reader.list_tables()).await?;

        let sha256 = hex::encode(Sha256::digest(&request.data));
        let bucket = self
            .metadata
            .user_bucket(owner)
            .await?
            .ok_or(DatabaseError::Unauthorized)?;

        let object_id = random_object_id();
        self.store.ensure_bucket(&bucket).await?;
        let size = self
            .store
            .put(&bucket, &object_id, request.data, SQLITE_CONTENT_TYPE)
            .await?;

        let stored = self
            .metadata
            .record_version(NewVersion {
                owner: owner.to_string(),
                dbname: request.dbname.clone(),
                bucket: bucket.clone(),
                object_id: object_id.clone(),
                size: size as i64,
                sha256,
                public: request.public,
            })
            .await
            .map_err(|e| {
                error!(
                    "Stored {}/{} but failed to record it for {}/{}: {}",
                    bucket, object_id, owner, request.dbname, e
                );
                e
            })?;

        info!(
            "{} uploaded {} version {} ({} bytes, {} tables)",
            owner,
            stored.dbname,
            stored.version,
            size,
            tables.len()
        );
        Ok(stored)
    }
}

/// Random lowercase alphanumeric id with a `.db` suffix
fn random_object_id() -> String {
    let mut rng = rand::thread_rng();
    let id: String = (0..OBJECT_ID_LEN)
        .map(|_| OBJECT_ID_CHARSET[rng.gen_range(0..OBJECT_ID_CHARSET.len())] as char)
        .collect();
    format!("{}.db", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metadata::SeaOrmMetadataStore;
    use crate::test_support::{seed_user, sqlite_file, three_row_db};
    use dbhub_database::test_utils::TestDatabase;
    use dbhub_storage::{read_to_end, MemoryObjectStore};

    async fn setup() -> (TestDatabase, Arc<MemoryObjectStore>, UploadService) {
        let test_db = TestDatabase::new().await.unwrap();
        seed_user(&test_db.db, "alice", 10).await;
        let store = Arc::new(MemoryObjectStore::new());
        let metadata = Arc::new(SeaOrmMetadataStore::new(test_db.connection_arc()));
        let service = UploadService::new(metadata, store.clone());
        (test_db, store, service)
    }

    fn request(data: Bytes) -> UploadRequest {
        UploadRequest {
            dbname: "test.db".into(),
            public: true,
            data,
        }
    }

    #[test]
    fn test_object_id_shape() {
        let id = random_object_id();
        assert_eq!(id.len(), OBJECT_ID_LEN + 3);
        assert!(id.ends_with(".db"));
        assert!(id[..OBJECT_ID_LEN]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_upload_stores_object_then_records_version() {
        let (_db, store, service) = setup().await;
        let data = three_row_db();

        let first = service
            .upload(&Viewer::user("alice"), request(data.clone()))
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.size, data.len() as i64);
        assert_eq!(first.sha256, hex::encode(Sha256::digest(&data)));

        let stored = read_to_end(store.get("alice-bucket", &first.object_id).await.unwrap())
            .await
            .unwrap();
        assert_eq!(stored, data);
        assert_eq!(
            store.content_type("alice-bucket", &first.object_id).await.as_deref(),
            Some(SQLITE_CONTENT_TYPE)
        );

        let second = service
            .upload(&Viewer::user("alice"), request(data))
            .await
            .unwrap();
        assert_eq!(second.version, 2);
        assert_ne!(second.object_id, first.object_id);
    }

    #[tokio::test]
    async fn test_anonymous_upload_is_rejected() {
        let (_db, _store, service) = setup().await;
        let result = service.upload(&Viewer::Anonymous, request(three_row_db())).await;
        assert!(matches!(result, Err(DatabaseError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_invalid_files_store_nothing() {
        let (_db, store, service) = setup().await;

        let empty = service.upload(&Viewer::user("alice"), request(Bytes::new())).await;
        assert!(matches!(empty, Err(DatabaseError::BadRequest(_))));

        let junk = service
            .upload(
                &Viewer::user("alice"),
                request(Bytes::from("not a database ".repeat(100))),
            )
            .await;
        assert!(matches!(junk, Err(DatabaseError::InvalidDatabase(_))));

        let no_tables = service
            .upload(
                &Viewer::user("alice"),
                request(sqlite_file("CREATE TABLE x (a); DROP TABLE x;")),
            )
            .await;
        assert!(matches!(no_tables, Err(DatabaseError::InvalidDatabase(_))));

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_bad_name_is_rejected() {
        let (_db, _store, service) = setup().await;
        let mut bad = request(three_row_db());
        bad.dbname = "../escape.db".into();
        let result = service.upload(&Viewer::user("alice"), bad).await;
        assert!(matches!(result, Err(DatabaseError::BadRequest(_))));
    }
}
