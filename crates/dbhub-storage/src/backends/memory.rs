//! In-process object store for local development and tests

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageError;
use crate::store::{ObjectStore, ObjectStream};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn content_type(&self, bucket: &str, id: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), id.to_string()))
            .map(|o| o.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, id: &str) -> Result<ObjectStream, StorageError> {
        debug!("GET {}/{}", bucket, id);
        let objects = self.objects.read().await;
        let object = objects
            .get(&(bucket.to_string(), id.to_string()))
            .ok_or_else(|| StorageError::not_found(bucket, id))?;

        let body = object.body.clone();
        Ok(futures::stream::once(async move { Ok(body) }).boxed())
    }

    async fn put(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let size = body.len() as u64;
        debug!("PUT {}/{} ({} bytes)", bucket, id, size);
        self.objects.write().await.insert(
            (bucket.to_string(), id.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(size)
    }

    async fn ensure_bucket(&self, _bucket: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::read_to_end;

    #[tokio::test]
    async fn test_put_then_get_returns_same_bytes() {
        let store = MemoryObjectStore::new();
        let body = Bytes::from_static(b"SQLite format 3\0rest");

        let size = store
            .put("alice", "abc12345.db", body.clone(), "application/x-sqlite3")
            .await
            .unwrap();
        assert_eq!(size, body.len() as u64);

        let stream = store.get("alice", "abc12345.db").await.unwrap();
        assert_eq!(read_to_end(stream).await.unwrap(), body);
        assert_eq!(
            store.content_type("alice", "abc12345.db").await.as_deref(),
            Some("application/x-sqlite3")
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        match store.get("alice", "missing.db").await {
            Err(StorageError::NotFound { bucket, id }) => {
                assert_eq!(bucket, "alice");
                assert_eq!(id, "missing.db");
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[tokio::test]
    async fn test_buckets_are_separate_namespaces() {
        let store = MemoryObjectStore::new();
        store
            .put("alice", "same.db", Bytes::from_static(b"a"), "application/x-sqlite3")
            .await
            .unwrap();

        assert!(store.get("bob", "same.db").await.is_err());
        assert_eq!(store.len().await, 1);
    }
}
