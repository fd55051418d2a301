use std::sync::Arc;

use dbhub_core::Viewer;
use tracing::debug;

use super::metadata::{MetadataStore, StoredObject};
use crate::error::DatabaseError;

/// Maps (owner, database, version) to a stored object for a given viewer.
///
/// The owner sees every version; everyone else only public ones. With no
/// version requested, the highest visible version wins.
pub struct ObjectResolver {
    metadata: Arc<dyn MetadataStore>,
}

impl ObjectResolver {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn resolve(
        &self,
        owner: &str,
        dbname: &str,
        version: Option<i32>,
        viewer: &Viewer,
    ) -> Result<StoredObject, DatabaseError> {
        let is_owner = viewer.is_owner(owner);

        let resolved = match version {
            None => self
                .metadata
                .latest_version(owner, dbname, is_owner)
                .await?
                .ok_or_else(|| DatabaseError::NotFound("database".to_string()))?,
            Some(version) => match self.metadata.version(owner, dbname, version).await? {
                Some(stored) if stored.public || is_owner => stored,
                Some(_) => return Err(DatabaseError::Forbidden),
                None => return Err(DatabaseError::NotFound("database version".to_string())),
            },
        };

        debug!(
            "Resolved {}/{} (requested {:?}) to version {} at {}/{}",
            owner, dbname, version, resolved.version, resolved.bucket, resolved.object_id
        );
        Ok(resolved)
    }
}
