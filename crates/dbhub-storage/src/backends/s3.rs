//! S3/MinIO object store backend

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Region, SharedCredentialsProvider};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::error::StorageError;
use crate::store::{ObjectStore, ObjectStream};

/// Connection settings for an S3-compatible server
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint for MinIO/S3-compatible storage
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

/// Object store backed by an S3-compatible server
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(settings: &S3Settings) -> Result<Self, StorageError> {
        debug!("Creating S3 client for region: {}", settings.region);

        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "dbhub-storage",
        );
        let region_provider =
            RegionProviderChain::first_try(Region::new(settings.region.clone()));

        let mut config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .credentials_provider(SharedCredentialsProvider::new(credentials));

        if let Some(ep) = settings.endpoint.as_deref() {
            config_builder = config_builder.endpoint_url(ep);
        }

        let config = config_builder.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);

        // Force path-style addressing for MinIO compatibility
        if settings.endpoint.is_some() {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        // Fail at startup rather than on the first request
        client
            .list_buckets()
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!(
            "Object store reachable at {}",
            settings.endpoint.as_deref().unwrap_or("default AWS endpoint")
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, id: &str) -> Result<ObjectStream, StorageError> {
        debug!("GET {}/{}", bucket, id);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                {
                    StorageError::not_found(bucket, id)
                } else {
                    error!("Failed to fetch {}/{}: {}", bucket, id, e);
                    StorageError::S3(e.to_string())
                }
            })?;

        let reader = response.body.into_async_read();
        Ok(tokio_util::io::ReaderStream::new(reader).boxed())
    }

    async fn put(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let size = body.len() as u64;
        debug!("PUT {}/{} ({} bytes, {})", bucket, id, size, content_type);

        self.client
            .put_object()
            .bucket(bucket)
            .key(id)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        Ok(size)
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        info!("Creating bucket {}", bucket);
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        Ok(())
    }
}
