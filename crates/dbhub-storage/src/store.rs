use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::StorageError;

/// Body of a stored object.
///
/// The underlying read handle is released when the stream is dropped, which
/// happens on every exit path of the consumer.
pub type ObjectStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a stored object for reading
    async fn get(&self, bucket: &str, id: &str) -> Result<ObjectStream, StorageError>;

    /// Store an object durably, returning the number of bytes written
    async fn put(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<u64, StorageError>;

    /// Create the bucket if it does not exist yet
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;
}

/// Drain an object stream into memory.
pub async fn read_to_end(mut stream: ObjectStream) -> Result<Bytes, StorageError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
