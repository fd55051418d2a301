//! Transient local copies of stored database files
//!
//! SQLite needs random access to a real file, so a fetched object is
//! written to a temp file first. The temp file is owned by
//! [`MaterializedFile`] and removed when it is dropped, on every path.

use std::io;
use std::path::Path;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::ReaderError;
use crate::reader::SqliteReader;

pub struct MaterializedFile {
    file: NamedTempFile,
    size: u64,
}

impl MaterializedFile {
    /// Drain `stream` into a new temp file. Empty objects are rejected.
    pub async fn from_stream<S>(mut stream: S) -> Result<Self, ReaderError>
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
    {
        let file = tempfile::Builder::new()
            .prefix("dbhub-")
            .suffix(".db")
            .tempfile()?;

        let mut out = tokio::fs::File::from_std(file.reopen()?);
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        out.flush().await?;
        drop(out);

        if size == 0 {
            return Err(ReaderError::InvalidDatabase("stored object is empty".to_string()));
        }

        debug!("Materialized {} bytes to {}", size, file.path().display());
        Ok(Self { file, size })
    }

    pub async fn from_bytes(bytes: Bytes) -> Result<Self, ReaderError> {
        Self::from_stream(futures::stream::iter(std::iter::once(Ok(bytes)))).await
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Open the file and run `f` against it on the blocking pool. The
    /// connection is closed and the file removed before this returns.
    pub async fn read<F, T>(self, f: F) -> Result<T, ReaderError>
    where
        F: FnOnce(&SqliteReader) -> Result<T, ReaderError> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let result = SqliteReader::open(self.file.path()).and_then(|reader| f(&reader));

            let path = self.file.path().to_path_buf();
            if let Err(e) = self.file.close() {
                warn!("Failed to remove temp file {}: {}", path.display(), e);
            }
            result
        })
        .await
        .map_err(|e| ReaderError::Task(e.to_string()))?
    }
}
