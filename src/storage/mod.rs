//! File storage
//!
//! The storage contract every backend implements, and the local filesystem
//! backend that ships with the server.

pub mod chunked;
pub mod content_type;
pub mod local;
pub mod validation;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::config::{StorageConfig, StorageType};
use crate::error::StorageError;

pub use chunked::CHUNK_SIZE;
pub use content_type::content_type_for;
pub use local::LocalStorage;
pub use validation::validate_name;

/// Lazily produced file content, one chunk per item.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A file being uploaded: its requested name and the source of its bytes.
pub struct IncomingFile<'a> {
    pub name: String,
    pub source: &'a mut (dyn AsyncRead + Unpin + Send),
}

impl<'a> IncomingFile<'a> {
    pub fn new(name: impl Into<String>, source: &'a mut (dyn AsyncRead + Unpin + Send)) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// An opened stored file, ready to be streamed to a client.
///
/// `content_type` and `size` are known before the first chunk is produced.
/// The stream is single-pass; reading the file again takes another `get`.
pub struct Download {
    pub stream: ByteStream,
    pub content_type: String,
    pub size: u64,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Capability set every storage backend provides.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist an incoming file and return the name it is stored under.
    ///
    /// Fails with `InvalidArgument` for an unusable name and `AlreadyExists`
    /// when the name is taken. Existing files are never overwritten.
    async fn save(&self, file: IncomingFile<'_>) -> Result<String, StorageError>;

    /// Open a stored file for streaming.
    ///
    /// Fails with `InvalidArgument` for an unusable name and `NotFound` when
    /// no such file is stored.
    async fn get(&self, name: &str) -> Result<Download, StorageError>;

    /// Names of all stored files, in no particular order.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Remove a stored file. Returns `false` if there was nothing to remove.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;
}

/// Build the backend selected by the storage configuration.
pub async fn open_backend(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config.storage_type {
        StorageType::Local => {
            let storage = LocalStorage::new(&config.storage_path).await?;
            Ok(Arc::new(storage))
        }
    }
}
