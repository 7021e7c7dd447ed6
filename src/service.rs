//! File service
//!
//! The entry point the protocol layer uses to reach storage. It forwards each
//! call to the configured backend and returns results and errors unchanged,
//! so the backend can be swapped without touching protocol code.

use std::sync::Arc;

use crate::error::StorageError;
use crate::storage::{Download, IncomingFile, Storage};

#[derive(Clone)]
pub struct FileService {
    storage: Arc<dyn Storage>,
}

impl FileService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn upload_file(&self, file: IncomingFile<'_>) -> Result<String, StorageError> {
        self.storage.save(file).await
    }

    pub async fn download_file(&self, name: &str) -> Result<Download, StorageError> {
        self.storage.get(name).await
    }

    pub async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        self.storage.list().await
    }

    pub async fn delete_file(&self, name: &str) -> Result<bool, StorageError> {
        self.storage.delete(name).await
    }
}
