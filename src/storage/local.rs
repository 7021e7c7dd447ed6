//! Local filesystem backend
//!
//! Stores every file as a direct child of a single root directory. Uploads
//! are staged in a hidden `.partial` directory and published with a hard
//! link, which fails if the target name already exists. That makes
//! publication atomic and first-writer-wins, and a half-written upload is
//! never visible under its final name.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::StorageError;
use crate::storage::chunked::{CopyStats, copy_chunked, file_chunks};
use crate::storage::content_type::content_type_for;
use crate::storage::validation::validate_name;
use crate::storage::{Download, IncomingFile, Storage};

/// Directory under the root holding in-flight uploads
pub const STAGING_DIR: &str = ".partial";

const DELETE_RETRIES: u32 = 3;

static STAGED_UPLOADS: AtomicU64 = AtomicU64::new(0);

/// Storage backend rooted at a local directory
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    staging: PathBuf,
}

impl LocalStorage {
    /// Open (creating if needed) the storage root.
    ///
    /// Leftovers from interrupted uploads in the staging directory are removed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            error!("Failed to create storage root {}: {}", root.display(), e);
            StorageError::from(e)
        })?;

        let staging = root.join(STAGING_DIR);
        match fs::remove_dir_all(&staging).await {
            Ok(()) => debug!("Cleared stale uploads in {}", staging.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir(&staging).await?;

        info!("Storage root: {}", root.display());

        Ok(Self { root, staging })
    }

    /// The directory holding the stored files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn staged_path(&self) -> PathBuf {
        let seq = STAGED_UPLOADS.fetch_add(1, Ordering::Relaxed);
        self.staging
            .join(format!("{}-{}.part", std::process::id(), seq))
    }

    async fn write_staged(
        &self,
        staged: &Path,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> io::Result<CopyStats> {
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staged)
            .await?;

        let stats = copy_chunked(source, &mut out).await?;
        out.flush().await?;
        out.sync_all().await?;

        Ok(stats)
    }
}

/// Whether anything (file, directory, dangling link) occupies `path`
async fn entry_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove staged upload {}: {}", staged.display(), e);
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, file: IncomingFile<'_>) -> Result<String, StorageError> {
        let IncomingFile { name, source } = file;
        validate_name(&name)?;

        let target = self.file_path(&name);
        if entry_exists(&target).await? {
            return Err(StorageError::AlreadyExists(name));
        }

        let staged = self.staged_path();
        let stats = match self.write_staged(&staged, source).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to write upload {} to {}: {}", name, staged.display(), e);
                discard(&staged).await;
                return Err(e.into());
            }
        };

        let published = fs::hard_link(&staged, &target).await;
        discard(&staged).await;

        match published {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!("Lost upload race for {}: name was taken while writing", name);
                return Err(StorageError::AlreadyExists(name));
            }
            Err(e) => {
                error!("Failed to publish upload {} to {}: {}", name, target.display(), e);
                return Err(e.into());
            }
        }

        info!(
            "Saved file {} ({} bytes in {} chunks)",
            name, stats.bytes, stats.chunks
        );

        Ok(name)
    }

    async fn get(&self, name: &str) -> Result<Download, StorageError> {
        validate_name(name)?;

        let path = self.file_path(name);
        // Symlinks are not stored files, same as in `list` and `delete`
        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let size = metadata.len();
        let content_type = content_type_for(name);
        debug!("Opened {} for download ({} bytes, {})", name, size, content_type);

        Ok(Download {
            stream: Box::pin(file_chunks(path)),
            content_type,
            size,
        })
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!("Skipping stored file with non UTF-8 name {:?}", raw),
            }
        }

        debug!("Listed {} stored files", names.len());
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        if validate_name(name).is_err() {
            return Ok(false);
        }

        let path = self.file_path(name);
        match fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        // Retry briefly when another handle still holds the file
        let mut attempt = 1;
        loop {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Deleted file {}", name);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e)
                    if e.kind() == io::ErrorKind::PermissionDenied && attempt < DELETE_RETRIES =>
                {
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Failed to delete file {} ({}): {}", name, path.display(), e);
                    return Err(e.into());
                }
            }
        }
    }
}
