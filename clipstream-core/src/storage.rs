//! Media object storage
//!
//! Flat-directory blob store: one file per object, named `<video_id>.mp4`,
//! no subdirectory sharding. Ingest writes land in a hidden staging file and
//! become visible only through an atomic rename, so a stored object is never
//! partially visible.

use std::path::{Path, PathBuf};

use nanoid::nanoid;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::VideoId;

/// Fixed extension for stored objects
pub const OBJECT_EXT: &str = "mp4";

const STAGING_SUFFIX: &str = ".part";

/// Completed, durably stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: VideoId,
    pub byte_length: u64,
    pub location: PathBuf,
}

/// Flat-directory media store
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a committed object lives at
    #[must_use]
    pub fn object_path(&self, id: &VideoId) -> PathBuf {
        self.root.join(format!("{}.{OBJECT_EXT}", id.as_str()))
    }

    /// Create the root directory and sweep staging files left by a crash
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let mut swept = 0usize;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| n.ends_with(STAGING_SUFFIX)) {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Failed to sweep stale staging file"
                    );
                } else {
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            info!(swept, root = %self.root.display(), "Removed stale staging files");
        }

        Ok(())
    }

    /// Open a staging file for a new ingest of `id`
    ///
    /// Each call gets its own staging file, so concurrent ingests of the same
    /// id never interleave writes; the last commit wins.
    pub async fn begin(&self, id: VideoId) -> Result<StagingObject> {
        fs::create_dir_all(&self.root).await?;

        let staging_path = self
            .root
            .join(format!(".{}.{}{STAGING_SUFFIX}", id.as_str(), nanoid!(8)));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)
            .await?;
        debug!(video_id = %id, path = %staging_path.display(), "Staging file opened");

        Ok(StagingObject {
            file,
            staging_path,
            final_path: self.object_path(&id),
            id,
            bytes_written: 0,
            committed: false,
        })
    }

    /// Open a stored object for reading, returning the handle and its length
    pub async fn open(&self, id: &VideoId) -> Result<(File, u64)> {
        let path = self.object_path(id);
        let file = File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound("Video not found".to_string()),
            _ => Error::Storage(e),
        })?;
        let byte_length = file.metadata().await?.len();
        Ok((file, byte_length))
    }

    /// Whether a committed object exists for `id`
    pub async fn exists(&self, id: &VideoId) -> bool {
        fs::metadata(self.object_path(id)).await.is_ok()
    }
}

/// In-flight ingest target
///
/// Appends go to a hidden staging file; [`StagingObject::commit`] makes the
/// object visible atomically. Dropping an uncommitted staging object deletes
/// the staging file, so an abandoned ingest leaves nothing behind.
#[derive(Debug)]
pub struct StagingObject {
    file: File,
    staging_path: PathBuf,
    final_path: PathBuf,
    id: VideoId,
    bytes_written: u64,
    committed: bool,
}

impl StagingObject {
    #[must_use]
    pub fn id(&self) -> &VideoId {
        &self.id
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append a chunk payload in arrival order
    pub async fn append(&mut self, payload: &[u8]) -> Result<()> {
        self.file.write_all(payload).await?;
        self.bytes_written += payload.len() as u64;
        Ok(())
    }

    /// Flush, sync, and atomically rename into the final location
    pub async fn commit(mut self) -> Result<StoredObject> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.staging_path, &self.final_path).await?;
        self.committed = true;
        info!(video_id = %self.id, bytes = self.bytes_written, "Object committed");

        Ok(StoredObject {
            id: self.id.clone(),
            byte_length: self.bytes_written,
            location: self.final_path.clone(),
        })
    }
}

impl Drop for StagingObject {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.staging_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %self.staging_path.display(),
                        error = %e,
                        "Failed to remove staging file"
                    );
                }
            }
        }
    }
}
