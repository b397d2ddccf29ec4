use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::name::StoredName;
use super::traits::AttachmentStore;

/// Filesystem-backed attachment store.
///
/// Attachments are stored in a sharded directory layout:
/// `{base_path}/{first 2 hex chars}/{remaining 62 hex chars}[.ext]`
pub struct FilesystemAttachmentStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemAttachmentStore {
    /// Create a new filesystem attachment store rooted at `base_path`.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn attachment_path(&self, name: &StoredName) -> PathBuf {
        self.base_path
            .join(name.shard_prefix())
            .join(name.shard_suffix())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl AttachmentStore for FilesystemAttachmentStore {
    async fn put(&self, data: &[u8], original_name: &str) -> Result<StoredName, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let name = StoredName::for_content(data, original_name);
        let path = self.attachment_path(&name);

        if path.exists() {
            return Ok(name);
        }

        // Write to a temp file first so a concurrent reader never observes
        // a partially-written attachment.
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(name)
    }

    async fn get(&self, name: &StoredName) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.attachment_path(name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &StoredName) -> Result<bool, StorageError> {
        Ok(fs::try_exists(&self.attachment_path(name)).await?)
    }

    async fn delete(&self, name: &StoredName) -> Result<bool, StorageError> {
        match fs::remove_file(self.attachment_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, name: &StoredName) -> Result<u64, StorageError> {
        match fs::metadata(self.attachment_path(name)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
