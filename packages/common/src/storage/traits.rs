use async_trait::async_trait;

use super::error::StorageError;
use super::name::StoredName;

/// Content-addressed storage for file-typed attribute payloads.
///
/// Callers persist the returned [`StoredName`] (in string form) as the
/// participant's attribute value; the raw bytes never travel through the
/// registration core.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store an uploaded file and return its stored name.
    ///
    /// Identical content is deduplicated; the original filename only
    /// contributes the extension.
    async fn put(&self, data: &[u8], original_name: &str) -> Result<StoredName, StorageError>;

    /// Retrieve the full content of a stored attachment.
    async fn get(&self, name: &StoredName) -> Result<Vec<u8>, StorageError>;

    /// Check whether an attachment exists.
    async fn exists(&self, name: &StoredName) -> Result<bool, StorageError>;

    /// Delete an attachment.
    ///
    /// Returns `true` if it was deleted, `false` if it did not exist.
    async fn delete(&self, name: &StoredName) -> Result<bool, StorageError>;

    /// Size of a stored attachment in bytes.
    async fn size(&self, name: &StoredName) -> Result<u64, StorageError>;
}
