use std::fmt;

use sha2::{Digest, Sha256};

use super::error::StorageError;

/// Longest file extension carried on a stored name.
const MAX_EXTENSION_LEN: usize = 10;

/// A validated attachment reference: the SHA-256 of the content plus the
/// (sanitized) extension of the uploaded file.
///
/// The string form `"<64 hex chars>[.ext]"` is what callers persist as an
/// attribute value and later hand back to the store. Keeping the extension
/// in the name lets the download path guess a content type without a
/// metadata lookup.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StoredName {
    hash: [u8; 32],
    ext: Option<String>,
}

impl StoredName {
    /// Derive the stored name for the given content and original filename.
    pub fn for_content(data: &[u8], original_name: &str) -> Self {
        let hash = Sha256::digest(data);
        Self {
            hash: hash.into(),
            ext: sanitize_extension(original_name),
        }
    }

    /// Construct from raw SHA-256 bytes and an already-sanitized extension.
    pub fn from_parts(hash: [u8; 32], ext: Option<String>) -> Self {
        Self { hash, ext }
    }

    /// Parse a stored name string of the form `"<64 hex chars>[.ext]"`.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let (hex_part, ext) = match s.split_once('.') {
            Some((hex_part, ext)) => (hex_part, Some(ext)),
            None => (s, None),
        };

        if hex_part.len() != 64 {
            return Err(StorageError::InvalidName(format!(
                "expected 64 hex characters, got {}",
                hex_part.len()
            )));
        }

        let bytes = hex::decode(hex_part)
            .map_err(|e| StorageError::InvalidName(format!("invalid hex: {e}")))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidName("decoded to wrong length".into()))?;

        let ext = match ext {
            Some(e) if is_valid_extension(e) => Some(e.to_string()),
            Some(e) => {
                return Err(StorageError::InvalidName(format!("invalid extension: {e}")));
            }
            None => None,
        };

        Ok(Self { hash, ext })
    }

    /// The file extension, if the uploaded file had a usable one.
    pub fn extension(&self) -> Option<&str> {
        self.ext.as_deref()
    }

    /// First 2 hex characters (shard directory in the filesystem layout).
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.hash[..1])
    }

    /// Remaining 62 hex characters plus extension (filename within shard).
    pub fn shard_suffix(&self) -> String {
        match &self.ext {
            Some(ext) => format!("{}.{ext}", hex::encode(&self.hash[1..])),
            None => hex::encode(&self.hash[1..]),
        }
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.hash))?;
        if let Some(ext) = &self.ext {
            write!(f, ".{ext}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoredName({self})")
    }
}

fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extract a safe lowercase extension from an uploaded filename.
fn sanitize_extension(original_name: &str) -> Option<String> {
    let ext = original_name.rsplit_once('.')?.1.to_ascii_lowercase();
    is_valid_extension(&ext).then_some(ext)
}
