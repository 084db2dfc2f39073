use thiserror::Error;

use crate::storage::StorageError;

pub type UploadResult<T> = std::result::Result<T, UploadError>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported content type `{0}`, expected application/pdf or video/*")]
    UnsupportedContentType(String),
    #[error("file is too large: {size} bytes, at most {max} bytes are accepted")]
    TooLarge { size: u64, max: u64 },
    #[error("part number {0} is outside 1..=10000")]
    InvalidPartNumber(i32),
    #[error("no parts to complete")]
    NoParts,
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// True when the request itself is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(
                e,
                StorageError::NoSuchUpload(_) | StorageError::InvalidPart(_) | StorageError::NotFound(_)
            ),
            Self::NotFound(_) => false,
            _ => true,
        }
    }
}
