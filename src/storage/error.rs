use thiserror::Error;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("unable to presign request: {0}")]
    Presign(String),
    #[error("storage credentials are unavailable")]
    MissingCredentials,
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("multipart upload not found: {0}")]
    NoSuchUpload(String),
    #[error("invalid part list: {0}")]
    InvalidPart(String),
    #[error("signed request expired")]
    Expired,
    #[error("signed request rejected: {0}")]
    Rejected(String),
}

impl StorageError {
    pub fn backend<E: std::fmt::Display>(error: E) -> Self {
        Self::Backend(error.to_string())
    }
}
