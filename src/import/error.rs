use thiserror::Error;
use uuid::Uuid;

use crate::{model::DatabaseError, storage::StorageError};

pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Problems with the uploaded file itself. Nothing has been written when one
/// of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum ImportValidationError {
    #[error("No file provided")]
    NoFile,
    #[error("File is too large: {size} bytes, at most {max} bytes are accepted")]
    TooLarge { size: usize, max: usize },
    #[error("Unsupported file type `{content_type}`, expected a CSV file")]
    UnsupportedFileType { content_type: String },
    #[error("File is not valid UTF-8 text")]
    NotUtf8,
    #[error("Invalid CSV format: {0}")]
    Malformed(String),
    #[error("CSV must contain headers and at least one data row")]
    MissingRows,
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Invalid CSV format: row {row} must have exactly 9 columns, found {found}")]
    ColumnCount { row: usize, found: usize },
    #[error("Invalid CSV format: row {row} has an empty {field}")]
    EmptyField { row: usize, field: &'static str },
    #[error("Correct answer must be A, B, C, or D (row {row}, found `{found}`)")]
    InvalidAnswer { row: usize, found: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Validation(#[from] ImportValidationError),
    #[error("{0}")]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("quiz deck {0} not found")]
    DeckNotFound(Uuid),
}

impl From<sqlx::Error> for ImportError {
    fn from(value: sqlx::Error) -> Self {
        Self::Database(DatabaseError::from(value))
    }
}
