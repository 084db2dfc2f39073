//! Quiz deck ingestion from CSV files.

mod error;
pub use error::{ImportError, ImportResult, ImportValidationError};

mod parser;
pub use parser::{EXPECTED_HEADERS, ProcessedChoice, ProcessedQuizRow, parse_quiz_csv};

mod pipeline;
pub use pipeline::{
    AttachSummary, CsvUpload, ImportResponse, ImportSummary, QuizImporter, check_file_type,
    csv_object_key,
};
