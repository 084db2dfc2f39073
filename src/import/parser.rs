//! Quiz CSV parsing and row validation.
//!
//! Layout, one quiz card per row:
//!
//! ```text
//! question,choice a,choice b,choice c,choice d,correct answer,explanation,item score,sequence
//! ```
//!
//! Fields are read by position. The header only has to contain every
//! expected column name (case-insensitive).

use csv::{ReaderBuilder, StringRecord, Trim};

use super::ImportValidationError;

pub const EXPECTED_HEADERS: [&str; 9] = [
    "question",
    "choice a",
    "choice b",
    "choice c",
    "choice d",
    "correct answer",
    "explanation",
    "item score",
    "sequence",
];

const LETTERS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedChoice {
    pub choice: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedQuizRow {
    pub question: String,
    pub explanation: String,
    pub item_score: f64,
    pub sequence: i32,
    /// Always A, B, C, D in that order, exactly one correct.
    pub choices: [ProcessedChoice; 4],
}

pub fn parse_quiz_csv(text: &str) -> Result<Vec<ProcessedQuizRow>, ImportValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ImportValidationError::Malformed(e.to_string()))?;
        if is_blank(&record) {
            continue;
        }
        records.push(record);
    }

    if records.len() < 2 {
        return Err(ImportValidationError::MissingRows);
    }

    check_headers(&records[0])?;

    records[1..]
        .iter()
        .enumerate()
        .map(|(i, record)| validate_row(i + 1, record))
        .collect()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) && record.len() <= 1
}

fn check_headers(header: &StringRecord) -> Result<(), ImportValidationError> {
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let missing: Vec<String> = EXPECTED_HEADERS
        .iter()
        .filter(|expected| !normalized.iter().any(|h| h == *expected))
        .map(|expected| expected.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportValidationError::MissingColumns(missing))
    }
}

/// `row` is the 1-based data row number, header excluded.
fn validate_row(row: usize, record: &StringRecord) -> Result<ProcessedQuizRow, ImportValidationError> {
    if record.len() != EXPECTED_HEADERS.len() {
        return Err(ImportValidationError::ColumnCount {
            row,
            found: record.len(),
        });
    }

    let field = |i: usize| record.get(i).unwrap_or_default().trim();

    for (i, name) in [(0, "question"), (1, "choice a"), (2, "choice b"), (3, "choice c"), (4, "choice d")] {
        if field(i).is_empty() {
            return Err(ImportValidationError::EmptyField { row, field: name });
        }
    }

    let answer = field(5).to_uppercase();
    let correct = LETTERS
        .iter()
        .position(|l| *l == answer)
        .ok_or_else(|| ImportValidationError::InvalidAnswer {
            row,
            found: field(5).to_string(),
        })?;

    let choices = [1, 2, 3, 4].map(|i| ProcessedChoice {
        choice: field(i).to_string(),
        is_correct: i - 1 == correct,
    });

    Ok(ProcessedQuizRow {
        question: field(0).to_string(),
        explanation: field(6).to_string(),
        item_score: parse_item_score(field(7)),
        sequence: parse_sequence(field(8)),
        choices,
    })
}

/// Positive finite number, 1 otherwise. Trailing garbage after a numeric
/// prefix is ignored (`"2pts"` is 2).
pub fn parse_item_score(raw: &str) -> f64 {
    match leading_float(raw) {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 1.0,
    }
}

/// Positive integer, 1 otherwise. Only the leading integer part counts, so
/// `"2.0"` is 2 and `"3.7"` is 3.
pub fn parse_sequence(raw: &str) -> i32 {
    match leading_int(raw) {
        Some(v) if v > 0 => v,
        _ => 1,
    }
}

fn leading_int(raw: &str) -> Option<i32> {
    let s = raw.trim();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let digits = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |end| digits_start + end);

    if digits == digits_start {
        return None;
    }
    // out-of-range values fall back to the default like any other garbage
    s[..digits].parse().ok()
}

fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }

    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    (1..=end).rev().find_map(|i| s[..i].parse::<f64>().ok())
}
