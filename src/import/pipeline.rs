use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::{ImportError, ImportResult, ImportValidationError, ProcessedQuizRow, parse_quiz_csv};
use crate::model::ModelManager;
use crate::model::entity::{
    Choice, DeckAttachment, NewChoice, NewQuizCard, QuizCard, QuizCardWithChoices, QuizDeck,
};
use crate::storage::ObjectStore;

const ACCEPTED_TYPES: [&str; 4] = [
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.spreadsheet",
];

const ACCEPTED_EXTENSIONS: [&str; 4] = ["csv", "xls", "xlsx", "ods"];

/// An uploaded quiz file as received from the client.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ImportSummary {
    pub quiz_cards: Vec<QuizCardWithChoices>,
    pub csv_key: String,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttachSummary {
    pub attached: u64,
    pub total_items: f64,
}

/// Body of every import response, `{"status": "success", ...}` or
/// `{"status": "error", "error": "..."}`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportResponse {
    Success {
        quiz_cards: Vec<QuizCardWithChoices>,
        csv_key: String,
        total_processed: usize,
    },
    Error {
        error: String,
    },
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        Self::Success {
            quiz_cards: summary.quiz_cards,
            csv_key: summary.csv_key,
            total_processed: summary.total_processed,
        }
    }
}

impl From<&ImportError> for ImportResponse {
    fn from(error: &ImportError) -> Self {
        Self::Error {
            error: format!("Error processing CSV: {error}"),
        }
    }
}

/// Accepts spreadsheet MIME types. A missing or generic type falls back to
/// the filename extension.
pub fn check_file_type(filename: &str, content_type: Option<&str>) -> Result<(), ImportValidationError> {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match essence.as_deref() {
        Some(ct) if ACCEPTED_TYPES.contains(&ct) => Ok(()),
        None | Some("application/octet-stream") => {
            let extension = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            match extension {
                Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
                _ => Err(ImportValidationError::UnsupportedFileType {
                    content_type: essence.unwrap_or_else(|| String::from("unknown")),
                }),
            }
        }
        Some(ct) => Err(ImportValidationError::UnsupportedFileType {
            content_type: ct.to_string(),
        }),
    }
}

/// `quizzes/quiz-<unix millis>-<filename>` with the filename reduced to a
/// safe character set.
pub fn csv_object_key(filename: &str, millis: i64) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if sanitized.trim_matches(['.', '_']).is_empty() {
        sanitized = String::from("quiz.csv");
    }
    format!("quizzes/quiz-{millis}-{sanitized}")
}

fn build_rows(rows: &[ProcessedQuizRow]) -> (Vec<NewQuizCard>, Vec<NewChoice>, Vec<(Uuid, Uuid)>) {
    let mut cards = Vec::with_capacity(rows.len());
    let mut choices = Vec::with_capacity(rows.len() * 4);
    let mut links = Vec::with_capacity(rows.len());

    for row in rows {
        let card_id = Uuid::new_v4();
        cards.push(NewQuizCard {
            id: card_id,
            question: row.question.clone(),
            explanation: row.explanation.clone(),
            item_score: row.item_score,
            sequence: row.sequence,
        });

        for (position, choice) in row.choices.iter().enumerate() {
            let choice_id = Uuid::new_v4();
            if choice.is_correct {
                links.push((card_id, choice_id));
            }
            choices.push(NewChoice {
                id: choice_id,
                quiz_card_id: card_id,
                choice: choice.choice.clone(),
                is_correct: choice.is_correct,
                position: position as i16,
            });
        }
    }

    (cards, choices, links)
}

/// Runs CSV imports and the attach step against the database and object store.
#[derive(Debug, Clone)]
pub struct QuizImporter {
    mm: ModelManager,
    storage: Arc<dyn ObjectStore>,
    max_csv_size: usize,
}

impl QuizImporter {
    pub fn new(mm: ModelManager, storage: Arc<dyn ObjectStore>, max_csv_size: usize) -> Self {
        Self {
            mm,
            storage,
            max_csv_size,
        }
    }

    pub fn max_csv_size(&self) -> usize {
        self.max_csv_size
    }

    /// Validates `file` completely before touching the database.
    pub fn validate(&self, file: &CsvUpload) -> ImportResult<Vec<ProcessedQuizRow>> {
        if file.bytes.len() > self.max_csv_size {
            return Err(ImportValidationError::TooLarge {
                size: file.bytes.len(),
                max: self.max_csv_size,
            }
            .into());
        }

        check_file_type(&file.filename, file.content_type.as_deref())?;
        let text = std::str::from_utf8(&file.bytes).map_err(|_| ImportValidationError::NotUtf8)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(parse_quiz_csv(text)?)
    }

    /// Replaces the cards of `target` with the rows of `file`.
    ///
    /// Rows are committed before the file is stored. A storage failure is
    /// returned as an error but the new cards stay.
    #[tracing::instrument(skip(self, file), fields(filename = %file.filename, size = file.bytes.len()))]
    pub async fn import(&self, file: CsvUpload, target: DeckAttachment) -> ImportResult<ImportSummary> {
        let rows = self.validate(&file)?;
        tracing::debug!("validated {} rows", rows.len());

        let cards = self.replace_cards(target, &rows).await?;
        let total_processed = cards.len();
        tracing::info!("imported {} quiz cards into {:?}", total_processed, target);

        let csv_key = csv_object_key(&file.filename, chrono::Utc::now().timestamp_millis());
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| String::from("text/csv"));
        self.storage
            .put_object(&csv_key, &content_type, file.bytes)
            .await?;

        if let DeckAttachment::Attached(deck_id) = target {
            QuizDeck::set_csv_version(&self.mm, deck_id, &csv_key).await?;
        }

        Ok(ImportSummary {
            quiz_cards: cards,
            csv_key,
            total_processed,
        })
    }

    async fn replace_cards(
        &self,
        target: DeckAttachment,
        rows: &[ProcessedQuizRow],
    ) -> ImportResult<Vec<QuizCardWithChoices>> {
        let (new_cards, new_choices, links) = build_rows(rows);

        let mut tx = self.mm.begin().await?;

        if let DeckAttachment::Attached(deck_id) = target {
            if !QuizDeck::lock(&mut tx, deck_id).await? {
                return Err(ImportError::DeckNotFound(deck_id));
            }
        }

        let old_ids = QuizCard::ids_for(&mut tx, target).await?;
        let removed_choices = Choice::delete_for_cards(&mut tx, &old_ids).await?;
        let removed_cards = QuizCard::delete_many(&mut tx, &old_ids).await?;
        tracing::debug!("removed {removed_cards} cards and {removed_choices} choices");

        QuizCard::insert_many(&mut tx, target, &new_cards).await?;
        let choices = Choice::insert_many(&mut tx, &new_choices).await?;
        let cards = QuizCard::link_correct_choices(&mut tx, &links).await?;

        if let DeckAttachment::Attached(deck_id) = target {
            let total: f64 = new_cards.iter().map(|c| c.item_score).sum();
            QuizDeck::set_total_items(&mut tx, deck_id, total).await?;
        }

        tx.commit().await?;

        let mut choices = choices;
        choices.sort_by_key(|c| c.position());
        Ok(QuizCardWithChoices::assemble(cards, choices))
    }

    /// Moves every unattached card into `deck_id` and recomputes its total.
    #[tracing::instrument(skip(self))]
    pub async fn attach(&self, deck_id: Uuid) -> ImportResult<AttachSummary> {
        let mut tx = self.mm.begin().await?;
        if !QuizDeck::lock(&mut tx, deck_id).await? {
            return Err(ImportError::DeckNotFound(deck_id));
        }

        let attached = QuizCard::attach_unattached(&mut tx, deck_id).await?;
        let total_items = QuizDeck::recompute_total_items(&mut tx, deck_id).await?;
        tx.commit().await?;

        tracing::info!("attached {attached} cards, total items {total_items}");
        Ok(AttachSummary {
            attached,
            total_items,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_type_test() {
        assert!(check_file_type("q.csv", Some("text/csv")).is_ok());
        assert!(check_file_type("q.csv", Some("text/csv; charset=utf-8")).is_ok());
        assert!(check_file_type("q.bin", Some("application/vnd.ms-excel")).is_ok());
        assert!(check_file_type("q.CSV", None).is_ok());
        assert!(check_file_type("q.ods", Some("application/octet-stream")).is_ok());

        assert!(check_file_type("q.csv", Some("application/pdf")).is_err());
        assert!(check_file_type("q.txt", None).is_err());
        assert!(check_file_type("q", Some("application/octet-stream")).is_err());
    }

    #[test]
    fn csv_object_key_test() {
        assert_eq!(csv_object_key("deck 1.csv", 42), "quizzes/quiz-42-deck_1.csv");
        assert_eq!(csv_object_key("../../etc/passwd", 1), "quizzes/quiz-1-passwd");
        assert_eq!(csv_object_key("", 1), "quizzes/quiz-1-quiz.csv");
        assert_eq!(csv_object_key("..", 1), "quizzes/quiz-1-quiz.csv");
    }

    #[test]
    fn build_rows_test() {
        let text = "question,choice a,choice b,choice c,choice d,correct answer,explanation,item score,sequence\n\
                    Q1,a,b,c,d,C,,2,1\n\
                    Q2,a,b,c,d,A,,1.5,2";
        let rows = parse_quiz_csv(text).unwrap();
        let (cards, choices, links) = build_rows(&rows);

        assert_eq!(cards.len(), 2);
        assert_eq!(choices.len(), 8);
        assert_eq!(links.len(), 2);

        for (card, (card_id, choice_id)) in cards.iter().zip(&links) {
            assert_eq!(card.id, *card_id);
            let owned: Vec<&NewChoice> = choices.iter().filter(|c| c.quiz_card_id == card.id).collect();
            assert_eq!(owned.len(), 4);
            let correct: Vec<&&NewChoice> = owned.iter().filter(|c| c.is_correct).collect();
            assert_eq!(correct.len(), 1);
            assert_eq!(correct[0].id, *choice_id);
        }
        assert_eq!(choices[2].position, 2);
        assert!(choices[2].is_correct);
    }

    #[test]
    fn error_response_test() {
        let error = ImportError::from(ImportValidationError::MissingRows);
        let body = serde_json::to_value(ImportResponse::from(&error)).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["error"],
            "Error processing CSV: CSV must contain headers and at least one data row"
        );
    }
}
