use serde::Serialize;

use crate::model::entity::{QuizCardWithChoices, QuizDeck};

/// A deck with its cards ordered by sequence.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QuizDeckResponse {
    #[serde(flatten)]
    pub deck: QuizDeck,
    pub quiz_cards: Vec<QuizCardWithChoices>,
}
