use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, QueryBuilder};
use uuid::Uuid;

use super::Choice;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};

/// Rows per multi-row `INSERT`, keeps bind counts under the Postgres limit.
const INSERT_CHUNK: usize = 1000;

/// Which deck a set of cards belongs to. Cards imported before their deck
/// exists sit in a single unattached pool until [`QuizCard::attach_unattached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckAttachment {
    Unattached,
    Attached(Uuid),
}

impl DeckAttachment {
    pub fn deck_id(&self) -> Option<Uuid> {
        match self {
            Self::Unattached => None,
            Self::Attached(id) => Some(*id),
        }
    }
}

impl From<Option<Uuid>> for DeckAttachment {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(Self::Unattached, Self::Attached)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizCard {
    id: Uuid,
    question: String,
    explanation: String,
    item_score: f64,
    sequence: i32,
    quiz_deck_id: Option<Uuid>,
    correct_choice_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for QuizCard {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizCard
    }
}

/// Card row to insert. Ids are assigned by the caller so choices can refer
/// to their card before anything is written.
#[derive(Debug, Clone)]
pub struct NewQuizCard {
    pub id: Uuid,
    pub question: String,
    pub explanation: String,
    pub item_score: f64,
    pub sequence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizCardWithChoices {
    #[serde(flatten)]
    pub card: QuizCard,
    pub choices: Vec<Choice>,
}

impl QuizCard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn ids_for(conn: &mut PgConnection, target: DeckAttachment) -> DatabaseResult<Vec<Uuid>> {
        let ids = match target {
            DeckAttachment::Attached(deck_id) => {
                sqlx::query_scalar("SELECT id FROM quiz_cards WHERE quiz_deck_id = $1")
                    .bind(deck_id)
                    .fetch_all(conn)
                    .await?
            }
            DeckAttachment::Unattached => {
                sqlx::query_scalar("SELECT id FROM quiz_cards WHERE quiz_deck_id IS NULL")
                    .fetch_all(conn)
                    .await?
            }
        };
        Ok(ids)
    }

    pub async fn delete_many(conn: &mut PgConnection, ids: &[Uuid]) -> DatabaseResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM quiz_cards WHERE id = ANY($1)")
            .bind(ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_many(
        conn: &mut PgConnection,
        target: DeckAttachment,
        cards: &[NewQuizCard],
    ) -> DatabaseResult<Vec<Self>> {
        let mut inserted = Vec::with_capacity(cards.len());
        for chunk in cards.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<sqlx::Postgres>::new(
                "INSERT INTO quiz_cards (id, question, explanation, item_score, sequence, quiz_deck_id) ",
            );
            qb.push_values(chunk, |mut b, card| {
                b.push_bind(card.id)
                    .push_bind(&card.question)
                    .push_bind(&card.explanation)
                    .push_bind(card.item_score)
                    .push_bind(card.sequence)
                    .push_bind(target.deck_id());
            });
            qb.push(" RETURNING *");

            let rows: Vec<Self> = qb.build_query_as().fetch_all(&mut *conn).await?;
            inserted.extend(rows);
        }

        // RETURNING order is not guaranteed, keep input order
        let position: HashMap<Uuid, usize> =
            cards.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
        inserted.sort_by_key(|c| position.get(&c.id).copied().unwrap_or(usize::MAX));
        Ok(inserted)
    }

    /// Points every card at its `(card_id, choice_id)` partner in one
    /// statement. Returns the updated cards in `links` order.
    pub async fn link_correct_choices(
        conn: &mut PgConnection,
        links: &[(Uuid, Uuid)],
    ) -> DatabaseResult<Vec<Self>> {
        if links.is_empty() {
            return Ok(vec![]);
        }

        let (card_ids, choice_ids): (Vec<Uuid>, Vec<Uuid>) = links.iter().copied().unzip();
        let mut updated: Vec<Self> = sqlx::query_as(
            r#"
            UPDATE quiz_cards AS c
            SET correct_choice_id = l.choice_id
            FROM UNNEST($1::uuid[], $2::uuid[]) AS l(card_id, choice_id)
            WHERE c.id = l.card_id
            RETURNING c.*
            "#,
        )
        .bind(&card_ids)
        .bind(&choice_ids)
        .fetch_all(conn)
        .await?;

        let position: HashMap<Uuid, usize> =
            card_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        updated.sort_by_key(|c| position.get(&c.id).copied().unwrap_or(usize::MAX));
        Ok(updated)
    }

    /// Moves every unattached card into `deck_id`.
    pub async fn attach_unattached(conn: &mut PgConnection, deck_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("UPDATE quiz_cards SET quiz_deck_id = $1 WHERE quiz_deck_id IS NULL")
            .bind(deck_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn for_target(mm: &ModelManager, target: DeckAttachment) -> DatabaseResult<Vec<Self>> {
        let mut conn = mm.executor().acquire().await?;
        let ids = Self::ids_for(&mut conn, target).await?;
        let result = sqlx::query_as(
            "SELECT * FROM quiz_cards WHERE id = ANY($1) ORDER BY sequence ASC, created_at ASC",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
        Ok(result)
    }
}

impl QuizCardWithChoices {
    /// Groups `choices` under their cards, keeping the order of `cards`.
    pub fn assemble(cards: Vec<QuizCard>, choices: Vec<Choice>) -> Vec<Self> {
        let mut by_card: HashMap<Uuid, Vec<Choice>> = HashMap::new();
        for choice in choices {
            by_card.entry(choice.quiz_card_id()).or_default().push(choice);
        }

        cards
            .into_iter()
            .map(|card| {
                let choices = by_card.remove(&card.id).unwrap_or_default();
                Self { card, choices }
            })
            .collect()
    }

    pub async fn for_target(mm: &ModelManager, target: DeckAttachment) -> DatabaseResult<Vec<Self>> {
        let cards = QuizCard::for_target(mm, target).await?;
        let ids: Vec<Uuid> = cards.iter().map(QuizCard::id).collect();
        let choices = Choice::for_cards(mm, &ids).await?;
        Ok(Self::assemble(cards, choices))
    }
}
