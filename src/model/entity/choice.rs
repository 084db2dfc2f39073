use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, QueryBuilder};
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult};

const INSERT_CHUNK: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Choice {
    id: Uuid,
    choice: String,
    is_correct: bool,
    /// 0..=3 for A..=D
    position: i16,
    quiz_card_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChoice {
    pub id: Uuid,
    pub quiz_card_id: Uuid,
    pub choice: String,
    pub is_correct: bool,
    pub position: i16,
}

impl Choice {
    pub fn position(&self) -> i16 {
        self.position
    }

    pub fn quiz_card_id(&self) -> Uuid {
        self.quiz_card_id
    }

    pub async fn delete_for_cards(conn: &mut PgConnection, card_ids: &[Uuid]) -> DatabaseResult<u64> {
        if card_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM choices WHERE quiz_card_id = ANY($1)")
            .bind(card_ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_many(conn: &mut PgConnection, choices: &[NewChoice]) -> DatabaseResult<Vec<Self>> {
        let mut inserted = Vec::with_capacity(choices.len());
        for chunk in choices.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<sqlx::Postgres>::new(
                "INSERT INTO choices (id, choice, is_correct, position, quiz_card_id) ",
            );
            qb.push_values(chunk, |mut b, choice| {
                b.push_bind(choice.id)
                    .push_bind(&choice.choice)
                    .push_bind(choice.is_correct)
                    .push_bind(choice.position)
                    .push_bind(choice.quiz_card_id);
            });
            qb.push(" RETURNING *");

            let rows: Vec<Self> = qb.build_query_as().fetch_all(&mut *conn).await?;
            inserted.extend(rows);
        }
        Ok(inserted)
    }

    /// Choices of the given cards, lettered order (A..D) within each card.
    pub async fn for_cards(mm: &ModelManager, card_ids: &[Uuid]) -> DatabaseResult<Vec<Self>> {
        if card_ids.is_empty() {
            return Ok(vec![]);
        }

        let result = sqlx::query_as(
            "SELECT * FROM choices WHERE quiz_card_id = ANY($1) ORDER BY quiz_card_id, position",
        )
        .bind(card_ids)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}
