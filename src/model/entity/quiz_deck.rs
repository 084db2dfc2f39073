use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizDeck {
    id: Uuid,
    title: String,
    description: String,
    lesson_id: Option<Uuid>,
    csv_version: Option<String>,
    total_items: f64,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for QuizDeck {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::QuizDeck
    }
}

impl QuizDeck {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn csv_version(&self) -> Option<&str> {
        self.csv_version.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, utoipa::ToSchema)]
pub struct QuizDeckCreate {
    #[validate(length(min = 5, message = "Quiz Title is required and must be at least 5 Characters long"))]
    pub title: String,
    #[validate(length(
        min = 10,
        message = "Quiz Description is required and must be at least 10 Characters long"
    ))]
    pub description: String,
    pub lesson_id: Uuid,
    pub csv_version: Option<String>,
}

#[async_trait]
impl CrudRepository<QuizDeck, QuizDeckCreate, Uuid> for QuizDeck {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizDeckCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO quiz_decks (id, title, description, lesson_id, csv_version)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.lesson_id)
        .bind(&data.csv_version)
        .fetch_one(mm.executor())
        .await?;

        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizDeckCreate,
    ) -> DatabaseResult<Self> {
        // a missing csv_version keeps the current one
        let result = sqlx::query_as(
            r#"
            UPDATE quiz_decks
            SET title = $1, description = $2, lesson_id = $3, csv_version = COALESCE($4, csv_version)
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.lesson_id)
        .bind(&data.csv_version)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM quiz_decks WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quiz_decks WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM quiz_decks ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_decks")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(QuizDeck, QuizDeckCreate, Uuid);

impl QuizDeck {
    /// Existence check usable inside a transaction. Locks the row until commit.
    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<bool> {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM quiz_decks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(found.is_some())
    }

    pub async fn set_total_items(conn: &mut PgConnection, id: Uuid, total: f64) -> DatabaseResult<()> {
        sqlx::query("UPDATE quiz_decks SET total_items = $1 WHERE id = $2")
            .bind(total)
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Sets total_items to the sum of the deck's current item scores.
    pub async fn recompute_total_items(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<f64> {
        let total: f64 = sqlx::query_scalar(
            r#"
            UPDATE quiz_decks
            SET total_items = COALESCE((SELECT SUM(item_score) FROM quiz_cards WHERE quiz_deck_id = $1), 0)
            WHERE id = $1
            RETURNING total_items
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(total)
    }

    pub async fn set_csv_version(mm: &ModelManager, id: Uuid, key: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE quiz_decks SET csv_version = $1 WHERE id = $2")
            .bind(key)
            .bind(id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}
