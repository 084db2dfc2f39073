use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Lesson {
    id: Uuid,
    title: String,
    description: String,
    sequence: i32,
    pdf_key: String,
    pdf_filename: Option<String>,
    video_key: String,
    video_filename: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for Lesson {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Lesson
    }
}

impl Lesson {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn pdf_key(&self) -> &str {
        &self.pdf_key
    }

    pub fn video_key(&self) -> &str {
        &self.video_key
    }

    /// Object keys this lesson references.
    pub fn asset_keys(&self) -> [&str; 2] {
        [&self.pdf_key, &self.video_key]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, utoipa::ToSchema)]
pub struct LessonCreate {
    #[validate(length(min = 5, message = "Lesson Title is required and must be at least 5 Characters long"))]
    pub title: String,
    #[validate(length(
        min = 10,
        message = "Lesson Description is required and must be at least 10 Characters long"
    ))]
    pub description: String,
    #[validate(range(min = 1, message = "Sequence must be a positive number"))]
    pub sequence: i32,
    #[validate(length(min = 1, message = "Lesson PDF is required"))]
    pub pdf_key: String,
    pub pdf_filename: Option<String>,
    #[validate(length(min = 1, message = "Lesson Video is required"))]
    pub video_key: String,
    pub video_filename: Option<String>,
}

#[async_trait]
impl CrudRepository<Lesson, LessonCreate, Uuid> for Lesson {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO lessons (id, title, description, sequence, pdf_key, pdf_filename, video_key, video_filename)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.sequence)
        .bind(&data.pdf_key)
        .bind(&data.pdf_filename)
        .bind(&data.video_key)
        .bind(&data.video_filename)
        .fetch_one(mm.executor())
        .await?;

        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE lessons
            SET title = $1, description = $2, sequence = $3, pdf_key = $4, pdf_filename = $5,
                video_key = $6, video_filename = $7, updated_at = now()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.sequence)
        .bind(&data.pdf_key)
        .bind(&data.pdf_filename)
        .bind(&data.video_key)
        .bind(&data.video_filename)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM lessons WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM lessons WHERE id = $1")
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
            "SELECT * FROM lessons ORDER BY sequence ASC, created_at ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Lesson, LessonCreate, Uuid);
