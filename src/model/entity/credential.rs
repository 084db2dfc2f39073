use serde::Serialize;
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::entity::{UserEntity, UserEntityCreateUpdate};
use crate::model::{ModelManager, error::DatabaseResult};

/// Password credential of a user. Kept apart from the profile row so that a
/// valid credential without a profile can exist.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Credential {
    user_id: Uuid,
    email: String,
    #[serde(skip)]
    password_hash: String,
}

impl Credential {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    pub async fn create(
        mm: &ModelManager,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> DatabaseResult<Self> {
        Self::insert(mm.executor(), user_id, email, password_hash).await
    }

    async fn insert<'e, E>(executor: E, user_id: Uuid, email: &str, password_hash: &str) -> DatabaseResult<Self>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query_as(
            r#"
            INSERT INTO credentials (user_id, email, password_hash) VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET email = EXCLUDED.email, password_hash = EXCLUDED.password_hash
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .fetch_one(executor)
        .await?;

        Ok(result)
    }

    /// Creates a profile together with its password credential. Neither row
    /// is kept when either insert fails.
    pub async fn register(
        mm: &ModelManager,
        profile: UserEntityCreateUpdate,
        password_hash: &str,
    ) -> DatabaseResult<UserEntity> {
        let mut tx = mm.begin().await?;
        let user = UserEntity::insert(&mut *tx, &profile).await?;
        Self::insert(&mut *tx, user.id(), &profile.email, password_hash).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn find_by_email(mm: &ModelManager, email: &str) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM credentials WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}
