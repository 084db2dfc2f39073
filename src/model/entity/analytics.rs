//! Read-only aggregate queries behind the dashboard.

use sqlx::prelude::FromRow;

use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct AttemptTotals {
    pub attempts: i64,
    pub passed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonAttemptsRow {
    pub sequence: i32,
    pub title: String,
    pub attempts: i64,
    pub passed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonCompletionRow {
    pub sequence: i32,
    pub completed_users: i64,
}

pub struct Analytics;

impl Analytics {
    pub async fn count_learners(mm: &ModelManager) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE type = 'USER'")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn attempt_totals(mm: &ModelManager) -> DatabaseResult<AttemptTotals> {
        let result = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS attempts,
                COUNT(*) FILTER (WHERE is_passed) AS passed
            FROM quiz_attempts
            "#,
        )
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    /// Distinct users who completed any lesson in the last `days` days.
    pub async fn count_active_users(mm: &ModelManager, days: i32) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT user_id)
            FROM learning_progress
            WHERE lesson_completed_at >= now() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn attempts_per_lesson(mm: &ModelManager) -> DatabaseResult<Vec<LessonAttemptsRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                l.sequence,
                l.title,
                COUNT(qa.id) AS attempts,
                COUNT(qa.id) FILTER (WHERE qa.is_passed) AS passed
            FROM lessons l
            LEFT JOIN quiz_decks d ON d.lesson_id = l.id
            LEFT JOIN quiz_attempts qa ON qa.quiz_deck_id = d.id
            GROUP BY l.id, l.sequence, l.title
            ORDER BY l.sequence ASC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn completions_per_lesson(mm: &ModelManager) -> DatabaseResult<Vec<LessonCompletionRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                l.sequence,
                COUNT(DISTINCT lp.user_id) FILTER (WHERE lp.lesson_completed_at IS NOT NULL) AS completed_users
            FROM lessons l
            LEFT JOIN learning_progress lp ON lp.lesson_id = l.id
            GROUP BY l.id, l.sequence
            ORDER BY l.sequence ASC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}
