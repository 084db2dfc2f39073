use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::model::DatabaseResult;
use crate::model::entity::Analytics;
use crate::web::dto::dashboard::{DashboardResponse, LessonCompletion, QuizPerformance, QuizScore};
use crate::web::error::ErrorResponse;
use crate::web::routes::admin_layer;
use crate::web::{AppState, RequestContext, WebResult};

const ACTIVE_WINDOW_DAYS: i32 = 30;

pub fn routes<S>(state: AppState) -> Router<S> {
    let router = Router::new().route("/", get(dashboard_handler));
    admin_layer(router, &state).with_state(state)
}

/// A failed query is logged and its metric falls back to the default.
fn or_default<T: Default>(metric: &str, result: DatabaseResult<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::error!("dashboard metric `{metric}` failed: {e}");
        T::default()
    })
}

pub async fn collect(state: &AppState) -> DashboardResponse {
    let mm = state.pool();
    let (learners, attempts, active, per_lesson, completions) = tokio::join!(
        Analytics::count_learners(mm),
        Analytics::attempt_totals(mm),
        Analytics::count_active_users(mm, ACTIVE_WINDOW_DAYS),
        Analytics::attempts_per_lesson(mm),
        Analytics::completions_per_lesson(mm),
    );

    let total_users = or_default("total_users", learners);
    DashboardResponse {
        total_users,
        average_quiz_score: QuizScore::from(or_default("average_quiz_score", attempts)),
        total_active_users: or_default("total_active_users", active),
        quiz_performance: or_default("quiz_performance", per_lesson)
            .into_iter()
            .map(QuizPerformance::from)
            .collect(),
        lesson_completion: or_default("lesson_completion", completions)
            .into_iter()
            .map(|row| LessonCompletion::from_row(row, total_users))
            .collect(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/",
    description = "Learner, quiz and completion statistics",
    responses(
        (status = 200, description = "Dashboard metrics", body = DashboardResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "dashboard"
)]
#[tracing::instrument(skip_all)]
async fn dashboard_handler(ctx: RequestContext, State(state): State<AppState>) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    Ok((StatusCode::OK, Json(collect(&state).await)))
}
