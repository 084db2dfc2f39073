use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::error::log_error;
use crate::import::{AttachSummary, CsvUpload, ImportError, ImportResponse, ImportValidationError};
use crate::model::entity::{DeckAttachment, QuizCardWithChoices, QuizDeck, QuizDeckCreate};
use crate::model::{CrudRepository, PaginatableRepository, ResourceTyped};
use crate::web::dto::quizzes::QuizDeckResponse;
use crate::web::error::ErrorResponse;
use crate::web::routes::{PaginationQuery, admin_layer};
use crate::web::{AppState, RequestContext, WebError, WebResult};

/// Multipart framing on top of the CSV itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes<S>(state: AppState) -> Router<S> {
    // Only the import routes take bodies above axum's default limit.
    let import_limit = DefaultBodyLimit::max(state.importer().max_csv_size() + MULTIPART_OVERHEAD);

    let router = Router::new()
        .route("/", get(quizzes_list_handler).post(quizzes_create_handler))
        .route(
            "/import",
            post(quizzes_import_unattached_handler).layer(import_limit),
        )
        .route(
            "/{id}",
            get(quizzes_get_handler)
                .put(quizzes_update_handler)
                .delete(quizzes_delete_handler),
        )
        .route("/{id}/import", post(quizzes_import_handler).layer(import_limit))
        .route("/{id}/attach", post(quizzes_attach_handler));

    admin_layer(router, &state).with_state(state)
}

async fn find_deck(state: &AppState, ctx: &RequestContext, id: Uuid) -> WebResult<QuizDeck> {
    let user = ctx.admin()?;
    QuizDeck::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?
        .ok_or(WebError::resource_not_found(QuizDeck::get_resource_type()))
}

async fn deck_response(state: &AppState, deck: QuizDeck) -> WebResult<QuizDeckResponse> {
    let quiz_cards = QuizCardWithChoices::for_target(state.pool(), DeckAttachment::Attached(deck.id()))
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?;
    Ok(QuizDeckResponse { deck, quiz_cards })
}

/// Reads the `file` field of a multipart body.
async fn read_csv_field(mut multipart: Multipart) -> Result<CsvUpload, ImportError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            tracing::debug!("malformed multipart body: {e}");
            ImportValidationError::NoFile
        })?;
        let Some(field) = field else {
            return Err(ImportValidationError::NoFile.into());
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            tracing::debug!("unable to read file field: {e}");
            ImportValidationError::NoFile
        })?;

        return Ok(CsvUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

async fn run_import(state: &AppState, multipart: Multipart, target: DeckAttachment) -> Response {
    let result = match read_csv_field(multipart).await {
        Ok(file) => state.importer().import(file, target).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => (StatusCode::OK, Json(ImportResponse::from(summary))).into_response(),
        Err(e) => {
            let body = ImportResponse::from(&e);
            let error = WebError::from(e);
            log_error(&error);
            (error.status_code(), Json(body)).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Requested page of quiz decks", body = crate::model::Page<QuizDeck>),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_list_handler(
    ctx: RequestContext,
    Query(page): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.admin()?;
    let decks = QuizDeck::page(state.pool(), user, page.limit, page.offset)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(decks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{quiz_id}",
    description = "Fetches a deck with its cards and choices",
    params(
        ("quiz_id" = Uuid, Path, description = "ID of the quiz deck")
    ),
    responses(
        (status = 200, description = "Deck found", body = QuizDeckResponse),
        (status = 404, description = "Deck not found", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let deck = find_deck(&state, &ctx, id).await?;
    Ok((StatusCode::OK, Json(deck_response(&state, deck).await?)))
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/",
    description = "Creates a deck and attaches every unattached card to it",
    request_body = QuizDeckCreate,
    responses(
        (status = 201, description = "Deck created", body = QuizDeckResponse),
        (status = 400, description = "Invalid deck", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<QuizDeckCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.admin()?;
    payload.validate().map_err(WebError::invalid_payload)?;

    let created = QuizDeck::create(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?;
    let attached = state.importer().attach(created.id()).await?;
    tracing::info!("quiz deck {} created with {} cards", created.id(), attached.attached);

    let deck = find_deck(&state, &ctx, created.id()).await?;
    Ok((StatusCode::CREATED, Json(deck_response(&state, deck).await?)))
}

#[utoipa::path(
    put,
    path = "/api/v1/quizzes/{quiz_id}",
    params(
        ("quiz_id" = Uuid, Path, description = "ID of the quiz deck")
    ),
    request_body = QuizDeckCreate,
    responses(
        (status = 200, description = "Deck updated", body = QuizDeck),
        (status = 400, description = "Invalid deck", body = ErrorResponse),
        (status = 404, description = "Deck not found", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuizDeckCreate>,
) -> WebResult<impl IntoResponse> {
    let found = find_deck(&state, &ctx, id).await?;
    payload.validate().map_err(WebError::invalid_payload)?;

    let updated = found
        .update(state.pool(), ctx.admin()?, payload)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quizzes/{quiz_id}",
    description = "Deletes a deck with its cards, choices and stored CSV",
    params(
        ("quiz_id" = Uuid, Path, description = "ID of the quiz deck")
    ),
    responses(
        (status = 200, description = "Deck deleted"),
        (status = 404, description = "Deck not found", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let found = find_deck(&state, &ctx, id).await?;
    let csv_key = found.csv_version().map(str::to_string);

    found
        .delete(state.pool(), ctx.admin()?)
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizDeck::get_resource_type(), e))?;

    if let Some(key) = csv_key {
        state.uploads().discard(&key).await;
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/import",
    description = "Imports a CSV into the unattached pool. Every card already in the pool is deleted first, so the pool only ever holds the cards of the last unattached import",
    request_body(content_type = "multipart/form-data", description = "Multipart body with a `file` field"),
    responses(
        (status = 200, description = "Cards imported", body = ImportResponse),
        (status = 400, description = "Invalid file", body = ImportResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ImportResponse),
        (status = 502, description = "File could not be stored", body = ImportResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_import_unattached_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    run_import(&state, multipart, DeckAttachment::Unattached).await
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{quiz_id}/import",
    description = "Replaces every card of a deck with the rows of a CSV",
    params(
        ("quiz_id" = Uuid, Path, description = "ID of the quiz deck")
    ),
    request_body(content_type = "multipart/form-data", description = "Multipart body with a `file` field"),
    responses(
        (status = 200, description = "Cards imported", body = ImportResponse),
        (status = 400, description = "Invalid file", body = ImportResponse),
        (status = 404, description = "Deck not found", body = ImportResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ImportResponse),
        (status = 502, description = "File could not be stored", body = ImportResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_import_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Response {
    run_import(&state, multipart, DeckAttachment::Attached(id)).await
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{quiz_id}/attach",
    description = "Moves every unattached card into the deck",
    params(
        ("quiz_id" = Uuid, Path, description = "ID of the quiz deck")
    ),
    responses(
        (status = 200, description = "Cards attached", body = AttachSummary),
        (status = 404, description = "Deck not found", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_attach_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    let summary = state.importer().attach(id).await?;
    Ok((StatusCode::OK, Json(summary)))
}
