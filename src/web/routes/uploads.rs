use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::storage::SignedUrl;
use crate::upload::{DownloadInfo, MultipartSession, SingleUpload, UploadPlan, UploadRequest};
use crate::web::dto::uploads::{AbortBody, CompleteBody, ExistsResponse, KeyQuery, SignPartBody};
use crate::web::error::ErrorResponse;
use crate::web::routes::admin_layer;
use crate::web::{AppState, WebResult};

pub fn routes<S>(state: AppState) -> Router<S> {
    let router = Router::new()
        .route("/", post(uploads_plan_handler))
        .route("/params", post(uploads_params_handler))
        .route("/multipart", post(uploads_create_multipart_handler))
        .route("/multipart/sign", post(uploads_sign_part_handler))
        .route("/multipart/complete", post(uploads_complete_handler))
        .route("/multipart/abort", post(uploads_abort_handler))
        .route("/download", get(uploads_download_handler))
        .route("/exists", get(uploads_exists_handler));

    admin_layer(router, &state).with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/",
    description = "Chooses a presigned POST for small files and a multipart session for large ones",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Upload plan", body = UploadPlan),
        (status = 400, description = "Unsupported content type or file too large", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_plan_handler(
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> WebResult<impl IntoResponse> {
    let plan = state.uploads().plan(&payload).await?;
    Ok((StatusCode::OK, Json(plan)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/params",
    description = "Presigned POST form for a single direct upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Form target and fields", body = SingleUpload),
        (status = 400, description = "Unsupported content type or file too large", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_params_handler(
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> WebResult<impl IntoResponse> {
    let params = state.uploads().upload_params(&payload).await?;
    Ok((StatusCode::OK, Json(params)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/multipart",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Multipart session created", body = MultipartSession),
        (status = 400, description = "Unsupported content type or file too large", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_create_multipart_handler(
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> WebResult<impl IntoResponse> {
    let session = state.uploads().create_multipart(&payload).await?;
    Ok((StatusCode::OK, Json(session)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/multipart/sign",
    description = "Short-lived URL for the PUT of one part",
    request_body = SignPartBody,
    responses(
        (status = 200, description = "Signed part URL", body = SignedUrl),
        (status = 400, description = "Invalid part number or key", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_sign_part_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignPartBody>,
) -> WebResult<impl IntoResponse> {
    let signed = state
        .uploads()
        .sign_part(&payload.key, &payload.upload_id, payload.part_number)
        .await?;
    Ok((StatusCode::OK, Json(signed)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/multipart/complete",
    request_body = CompleteBody,
    responses(
        (status = 200, description = "Upload completed"),
        (status = 400, description = "No parts, unknown session or missing part", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_complete_handler(
    State(state): State<AppState>,
    Json(payload): Json<CompleteBody>,
) -> WebResult<impl IntoResponse> {
    state
        .uploads()
        .complete(&payload.key, &payload.upload_id, payload.parts)
        .await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/multipart/abort",
    request_body = AbortBody,
    responses(
        (status = 200, description = "Upload aborted"),
        (status = 400, description = "Unknown session", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_abort_handler(
    State(state): State<AppState>,
    Json(payload): Json<AbortBody>,
) -> WebResult<impl IntoResponse> {
    state.uploads().abort(&payload.key, &payload.upload_id).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/v1/uploads/download",
    params(KeyQuery),
    responses(
        (status = 200, description = "Presigned download URL", body = DownloadInfo),
        (status = 404, description = "Object not found", body = ErrorResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_download_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> WebResult<impl IntoResponse> {
    let info = state.uploads().download(&query.key).await?;
    Ok((StatusCode::OK, Json(info)))
}

#[utoipa::path(
    get,
    path = "/api/v1/uploads/exists",
    params(KeyQuery),
    responses(
        (status = 200, description = "Whether the object exists", body = ExistsResponse),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 502, description = "Storage error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_exists_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> WebResult<impl IntoResponse> {
    let exists = state.uploads().exists(&query.key).await?;
    Ok((StatusCode::OK, Json(ExistsResponse { exists })))
}
