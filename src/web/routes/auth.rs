use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Duration;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::{
    Config,
    auth::{
        self, SessionClaims,
        oauth::{OAuthClient, sanitize_next},
    },
    model::{
        CrudRepository,
        entity::{Credential, UserEntity},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::auth::{AuthResponse, CallbackQuery, SignInBody},
        middlewares::{self, AUTH_TOKEN},
    },
};

const OAUTH_STATE: &str = "oauth_state";

pub fn routes<S>(state: AppState) -> Router<S> {
    let with_context = Router::new()
        .route("/verify", get(verify_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ));

    Router::new()
        .route("/signin", post(signin_handler))
        .route("/signout", post(signout_handler))
        .route("/oauth", get(oauth_handler))
        .route("/callback", get(callback_handler))
        .merge(with_context)
        .with_state(state)
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::from(name);
    cookie.set_path("/");
    cookie
}

fn sign_out(cookies: &Cookies) {
    cookies.remove(removal_cookie(AUTH_TOKEN));
}

async fn issue_session(cookies: &Cookies, user: &UserEntity) -> auth::CryptResult<()> {
    let config = Config::get_or_init(false).await;
    let claims = SessionClaims::for_user(user.id(), Duration::hours(config.app().session_hours()));
    let token = auth::encode_session(&claims, config.app().jwt())?;

    let mut cookie = Cookie::new(AUTH_TOKEN, token);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookies.add(cookie);
    Ok(())
}

enum SignInFailure {
    InvalidCredentials,
    ProfileUnavailable,
    NotAdmin,
    Unexpected,
}

impl SignInFailure {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::ProfileUnavailable => StatusCode::UNAUTHORIZED,
            Self::NotAdmin => StatusCode::FORBIDDEN,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid login credentials",
            Self::ProfileUnavailable => "Failed to fetch user profile",
            Self::NotAdmin => "Access denied: Admin privileges required",
            Self::Unexpected => "An unexpected error occurred",
        }
    }
}

async fn sign_in(state: &AppState, cookies: &Cookies, payload: &SignInBody) -> Result<UserEntity, SignInFailure> {
    let credential = Credential::find_by_email(state.pool(), &payload.email)
        .await
        .map_err(|e| {
            tracing::error!("credential lookup failed: {e}");
            SignInFailure::Unexpected
        })?
        .ok_or(SignInFailure::InvalidCredentials)?;

    let verified = auth::verify_password(credential.hash(), &payload.password).map_err(|e| {
        tracing::error!("password verification failed: {e}");
        SignInFailure::Unexpected
    })?;
    if !verified {
        return Err(SignInFailure::InvalidCredentials);
    }

    let profile = UserEntity::find_by_id(state.pool(), &AuthenticatedUser::system(), credential.user_id())
        .await
        .map_err(|e| {
            tracing::warn!("profile fetch failed: {e}");
            SignInFailure::ProfileUnavailable
        })?
        .ok_or(SignInFailure::ProfileUnavailable)?;

    issue_session(cookies, &profile).await.map_err(|e| {
        tracing::error!("unable to issue session: {e}");
        SignInFailure::Unexpected
    })?;

    if !profile.is_admin() {
        return Err(SignInFailure::NotAdmin);
    }
    Ok(profile)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    description = "Signs an admin in with email and password",
    request_body = SignInBody,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials or missing profile", body = AuthResponse),
        (status = 403, description = "User is not an admin", body = AuthResponse),
        (status = 500, description = "Internal server error", body = AuthResponse),
    ),
    tag = "auth"
)]
#[tracing::instrument(skip_all, fields(email = %payload.email))]
async fn signin_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignInBody>,
) -> Response {
    match sign_in(&state, &cookies, &payload).await {
        Ok(user) => {
            tracing::info!("admin {} signed in", user.id());
            (StatusCode::OK, Json(AuthResponse::signed_in(user))).into_response()
        }
        Err(failure) => {
            sign_out(&cookies);
            tracing::info!("sign-in rejected: {}", failure.message());
            (failure.status_code(), Json(AuthResponse::rejected(failure.message()))).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signout",
    description = "Drops the session cookie",
    responses(
        (status = 200, description = "Signed out"),
    ),
    tag = "auth"
)]
async fn signout_handler(cookies: Cookies) -> impl IntoResponse {
    sign_out(&cookies);
    StatusCode::OK
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    description = "Checks whether the current session belongs to an admin",
    responses(
        (status = 200, description = "Admin session"),
        (status = 401, description = "No admin session"),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "auth"
)]
async fn verify_handler(ctx: RequestContext) -> impl IntoResponse {
    match ctx.maybe_user() {
        Some(user) if user.is_admin() => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/oauth",
    description = "Redirects to the identity provider",
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 502, description = "OAuth is not configured", body = crate::web::error::ErrorResponse),
    ),
    tag = "auth"
)]
async fn oauth_handler(cookies: Cookies) -> WebResult<Redirect> {
    let config = Config::get_or_init(false).await;
    let client = OAuthClient::from_settings(config.oauth()).map_err(WebError::from_oauth)?;

    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = client.authorize_url(&state).map_err(WebError::from_oauth)?;

    let mut cookie = Cookie::new(OAUTH_STATE, state);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_max_age(tower_cookies::cookie::time::Duration::minutes(10));
    cookies.add(cookie);

    Ok(Redirect::to(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/callback",
    description = "Completes the OAuth flow and admits admins only",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend"),
    ),
    tag = "auth"
)]
#[tracing::instrument(skip_all)]
async fn callback_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let config = Config::get_or_init(false).await;
    let frontend = config.app().frontend_url().trim_end_matches('/');
    let code_error = || Redirect::to(&format!("{frontend}/auth/auth-code-error"));
    let access_denied = || Redirect::to(&format!("{frontend}/auth?error=access_denied"));

    let expected_state = cookies.get(OAUTH_STATE).map(|c| c.value().to_string());
    cookies.remove(removal_cookie(OAUTH_STATE));

    let Some(code) = query.code.as_deref() else {
        return code_error();
    };
    if expected_state.is_none() || expected_state != query.state {
        tracing::warn!("oauth state mismatch");
        return code_error();
    }

    let email = match OAuthClient::from_settings(config.oauth()) {
        Ok(client) => match client.exchange_code(code).await {
            Ok(token) => client.fetch_email(&token).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    let email = match email {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!("oauth exchange failed: {e}");
            return code_error();
        }
    };

    let profile = UserEntity::find_by_email(state.pool(), &AuthenticatedUser::system(), &email).await;
    match profile {
        Ok(Some(user)) if user.is_admin() => {
            if let Err(e) = issue_session(&cookies, &user).await {
                tracing::error!("unable to issue session: {e}");
                sign_out(&cookies);
                return code_error();
            }
            let next = sanitize_next(query.next.as_deref());
            Redirect::to(&format!("{frontend}{next}"))
        }
        Ok(_) => {
            sign_out(&cookies);
            access_denied()
        }
        Err(e) => {
            tracing::warn!("profile fetch failed: {e}");
            sign_out(&cookies);
            access_denied()
        }
    }
}
