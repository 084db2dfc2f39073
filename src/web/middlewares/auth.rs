use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    Config, auth,
    model::{CrudRepository, ResourceTyped, entity::UserEntity},
    web::{AppState, RequestContext, context::AuthenticatedUser, error::WebError},
};

pub static AUTH_TOKEN: &str = "SID";

/// Resolves the `SID` cookie into a [`RequestContext`].
///
/// A missing, malformed or expired token, or a token whose user no longer
/// exists, yields an anonymous context.
pub async fn extract_context_fn(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, WebError> {
    let token = match cookies.get(AUTH_TOKEN) {
        Some(token) => token.value().to_string(),
        None => {
            req.extensions_mut().insert(RequestContext::new(None));
            return Ok(next.run(req).await);
        }
    };

    let jwt = Config::get_or_init(false).await.app().jwt();
    let user_id = match auth::decode_session(&token, jwt) {
        Ok(claims) => claims.user_id(),
        Err(e) => {
            tracing::debug!("rejected session token: {e}");
            None
        }
    };

    let Some(user_id) = user_id else {
        req.extensions_mut().insert(RequestContext::new(None));
        return Ok(next.run(req).await);
    };

    let user = UserEntity::find_by_id(state.pool(), &AuthenticatedUser::system(), user_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let ctx = user.map(|user| AuthenticatedUser::new(user.id(), user.role()));
    req.extensions_mut().insert(RequestContext::new(ctx));
    Ok(next.run(req).await)
}

/// Lets the request through only for an admin session: 401 without a
/// session, 403 for any other user type.
pub async fn require_admin_fn(ctx: RequestContext, req: Request, next: Next) -> Result<Response, WebError> {
    ctx.admin()?;
    Ok(next.run(req).await)
}
