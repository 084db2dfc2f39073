use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub struct CookieAuthModifier;

impl Modify for CookieAuthModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "SID",
                    "JWT session of an admin user",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::routes::auth::signin_handler,
        crate::web::routes::auth::signout_handler,
        crate::web::routes::auth::verify_handler,
        crate::web::routes::auth::oauth_handler,
        crate::web::routes::auth::callback_handler,
        crate::web::routes::lessons::lessons_list_handler,
        crate::web::routes::lessons::lessons_get_handler,
        crate::web::routes::lessons::lessons_create_handler,
        crate::web::routes::lessons::lessons_update_handler,
        crate::web::routes::lessons::lessons_delete_handler,
        crate::web::routes::quizzes::quizzes_list_handler,
        crate::web::routes::quizzes::quizzes_get_handler,
        crate::web::routes::quizzes::quizzes_create_handler,
        crate::web::routes::quizzes::quizzes_update_handler,
        crate::web::routes::quizzes::quizzes_delete_handler,
        crate::web::routes::quizzes::quizzes_import_unattached_handler,
        crate::web::routes::quizzes::quizzes_import_handler,
        crate::web::routes::quizzes::quizzes_attach_handler,
        crate::web::routes::uploads::uploads_plan_handler,
        crate::web::routes::uploads::uploads_params_handler,
        crate::web::routes::uploads::uploads_create_multipart_handler,
        crate::web::routes::uploads::uploads_sign_part_handler,
        crate::web::routes::uploads::uploads_complete_handler,
        crate::web::routes::uploads::uploads_abort_handler,
        crate::web::routes::uploads::uploads_download_handler,
        crate::web::routes::uploads::uploads_exists_handler,
        crate::web::routes::dashboard::dashboard_handler,
    ),
    modifiers(&CookieAuthModifier),
)]
pub struct ApiDoc;
