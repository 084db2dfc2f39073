use serde::{Deserialize, Serialize};

use crate::model::entity::UserEntity;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

/// `{user, error}`, exactly one of which is set.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: Option<UserEntity>,
    pub error: Option<String>,
}

impl AuthResponse {
    pub fn signed_in(user: UserEntity) -> Self {
        Self {
            user: Some(user),
            error: None,
        }
    }

    pub fn rejected<S: Into<String>>(error: S) -> Self {
        Self {
            user: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub next: Option<String>,
}
