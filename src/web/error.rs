use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::{
    auth::{CryptError, oauth::OAuthError},
    error::log_error,
    import::{ImportError, ImportValidationError},
    model::{DatabaseError, ResourceType},
    storage::StorageError,
    upload::UploadError,
};

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("AuthenticationRequired")]
    AuthenticationRequired,

    #[error("AuthenticationForbidden")]
    AuthenticationForbidden,

    #[error("AuthenticationInvalidCredentials")]
    AuthenticationInvalidCredentials,

    #[error("AuthenticationProviderError: {0}")]
    AuthenticationProviderError(#[from] OAuthError),
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("ResourceNotFound: {resource_type:?}")]
    ResourceNotFound { resource_type: ResourceType },

    #[error("ResourceConflict: {resource_type:?}")]
    ResourceConflict { resource_type: ResourceType },

    #[error("ResourceFetchError: {resource_type:?}. Error: {error}")]
    ResourceFetchError {
        resource_type: ResourceType,
        error: DatabaseError,
    },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("ValidationInvalidPayload: {0}")]
    ValidationInvalidPayload(#[from] validator::ValidationErrors),

    #[error("ValidationInvalidUpload: {0}")]
    ValidationInvalidUpload(UploadError),

    #[error("ValidationInvalidImport: {0}")]
    ValidationInvalidImport(#[from] ImportValidationError),

    #[error("ValidationBadRequest: {0}")]
    ValidationBadRequest(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("ServerCryptError: {0}")]
    ServerCryptError(#[from] CryptError),

    #[error("ServerStorageError: {0}")]
    ServerStorageError(#[from] StorageError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServerCryptError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServerStorageError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ServerCryptError(_) => String::from("Internal server error."),
            Self::ServerStorageError(_) => String::from("Storage error, please retry later."),
        }
    }
}

impl AuthenticationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthenticationForbidden => StatusCode::FORBIDDEN,
            Self::AuthenticationInvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AuthenticationProviderError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::AuthenticationRequired => String::from("Authentication required."),
            Self::AuthenticationForbidden => {
                String::from("Access denied: Admin privileges required")
            }
            Self::AuthenticationInvalidCredentials => String::from("Invalid login credentials"),
            Self::AuthenticationProviderError(_) => {
                String::from("Authentication error, identity provider unavailable.")
            }
        }
    }
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceConflict { .. } => StatusCode::CONFLICT,
            Self::ResourceFetchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceNotFound { .. } => String::from("Resource error, resource not found."),
            Self::ResourceConflict { .. } => String::from("Resource error, resource already exists."),
            Self::ResourceFetchError { .. } => {
                String::from("Resource error, unable to fetch resource.")
            }
        }
    }
}

impl ValidationError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ValidationInvalidPayload(errors) => {
                let mut messages: Vec<String> = errors
                    .field_errors()
                    .into_iter()
                    .flat_map(|(field, errs)| {
                        errs.iter().map(move |e| match &e.message {
                            Some(message) => message.to_string(),
                            None => format!("{field} is invalid"),
                        })
                    })
                    .collect();
                messages.sort();
                messages.join("; ")
            }
            Self::ValidationInvalidUpload(e) => e.to_string(),
            Self::ValidationInvalidImport(e) => e.to_string(),
            Self::ValidationBadRequest(message) => message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("ResourceError - {0}")]
    ResourceError(#[from] ResourceError),
    #[error("AuthenticationError - {0}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("ValidationError - {0}")]
    ValidationError(#[from] ValidationError),
    #[error("ServerError - {0}")]
    ServerError(#[from] ServerError),
}

impl WebError {
    pub fn resource_not_found(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceNotFound {
            resource_type: r#type,
        })
    }

    /// Unique violations become 409, everything else 500.
    pub fn resource_fetch_error(r#type: ResourceType, error: DatabaseError) -> Self {
        if error.is_conflict() {
            return Self::ResourceError(ResourceError::ResourceConflict {
                resource_type: r#type,
            });
        }
        Self::ResourceError(ResourceError::ResourceFetchError {
            resource_type: r#type,
            error,
        })
    }

    pub fn auth_required() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
    }

    pub fn auth_forbidden() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationForbidden)
    }

    pub fn auth_invalid_credentials() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationInvalidCredentials)
    }

    pub fn invalid_payload(errors: validator::ValidationErrors) -> Self {
        Self::ValidationError(ValidationError::ValidationInvalidPayload(errors))
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::ValidationError(ValidationError::ValidationBadRequest(message.into()))
    }

    pub fn from_oauth(e: OAuthError) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationProviderError(e))
    }

    pub fn server_crypt_error(e: CryptError) -> Self {
        Self::ServerError(ServerError::ServerCryptError(e))
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::ResourceError(e) => e.status_code(),
            Self::AuthenticationError(e) => e.status_code(),
            Self::ValidationError(e) => e.status_code(),
            Self::ServerError(e) => e.status_code(),
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceError(e) => e.client_display(),
            Self::AuthenticationError(e) => e.client_display(),
            Self::ValidationError(e) => e.client_display(),
            Self::ServerError(e) => e.client_display(),
        }
    }
}

impl From<UploadError> for WebError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::NotFound(_) => Self::resource_not_found(ResourceType::Upload),
            UploadError::Storage(e) if !matches!(
                e,
                StorageError::NoSuchUpload(_) | StorageError::InvalidPart(_)
            ) => Self::ServerError(ServerError::ServerStorageError(e)),
            other => Self::ValidationError(ValidationError::ValidationInvalidUpload(other)),
        }
    }
}

impl From<ImportError> for WebError {
    fn from(error: ImportError) -> Self {
        match error {
            ImportError::Validation(e) => Self::ValidationError(e.into()),
            ImportError::Database(e) => Self::resource_fetch_error(ResourceType::QuizCard, e),
            ImportError::Storage(e) => Self::ServerError(e.into()),
            ImportError::DeckNotFound(_) => Self::resource_not_found(ResourceType::QuizDeck),
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message for the client
    pub message: String,
    /// HTTP status code (stringified)
    pub status_code: String,
    /// Optional debug details (only in debug mode)
    pub details: Option<String>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        log_error(&self);

        let status_code = self.status_code();
        let display = self.client_display();

        let body = ErrorResponse {
            message: display,
            status_code: status_code.as_str().to_string(),
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        };

        (status_code, Json(body)).into_response()
    }
}
