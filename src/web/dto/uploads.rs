use serde::{Deserialize, Serialize};

use crate::storage::CompletedPart;

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SignPartBody {
    pub key: String,
    pub upload_id: String,
    pub part_number: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CompleteBody {
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AbortBody {
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ExistsResponse {
    pub exists: bool,
}
