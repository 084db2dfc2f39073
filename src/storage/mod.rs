//! Object storage gateway.
//!
//! Handlers never talk to a storage SDK directly: they get an
//! `Arc<dyn ObjectStore>` out of `AppState`, built once from the `[storage]`
//! config section by [`connect`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{StorageBackend, StorageSettings};

mod error;
pub use error::{StorageError, StorageResult};

mod memory;
pub use memory::MemoryStore;

mod post_policy;
pub use post_policy::PostPolicy;

mod s3;
pub use s3::S3Store;

/// Form target for a browser-side presigned POST.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadParams {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CompletedPart {
    pub etag: String,
    pub part_number: i32,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Presigned POST restricted to `key`, at most `max_size` bytes and a
    /// `Content-Type` starting with `content_type`.
    async fn upload_params(
        &self,
        key: &str,
        content_type: &str,
        max_size: u64,
    ) -> StorageResult<UploadParams>;

    async fn download_url(&self, key: &str) -> StorageResult<SignedUrl>;

    /// `None` when the object does not exist.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>)
    -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn create_multipart(&self, key: &str, content_type: &str) -> StorageResult<String>;

    async fn sign_part(&self, key: &str, upload_id: &str, part_number: i32)
    -> StorageResult<SignedUrl>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.head(key).await?.is_some())
    }
}

const URL_KEY_LABEL: &[u8] = b"skilltune/object-store-urls";

/// Key the in-memory backend signs its URLs with. Derived from the session
/// secret under a fixed label so the session key itself never signs a URL.
pub fn url_signing_secret(app_secret: &str) -> String {
    hex::encode(post_policy::hmac_sha256(app_secret.as_bytes(), URL_KEY_LABEL))
}

/// Builds the store selected by `settings`. URLs of the in-memory backend
/// are signed with a key derived from `app_secret`.
#[tracing::instrument(skip(app_secret))]
pub async fn connect(settings: &StorageSettings, app_secret: &str) -> Arc<dyn ObjectStore> {
    match settings.backend() {
        StorageBackend::S3 => {
            tracing::debug!("using s3 bucket `{}`", settings.bucket());
            Arc::new(S3Store::from_settings(settings).await)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory object storage, uploads are not persisted");
            Arc::new(MemoryStore::new(settings.clone(), &url_signing_secret(app_secret)))
        }
    }
}
