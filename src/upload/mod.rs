//! Lesson asset uploads.
//!
//! Small files go straight from the browser to storage with a presigned POST.
//! Large files use a multipart session: the client asks for one signed URL
//! per part, PUTs the bytes itself and reports the ETags back on completion.
//! No asset bytes pass through this service.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::storage::{CompletedPart, ObjectStore, SignedUrl};

mod error;
pub use error::{UploadError, UploadResult};

pub const MAX_PART_NUMBER: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Pdf,
    Video,
}

impl AssetKind {
    pub fn from_content_type(content_type: &str) -> UploadResult<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            ct if ct.len() > "video/".len() && ct.starts_with("video/") => Ok(Self::Video),
            _ => Err(UploadError::UnsupportedContentType(content_type.to_string())),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Pdf => "pdfs",
            Self::Video => "videos",
        }
    }
}

/// `<pdfs|videos>/<uuid><.ext>`, extension taken from the client filename.
pub fn object_key(kind: AssetKind, filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{}/{}{}", kind.prefix(), Uuid::new_v4(), extension)
}

fn check_key(key: &str) -> UploadResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|segment| !segment.is_empty() && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidKey(key.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SingleUpload {
    pub key: String,
    pub url: String,
    pub fields: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MultipartSession {
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum UploadPlan {
    Single {
        key: String,
        url: String,
        fields: std::collections::BTreeMap<String, String>,
    },
    Multipart {
        key: String,
        upload_id: String,
    },
}

impl From<SingleUpload> for UploadPlan {
    fn from(value: SingleUpload) -> Self {
        Self::Single {
            key: value.key,
            url: value.url,
            fields: value.fields,
        }
    }
}

impl From<MultipartSession> for UploadPlan {
    fn from(value: MultipartSession) -> Self {
        Self::Multipart {
            key: value.key,
            upload_id: value.upload_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DownloadInfo {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn ObjectStore>,
    multipart_threshold: u64,
    max_upload_size: u64,
}

impl UploadOrchestrator {
    pub fn new(storage: Arc<dyn ObjectStore>, settings: &StorageSettings) -> Self {
        Self {
            storage,
            multipart_threshold: settings.multipart_threshold(),
            max_upload_size: settings.max_upload_size(),
        }
    }

    fn check_request(&self, request: &UploadRequest) -> UploadResult<AssetKind> {
        let kind = AssetKind::from_content_type(&request.content_type)?;
        if request.size > self.max_upload_size {
            return Err(UploadError::TooLarge {
                size: request.size,
                max: self.max_upload_size,
            });
        }
        Ok(kind)
    }

    /// Single POST up to the multipart threshold, multipart above it.
    #[tracing::instrument(skip(self))]
    pub async fn plan(&self, request: &UploadRequest) -> UploadResult<UploadPlan> {
        self.check_request(request)?;
        if request.size <= self.multipart_threshold {
            Ok(self.upload_params(request).await?.into())
        } else {
            Ok(self.create_multipart(request).await?.into())
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn upload_params(&self, request: &UploadRequest) -> UploadResult<SingleUpload> {
        let kind = self.check_request(request)?;
        let key = object_key(kind, &request.filename);
        let params = self
            .storage
            .upload_params(&key, &request.content_type, self.max_upload_size)
            .await?;

        Ok(SingleUpload {
            key,
            url: params.url,
            fields: params.fields,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_multipart(&self, request: &UploadRequest) -> UploadResult<MultipartSession> {
        let kind = self.check_request(request)?;
        let key = object_key(kind, &request.filename);
        let upload_id = self
            .storage
            .create_multipart(&key, &request.content_type)
            .await?;

        tracing::info!("multipart upload created for `{key}`");
        Ok(MultipartSession { key, upload_id })
    }

    #[tracing::instrument(skip(self))]
    pub async fn sign_part(&self, key: &str, upload_id: &str, part_number: i32) -> UploadResult<SignedUrl> {
        check_key(key)?;
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(UploadError::InvalidPartNumber(part_number));
        }
        Ok(self.storage.sign_part(key, upload_id, part_number).await?)
    }

    /// Parts may arrive in any order, storage gets them sorted.
    #[tracing::instrument(skip(self, parts), fields(parts = parts.len()))]
    pub async fn complete(&self, key: &str, upload_id: &str, mut parts: Vec<CompletedPart>) -> UploadResult<()> {
        check_key(key)?;
        if parts.is_empty() {
            return Err(UploadError::NoParts);
        }
        if let Some(bad) = parts.iter().find(|p| !(1..=MAX_PART_NUMBER).contains(&p.part_number)) {
            return Err(UploadError::InvalidPartNumber(bad.part_number));
        }

        parts.sort_by_key(|p| p.part_number);
        self.storage.complete_multipart(key, upload_id, &parts).await?;
        tracing::info!("multipart upload of `{key}` completed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn abort(&self, key: &str, upload_id: &str) -> UploadResult<()> {
        check_key(key)?;
        self.storage.abort_multipart(key, upload_id).await?;
        tracing::info!("multipart upload of `{key}` aborted");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn download(&self, key: &str) -> UploadResult<DownloadInfo> {
        check_key(key)?;
        let meta = self
            .storage
            .head(key)
            .await?
            .ok_or_else(|| UploadError::NotFound(key.to_string()))?;
        let signed = self.storage.download_url(key).await?;

        Ok(DownloadInfo {
            url: signed.url,
            expires_at: signed.expires_at,
            size: meta.size,
        })
    }

    pub async fn exists(&self, key: &str) -> UploadResult<bool> {
        check_key(key)?;
        Ok(self.storage.exists(key).await?)
    }

    /// Deletes `old` once `new` has replaced it. Failures are only logged.
    pub async fn replace_asset(&self, old: &str, new: &str) {
        if old != new && !old.is_empty() {
            self.discard(old).await;
        }
    }

    /// Best-effort delete.
    pub async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!("unable to delete `{key}` from storage: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::storage::{MemoryStore, StorageError};

    fn setup(part_expiry_secs: u64) -> (Arc<MemoryStore>, UploadOrchestrator) {
        let settings = StorageSettings::memory("bucket", "http://localhost/storage")
            .with_part_expiry_secs(part_expiry_secs);
        let store = Arc::new(MemoryStore::new(settings.clone(), "secret"));
        let orchestrator = UploadOrchestrator::new(store.clone(), &settings);
        (store, orchestrator)
    }

    fn request(content_type: &str, size: u64) -> UploadRequest {
        UploadRequest {
            filename: String::from("Lecture.MP4"),
            content_type: content_type.to_string(),
            size,
        }
    }

    #[test]
    fn asset_kind_test() {
        assert_eq!(AssetKind::from_content_type("application/pdf").unwrap(), AssetKind::Pdf);
        assert_eq!(AssetKind::from_content_type("video/webm").unwrap(), AssetKind::Video);
        assert!(AssetKind::from_content_type("video/").is_err());
        assert!(AssetKind::from_content_type("image/png").is_err());
    }

    #[test]
    fn object_key_test() {
        let key = object_key(AssetKind::Video, "Lecture.MP4");
        assert!(key.starts_with("videos/"));
        assert!(key.ends_with(".mp4"));
        let id = key.trim_start_matches("videos/").trim_end_matches(".mp4");
        assert!(Uuid::parse_str(id).is_ok());

        let key = object_key(AssetKind::Pdf, "notes");
        assert!(key.starts_with("pdfs/"));
        assert!(!key.contains('.'));
    }

    #[tokio::test]
    async fn plan_by_size_test() {
        let (_, orchestrator) = setup(3600);
        let threshold = 100 * 1024 * 1024;

        let small = orchestrator.plan(&request("video/mp4", threshold)).await.unwrap();
        assert!(matches!(small, UploadPlan::Single { ref fields, .. } if fields.contains_key("Policy")));

        let large = orchestrator.plan(&request("video/mp4", threshold + 1)).await.unwrap();
        assert!(matches!(large, UploadPlan::Multipart { ref key, .. } if key.starts_with("videos/")));

        let too_large = orchestrator.plan(&request("video/mp4", 2000 * 1024 * 1024)).await;
        assert!(matches!(too_large, Err(UploadError::TooLarge { .. })));

        let wrong = orchestrator.plan(&request("text/plain", 10)).await;
        assert!(matches!(wrong, Err(UploadError::UnsupportedContentType(_))));
    }

    #[tokio::test]
    async fn multipart_out_of_order_test() {
        let (store, orchestrator) = setup(3600);
        let session = orchestrator.create_multipart(&request("video/mp4", 10)).await.unwrap();

        let mut parts = Vec::new();
        for (part_number, body) in [(2, b"world".to_vec()), (1, b"hello ".to_vec())] {
            let signed = orchestrator
                .sign_part(&session.key, &session.upload_id, part_number)
                .await
                .unwrap();
            let etag = store.put_signed(&signed.url, body).await.unwrap();
            parts.push(CompletedPart { etag, part_number });
        }

        orchestrator
            .complete(&session.key, &session.upload_id, parts)
            .await
            .unwrap();
        assert_eq!(store.object(&session.key).await.unwrap().body, b"hello world");

        let info = orchestrator.download(&session.key).await.unwrap();
        assert_eq!(info.size, 11);
    }

    #[tokio::test]
    async fn missing_part_rejected_test() {
        let (store, orchestrator) = setup(3600);
        let session = orchestrator.create_multipart(&request("video/mp4", 10)).await.unwrap();

        let signed = orchestrator.sign_part(&session.key, &session.upload_id, 1).await.unwrap();
        let etag = store.put_signed(&signed.url, b"only".to_vec()).await.unwrap();

        let parts = vec![
            CompletedPart { etag, part_number: 1 },
            CompletedPart {
                etag: String::from("\"missing\""),
                part_number: 2,
            },
        ];
        let result = orchestrator.complete(&session.key, &session.upload_id, parts).await;
        assert!(matches!(result, Err(UploadError::Storage(StorageError::InvalidPart(_)))));
        assert!(!store.exists(&session.key).await.unwrap());
    }

    #[tokio::test]
    async fn part_validation_test() {
        let (_, orchestrator) = setup(3600);
        let session = orchestrator.create_multipart(&request("video/mp4", 10)).await.unwrap();

        for n in [0, MAX_PART_NUMBER + 1] {
            let result = orchestrator.sign_part(&session.key, &session.upload_id, n).await;
            assert!(matches!(result, Err(UploadError::InvalidPartNumber(_))));
        }
        assert!(orchestrator.sign_part(&session.key, &session.upload_id, MAX_PART_NUMBER).await.is_ok());

        let result = orchestrator.complete(&session.key, &session.upload_id, vec![]).await;
        assert!(matches!(result, Err(UploadError::NoParts)));

        let result = orchestrator.sign_part("../etc", &session.upload_id, 1).await;
        assert!(matches!(result, Err(UploadError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn part_url_expires_test() {
        let (store, orchestrator) = setup(60);
        let session = orchestrator.create_multipart(&request("video/mp4", 10)).await.unwrap();
        let signed = orchestrator.sign_part(&session.key, &session.upload_id, 1).await.unwrap();

        let within = signed.expires_at - Duration::seconds(1);
        assert!(store.put_signed_at(&signed.url, b"a".to_vec(), within).await.is_ok());

        let after = signed.expires_at + Duration::seconds(1);
        let result = store.put_signed_at(&signed.url, b"a".to_vec(), after).await;
        assert!(matches!(result, Err(StorageError::Expired)));
    }

    #[tokio::test]
    async fn abort_discards_session_test() {
        let (store, orchestrator) = setup(3600);
        let session = orchestrator.create_multipart(&request("video/mp4", 10)).await.unwrap();
        assert_eq!(store.pending_uploads().await, 1);

        orchestrator.abort(&session.key, &session.upload_id).await.unwrap();
        assert_eq!(store.pending_uploads().await, 0);

        let signed = orchestrator.sign_part(&session.key, &session.upload_id, 1).await.unwrap();
        let result = store.put_signed(&signed.url, b"late".to_vec()).await;
        assert!(matches!(result, Err(StorageError::NoSuchUpload(_))));
    }

    #[tokio::test]
    async fn replace_asset_test() {
        let (store, orchestrator) = setup(3600);
        store.put_object("pdfs/old.pdf", "application/pdf", vec![1]).await.unwrap();
        store.put_object("pdfs/new.pdf", "application/pdf", vec![2]).await.unwrap();

        orchestrator.replace_asset("pdfs/new.pdf", "pdfs/new.pdf").await;
        assert!(store.exists("pdfs/new.pdf").await.unwrap());

        orchestrator.replace_asset("pdfs/old.pdf", "pdfs/new.pdf").await;
        assert!(!store.exists("pdfs/old.pdf").await.unwrap());

        let missing = orchestrator.download("pdfs/old.pdf").await;
        assert!(matches!(missing, Err(UploadError::NotFound(_))));
    }
}
