use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use chrono::Utc;

use super::{
    CompletedPart, ObjectMeta, ObjectStore, PostPolicy, SignedUrl, StorageError, StorageResult,
    UploadParams,
};
use crate::config::StorageSettings;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    credentials: Option<SharedCredentialsProvider>,
    settings: StorageSettings,
}

fn sdk_error<E, R>(error: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = error
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);

    match code.as_deref() {
        Some("NoSuchUpload") => StorageError::NoSuchUpload(DisplayErrorContext(&error).to_string()),
        Some("InvalidPart" | "InvalidPartOrder" | "EntityTooSmall") => {
            StorageError::InvalidPart(DisplayErrorContext(&error).to_string())
        }
        Some("NoSuchKey") => StorageError::NotFound(DisplayErrorContext(&error).to_string()),
        _ => StorageError::Backend(DisplayErrorContext(&error).to_string()),
    }
}

fn presigning(expires_in: Duration) -> StorageResult<PresigningConfig> {
    PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign(e.to_string()))
}

impl S3Store {
    #[tracing::instrument(skip_all)]
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region().to_string()));
        if let Some(endpoint) = settings.endpoint() {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style())
            .build();

        Self {
            client: Client::from_conf(s3_config),
            credentials: sdk_config.credentials_provider(),
            settings: settings.clone(),
        }
    }

    fn post_url(&self) -> String {
        match self.settings.endpoint() {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.settings.bucket()),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                self.settings.bucket(),
                self.settings.region()
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(skip(self))]
    async fn upload_params(
        &self,
        key: &str,
        content_type: &str,
        max_size: u64,
    ) -> StorageResult<UploadParams> {
        let provider = self
            .credentials
            .as_ref()
            .ok_or(StorageError::MissingCredentials)?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;

        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(self.settings.post_expiry().as_secs() as i64);
        let policy = PostPolicy::new(self.settings.bucket(), key, content_type, max_size, expires_at);

        Ok(UploadParams {
            url: self.post_url(),
            fields: policy.sign_v4(
                credentials.access_key_id(),
                credentials.secret_access_key(),
                credentials.session_token(),
                self.settings.region(),
                now,
            ),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn download_url(&self, key: &str) -> StorageResult<SignedUrl> {
        let expiry = self.settings.download_expiry();
        let request = self
            .client
            .get_object()
            .bucket(self.settings.bucket())
            .key(key)
            .presigned(presigning(expiry)?)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(SignedUrl {
            url: request.uri().to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expiry.as_secs() as i64),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let result = self
            .client
            .head_object()
            .bucket(self.settings.bucket())
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(ObjectMeta {
                size: output.content_length().unwrap_or_default().max(0) as u64,
            })),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(e) => Err(sdk_error(e)),
        }
    }

    #[tracing::instrument(skip(self, body))]
    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>)
    -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(self.settings.bucket())
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(self.settings.bucket())
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn create_multipart(&self, key: &str, content_type: &str) -> StorageResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(self.settings.bucket())
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Backend(String::from("no upload id returned")))
    }

    #[tracing::instrument(skip(self))]
    async fn sign_part(&self, key: &str, upload_id: &str, part_number: i32)
    -> StorageResult<SignedUrl> {
        let expiry = self.settings.part_expiry();
        let request = self
            .client
            .upload_part()
            .bucket(self.settings.bucket())
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning(expiry)?)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(SignedUrl {
            url: request.uri().to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expiry.as_secs() as i64),
        })
    }

    #[tracing::instrument(skip(self, parts), fields(parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let parts = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .e_tag(&p.etag)
                    .part_number(p.part_number)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(self.settings.bucket())
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(self.settings.bucket())
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
