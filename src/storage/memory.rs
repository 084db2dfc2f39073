//! In-process object store.
//!
//! Signs its URLs with an HMAC secret and enforces expiry, policy conditions
//! and multipart bookkeeping the same way the real backend would, so the
//! upload flow can be exercised without S3.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use super::post_policy::{PostPolicy, decode_policy, hmac_sha256};
use super::{
    CompletedPart, ObjectMeta, ObjectStore, SignedUrl, StorageError, StorageResult, UploadParams,
};
use crate::config::StorageSettings;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    content_type: String,
    parts: BTreeMap<i32, (String, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct Buckets {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
}

#[derive(Debug)]
pub struct MemoryStore {
    settings: StorageSettings,
    secret: Vec<u8>,
    inner: Mutex<Buckets>,
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::seconds(duration.as_secs() as i64)
}

fn etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", &hex::encode(digest)[..32])
}

impl MemoryStore {
    pub fn new(settings: StorageSettings, secret: &str) -> Self {
        Self {
            settings,
            secret: secret.as_bytes().to_vec(),
            inner: Mutex::new(Buckets::default()),
        }
    }

    fn object_url(&self, key: &str) -> StorageResult<Url> {
        let base = format!("{}/{}/{}", self.settings.public_url(), self.settings.bucket(), key);
        Url::parse(&base).map_err(StorageError::backend)
    }

    fn key_from_url(&self, url: &Url) -> StorageResult<String> {
        let prefix = format!("{}/{}/", self.settings.public_url(), self.settings.bucket());
        let without_query = url.as_str().split('?').next().unwrap_or_default();
        without_query
            .strip_prefix(&prefix)
            .map(str::to_string)
            .ok_or_else(|| StorageError::Rejected(String::from("url does not point into bucket")))
    }

    fn signature(&self, method: &str, key: &str, extra: &str, expires: i64) -> String {
        let canonical = format!("{method}\n{key}\n{extra}\n{expires}");
        hex::encode(hmac_sha256(&self.secret, canonical.as_bytes()))
    }

    fn sign(&self, method: &str, key: &str, query: &[(&str, String)], ttl: Duration)
    -> StorageResult<SignedUrl> {
        let expires_at = Utc::now() + ttl;
        let extra = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.signature(method, key, &extra, expires_at.timestamp());

        let mut url = self.object_url(key)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("expires", &expires_at.timestamp().to_string());
            pairs.append_pair("signature", &signature);
        }

        Ok(SignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }

    /// Checks signature and expiry of `url` for `method`, returning the key
    /// and the signed query parameters other than `expires`/`signature`.
    fn verify(&self, method: &str, url: &str, at: DateTime<Utc>)
    -> StorageResult<(String, Vec<(String, String)>)> {
        let url = Url::parse(url).map_err(|e| StorageError::Rejected(e.to_string()))?;
        let key = self.key_from_url(&url)?;

        let mut expires = None;
        let mut signature = None;
        let mut signed = Vec::new();
        for (k, v) in url.query_pairs().into_owned() {
            match k.as_str() {
                "expires" => expires = v.parse::<i64>().ok(),
                "signature" => signature = Some(v),
                _ => signed.push((k, v)),
            }
        }

        let expires =
            expires.ok_or_else(|| StorageError::Rejected(String::from("missing expiry")))?;
        let signature =
            signature.ok_or_else(|| StorageError::Rejected(String::from("missing signature")))?;

        let extra = signed
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if self.signature(method, &key, &extra, expires) != signature {
            return Err(StorageError::Rejected(String::from("signature mismatch")));
        }
        if at.timestamp() > expires {
            return Err(StorageError::Expired);
        }

        Ok((key, signed))
    }

    /// Client-side `PUT` against a signed part URL, as seen at time `at`.
    /// Returns the part's ETag.
    pub async fn put_signed_at(&self, url: &str, body: Vec<u8>, at: DateTime<Utc>)
    -> StorageResult<String> {
        let (key, signed) = self.verify("PUT", url, at)?;
        let param = |name: &str| {
            signed
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let upload_id = param("uploadId")
            .ok_or_else(|| StorageError::Rejected(String::from("missing uploadId")))?;
        let part_number = param("partNumber")
            .and_then(|n| n.parse::<i32>().ok())
            .ok_or_else(|| StorageError::Rejected(String::from("missing partNumber")))?;

        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get_mut(&upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.clone()))?;

        let tag = etag(&body);
        upload.parts.insert(part_number, (tag.clone(), body));
        Ok(tag)
    }

    pub async fn put_signed(&self, url: &str, body: Vec<u8>) -> StorageResult<String> {
        self.put_signed_at(url, body, Utc::now()).await
    }

    /// Client-side `GET` against a signed download URL.
    pub async fn get_signed_at(&self, url: &str, at: DateTime<Utc>) -> StorageResult<Vec<u8>> {
        let (key, _) = self.verify("GET", url, at)?;
        self.object(&key)
            .await
            .map(|o| o.body)
            .ok_or(StorageError::NotFound(key))
    }

    /// Browser-side form POST built from `upload_params`, as seen at time `at`.
    pub async fn post_form_at(
        &self,
        fields: &BTreeMap<String, String>,
        content_type: &str,
        body: Vec<u8>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let field = |name: &str| {
            fields
                .get(name)
                .ok_or_else(|| StorageError::Rejected(format!("missing form field `{name}`")))
        };
        let policy = field("Policy")?;
        let key = field("key")?;

        if hex::encode(hmac_sha256(&self.secret, policy.as_bytes())) != *field("X-Signature")? {
            return Err(StorageError::Rejected(String::from("policy signature mismatch")));
        }

        let doc = decode_policy(policy)
            .ok_or_else(|| StorageError::Rejected(String::from("malformed policy")))?;
        check_policy(&doc, key, content_type, body.len() as u64, at)?;

        self.inner.lock().await.objects.insert(
            key.clone(),
            StoredObject {
                content_type: content_type.to_string(),
                body,
            },
        );
        Ok(())
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.inner.lock().await.objects.get(key).cloned()
    }

    pub async fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().await.objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn pending_uploads(&self) -> usize {
        self.inner.lock().await.uploads.len()
    }
}

fn check_policy(doc: &Value, key: &str, content_type: &str, size: u64, at: DateTime<Utc>)
-> StorageResult<()> {
    let reject = |reason: &str| Err(StorageError::Rejected(reason.to_string()));

    let expiration = doc["expiration"]
        .as_str()
        .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
        .ok_or_else(|| StorageError::Rejected(String::from("policy without expiration")))?;
    if at > expiration {
        return Err(StorageError::Expired);
    }

    let conditions = doc["conditions"].as_array().cloned().unwrap_or_default();
    for condition in &conditions {
        match condition {
            Value::Object(map) => {
                if let Some(expected) = map.get("key").and_then(Value::as_str) {
                    if expected != key {
                        return reject("key does not match policy");
                    }
                }
            }
            Value::Array(items) => match items.first().and_then(Value::as_str) {
                Some("content-length-range") => {
                    let min = items.get(1).and_then(Value::as_u64).unwrap_or(0);
                    let max = items.get(2).and_then(Value::as_u64).unwrap_or(u64::MAX);
                    if size < min || size > max {
                        return reject("content length outside policy range");
                    }
                }
                Some("starts-with") if items.get(1).and_then(Value::as_str) == Some("$Content-Type") => {
                    let prefix = items.get(2).and_then(Value::as_str).unwrap_or_default();
                    if !content_type.starts_with(prefix) {
                        return reject("content type does not match policy");
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload_params(
        &self,
        key: &str,
        content_type: &str,
        max_size: u64,
    ) -> StorageResult<UploadParams> {
        let expires_at = Utc::now() + to_chrono(self.settings.post_expiry());
        let policy = PostPolicy::new(self.settings.bucket(), key, content_type, max_size, expires_at);

        Ok(UploadParams {
            url: format!("{}/{}", self.settings.public_url(), self.settings.bucket()),
            fields: policy.sign_hmac(&self.secret),
        })
    }

    async fn download_url(&self, key: &str) -> StorageResult<SignedUrl> {
        self.sign("GET", key, &[], to_chrono(self.settings.download_expiry()))
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        Ok(self.inner.lock().await.objects.get(key).map(|o| ObjectMeta {
            size: o.body.len() as u64,
        }))
    }

    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>)
    -> StorageResult<()> {
        self.inner.lock().await.objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                body,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        // deleting a missing object is not an error, same as S3
        self.inner.lock().await.objects.remove(key);
        Ok(())
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> StorageResult<String> {
        let upload_id = Uuid::new_v4().simple().to_string();
        self.inner.lock().await.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn sign_part(&self, key: &str, upload_id: &str, part_number: i32)
    -> StorageResult<SignedUrl> {
        let query = [
            ("partNumber", part_number.to_string()),
            ("uploadId", upload_id.to_string()),
        ];
        self.sign("PUT", key, &query, to_chrono(self.settings.part_expiry()))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        let upload = inner
            .uploads
            .get(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;

        if parts.is_empty() {
            return Err(StorageError::InvalidPart(String::from("no parts given")));
        }

        let mut body = Vec::new();
        let mut previous = 0;
        for part in parts {
            if part.part_number <= previous {
                return Err(StorageError::InvalidPart(String::from(
                    "parts must be in ascending order",
                )));
            }
            previous = part.part_number;

            match upload.parts.get(&part.part_number) {
                Some((tag, bytes)) if *tag == part.etag => body.extend_from_slice(bytes),
                _ => {
                    return Err(StorageError::InvalidPart(format!(
                        "part {} was not uploaded or its etag does not match",
                        part.part_number
                    )));
                }
            }
        }

        let content_type = upload.content_type.clone();
        inner.uploads.remove(upload_id);
        inner
            .objects
            .insert(key.to_string(), StoredObject { content_type, body });
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.uploads.get(upload_id) {
            Some(upload) if upload.key == key => {
                inner.uploads.remove(upload_id);
                Ok(())
            }
            _ => Err(StorageError::NoSuchUpload(upload_id.to_string())),
        }
    }
}
