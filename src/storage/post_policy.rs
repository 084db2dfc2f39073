//! Browser-based POST upload policies.
//!
//! `aws-sdk-s3` only presigns single requests, so POST policies are built and
//! signed (SigV4) here.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, Clone)]
pub struct PostPolicy {
    bucket: String,
    key: String,
    content_type: String,
    max_size: u64,
    expires_at: DateTime<Utc>,
}

impl PostPolicy {
    pub fn new(
        bucket: &str,
        key: &str,
        content_type: &str,
        max_size: u64,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            max_size,
            expires_at,
        }
    }

    fn document(&self, extra: &[(&str, &str)]) -> Value {
        let mut conditions = vec![
            json!({ "bucket": self.bucket }),
            json!({ "key": self.key }),
            json!(["content-length-range", 0, self.max_size]),
            json!(["starts-with", "$Content-Type", self.content_type]),
        ];
        conditions.extend(extra.iter().map(|(name, value)| {
            let mut condition = serde_json::Map::new();
            condition.insert(name.to_string(), Value::from(*value));
            Value::Object(condition)
        }));

        json!({
            "expiration": self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "conditions": conditions,
        })
    }

    pub fn encode(&self, extra: &[(&str, &str)]) -> String {
        STANDARD.encode(self.document(extra).to_string())
    }

    fn base_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(String::from("key"), self.key.clone());
        fields.insert(String::from("Content-Type"), self.content_type.clone());
        fields
    }

    /// SigV4-signed form fields for S3.
    pub fn sign_v4(
        &self,
        access_key: &str,
        secret_key: &str,
        session_token: Option<&str>,
        region: &str,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, String> {
        let date = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!("{access_key}/{date}/{region}/s3/aws4_request");

        let mut extra = vec![
            ("x-amz-algorithm", ALGORITHM),
            ("x-amz-credential", credential.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        if let Some(token) = session_token {
            extra.push(("x-amz-security-token", token));
        }

        let policy = self.encode(&extra);
        let key = signing_key(secret_key, &date, region, "s3");
        let signature = hex::encode(hmac_sha256(&key, policy.as_bytes()));

        let mut fields = self.base_fields();
        fields.insert(String::from("bucket"), self.bucket.clone());
        fields.insert(String::from("X-Amz-Algorithm"), ALGORITHM.to_string());
        fields.insert(String::from("X-Amz-Credential"), credential);
        fields.insert(String::from("X-Amz-Date"), amz_date);
        if let Some(token) = session_token {
            fields.insert(String::from("X-Amz-Security-Token"), token.to_string());
        }
        fields.insert(String::from("Policy"), policy);
        fields.insert(String::from("X-Amz-Signature"), signature);
        fields
    }

    /// Form fields signed with a plain HMAC secret (in-memory store).
    pub fn sign_hmac(&self, secret: &[u8]) -> BTreeMap<String, String> {
        let policy = self.encode(&[]);
        let signature = hex::encode(hmac_sha256(secret, policy.as_bytes()));

        let mut fields = self.base_fields();
        fields.insert(String::from("Policy"), policy);
        fields.insert(String::from("X-Signature"), signature);
        fields
    }
}

pub fn decode_policy(encoded: &str) -> Option<Value> {
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// SigV4 signing key: `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`.
pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}
