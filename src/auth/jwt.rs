use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the `SID` session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_user(user_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}

pub fn encode_session<K: AsRef<[u8]>>(
    claims: &SessionClaims,
    key: K,
) -> jsonwebtoken::errors::Result<String> {
    let key = EncodingKey::from_secret(key.as_ref());
    jsonwebtoken::encode(&Header::default(), claims, &key)
}

pub fn decode_session<K: AsRef<[u8]>>(
    token: &str,
    key: K,
) -> jsonwebtoken::errors::Result<SessionClaims> {
    let key = DecodingKey::from_secret(key.as_ref());
    let data = jsonwebtoken::decode::<SessionClaims>(token, &key, &Validation::default())?;
    Ok(data.claims)
}
