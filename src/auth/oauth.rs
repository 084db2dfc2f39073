//! Authorization-code flow against an external identity provider.
//!
//! Only the email address is taken from the provider; whether that email
//! belongs to an admin is decided by the `users` table.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::OAuthSettings;

pub type OAuthResult<T> = std::result::Result<T, OAuthError>;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("oauth is not configured")]
    NotConfigured,
    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider did not return an email")]
    MissingEmail,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    settings: OAuthSettings,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: Option<&OAuthSettings>) -> OAuthResult<Self> {
        settings
            .cloned()
            .map(Self::new)
            .ok_or(OAuthError::NotConfigured)
    }

    pub fn authorize_url(&self, state: &str) -> OAuthResult<Url> {
        let mut url = Url::parse(self.settings.authorize_url())?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.settings.client_id())
            .append_pair("redirect_uri", self.settings.redirect_url())
            .append_pair("scope", self.settings.scopes())
            .append_pair("state", state);
        Ok(url)
    }

    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> OAuthResult<String> {
        let token: TokenResponse = self
            .http
            .post(self.settings.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_url()),
                ("client_id", self.settings.client_id()),
                ("client_secret", self.settings.client_secret()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(token.access_token)
    }

    #[tracing::instrument(skip_all)]
    pub async fn fetch_email(&self, access_token: &str) -> OAuthResult<String> {
        let info: UserInfo = self
            .http
            .get(self.settings.userinfo_url())
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info.email
            .filter(|e| !e.is_empty())
            .ok_or(OAuthError::MissingEmail)
    }
}

/// Only relative paths are accepted as post-login targets.
pub fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => String::from("/"),
    }
}
