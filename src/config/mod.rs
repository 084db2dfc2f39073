use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{find_config_file, read_config};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    storage: StorageSettings,
    #[serde(default)]
    import: ImportSettings,
    oauth: Option<OAuthSettings>,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_session_hours")]
    session_hours: i64,
    #[serde(default)]
    frontend_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    backend: StorageBackend,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    #[serde(default)]
    force_path_style: bool,
    /// Base URL the in-memory backend puts into signed URLs.
    #[serde(default = "default_public_url")]
    public_url: String,
    #[serde(default = "default_multipart_threshold")]
    multipart_threshold: u64,
    #[serde(default = "default_max_upload_size")]
    max_upload_size: u64,
    #[serde(default = "default_hour")]
    post_expiry_secs: u64,
    #[serde(default = "default_hour")]
    part_expiry_secs: u64,
    #[serde(default = "default_week")]
    download_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportSettings {
    #[serde(default = "default_max_csv_size")]
    max_csv_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthSettings {
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    redirect_url: String,
    #[serde(default = "default_scopes")]
    scopes: String,
}

fn default_session_hours() -> i64 {
    24
}

fn default_public_url() -> String {
    String::from("http://127.0.0.1:5000/storage")
}

fn default_multipart_threshold() -> u64 {
    100 * 1024 * 1024
}

fn default_max_upload_size() -> u64 {
    1000 * 1024 * 1024
}

fn default_max_csv_size() -> usize {
    500 * 1024 * 1024
}

fn default_hour() -> u64 {
    3600
}

fn default_week() -> u64 {
    7 * 24 * 3600
}

fn default_scopes() -> String {
    String::from("openid email profile")
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_csv_size: default_max_csv_size(),
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let text = read_config(use_local)?;
                    let config: Self = toml::from_str(&text)?;
                    Ok(config)
                };

                let config = match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Config not found.");
                        std::process::exit(1);
                    }
                };

                config
            })
            .await
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    #[inline]
    pub fn import(&self) -> &ImportSettings {
        &self.import
    }

    #[inline]
    pub fn oauth(&self) -> Option<&OAuthSettings> {
        self.oauth.as_ref()
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    #[inline]
    pub fn session_hours(&self) -> i64 {
        self.session_hours
    }

    #[inline]
    pub fn frontend_url(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }
}

impl StorageSettings {
    #[inline]
    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[inline]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    #[inline]
    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    #[inline]
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    #[inline]
    pub fn multipart_threshold(&self) -> u64 {
        self.multipart_threshold
    }

    #[inline]
    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    #[inline]
    pub fn post_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.post_expiry_secs)
    }

    #[inline]
    pub fn part_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.part_expiry_secs)
    }

    #[inline]
    pub fn download_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download_expiry_secs)
    }

    /// Settings for an in-memory store, used when no config file is involved.
    pub fn memory(bucket: &str, public_url: &str) -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: bucket.to_string(),
            region: String::from("local"),
            endpoint: None,
            force_path_style: true,
            public_url: public_url.to_string(),
            multipart_threshold: default_multipart_threshold(),
            max_upload_size: default_max_upload_size(),
            post_expiry_secs: default_hour(),
            part_expiry_secs: default_hour(),
            download_expiry_secs: default_week(),
        }
    }

    pub fn with_part_expiry_secs(mut self, secs: u64) -> Self {
        self.part_expiry_secs = secs;
        self
    }
}

impl ImportSettings {
    #[inline]
    pub fn max_csv_size(&self) -> usize {
        self.max_csv_size
    }
}

impl OAuthSettings {
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[inline]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[inline]
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    #[inline]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    #[inline]
    pub fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }

    #[inline]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    #[inline]
    pub fn scopes(&self) -> &str {
        &self.scopes
    }
}
