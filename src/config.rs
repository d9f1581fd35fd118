//! Configuration management for onenote-sync
//!
//! Configuration is read from a YAML file, then overridden from `ONENOTE_*`
//! environment variables and command-line flags, then validated.

use crate::auth::client::{
    ProviderConfig, TokenRequestMethod, LIVE_AUTH_URL, LIVE_SCOPE, LIVE_TOKEN_URL,
};
use crate::error::{OneNoteError, Result};
use crate::onenote::client::ONENOTE_API_BASE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Microsoft account OAuth settings
    #[serde(default)]
    pub msaccount: MsAccountConfig,
    /// OneNote REST API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Course → section sync settings
    #[serde(default)]
    pub sync: SyncConfig,
    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Microsoft account application registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsAccountConfig {
    /// Application (client) id
    #[serde(default)]
    pub client_id: String,

    /// Application secret
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered for the application
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Requested scopes, space separated
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Authorization endpoint
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// HTTP method for the authorization-code exchange (`get` or `post`)
    #[serde(default)]
    pub code_exchange_method: TokenRequestMethod,
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/msaccount/redirect".to_string()
}

fn default_scope() -> String {
    LIVE_SCOPE.to_string()
}

fn default_auth_url() -> String {
    LIVE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    LIVE_TOKEN_URL.to_string()
}

impl Default for MsAccountConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            code_exchange_method: TokenRequestMethod::default(),
        }
    }
}

/// OneNote REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://www.onenote.com/api/beta`
    ///
    /// Tests point this at a mock server.
    #[serde(default = "default_api_base")]
    pub base_url: String,
}

fn default_api_base() -> String {
    ONENOTE_API_BASE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
        }
    }
}

/// Hierarchy sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run the sync on every top-level listing
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// Name of the notebook holding one section per course
    #[serde(default = "default_notebook_name")]
    pub notebook_name: String,
}

fn default_sync_enabled() -> bool {
    true
}

fn default_notebook_name() -> String {
    "Moodle Notebook".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            notebook_name: default_notebook_name(),
        }
    }
}

/// Where refresh tokens are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// The SQLite database shared with the mapping table
    #[default]
    Sqlite,
    /// The operating system keyring
    Keyring,
}

/// Local persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; the platform data directory is used when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Refresh-token backend
    #[serde(default)]
    pub token_backend: TokenBackend,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OneNoteError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| OneNoteError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(client_id) = std::env::var("ONENOTE_CLIENT_ID") {
            self.msaccount.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("ONENOTE_CLIENT_SECRET") {
            self.msaccount.client_secret = client_secret;
        }

        if let Ok(redirect_uri) = std::env::var("ONENOTE_REDIRECT_URI") {
            self.msaccount.redirect_uri = redirect_uri;
        }

        if let Ok(scope) = std::env::var("ONENOTE_SCOPE") {
            self.msaccount.scope = scope;
        }

        if let Ok(api_base) = std::env::var("ONENOTE_API_BASE") {
            tracing::debug!(api_base = %api_base, "Env override: ONENOTE_API_BASE");
            self.api.base_url = api_base;
        }

        if let Ok(notebook_name) = std::env::var("ONENOTE_NOTEBOOK_NAME") {
            self.sync.notebook_name = notebook_name;
        }

        if let Ok(enabled) = std::env::var("ONENOTE_SYNC_ENABLED") {
            match enabled.parse::<bool>() {
                Ok(v) => self.sync.enabled = v,
                Err(_) => tracing::warn!("Invalid ONENOTE_SYNC_ENABLED: {}", enabled),
            }
        }

        if let Ok(db_path) = std::env::var("ONENOTE_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.no_sync {
            tracing::debug!("Hierarchy sync disabled from the command line");
            self.sync.enabled = false;
        }
        if let Some(db_path) = &cli.db_path {
            self.storage.db_path = Some(db_path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::Config`] when credentials are missing, a URL
    /// does not parse, or the notebook name is empty
    pub fn validate(&self) -> Result<()> {
        if self.msaccount.client_id.trim().is_empty() {
            return Err(OneNoteError::Config("msaccount.client_id cannot be empty".into()).into());
        }

        if self.msaccount.client_secret.trim().is_empty() {
            return Err(
                OneNoteError::Config("msaccount.client_secret cannot be empty".into()).into(),
            );
        }

        for (field, value) in [
            ("msaccount.redirect_uri", &self.msaccount.redirect_uri),
            ("msaccount.auth_url", &self.msaccount.auth_url),
            ("msaccount.token_url", &self.msaccount.token_url),
            ("api.base_url", &self.api.base_url),
        ] {
            Url::parse(value).map_err(|e| {
                OneNoteError::Config(format!("{} is not a valid URL ({}): {}", field, value, e))
            })?;
        }

        if self.sync.enabled && self.sync.notebook_name.trim().is_empty() {
            return Err(OneNoteError::Config("sync.notebook_name cannot be empty".into()).into());
        }

        Ok(())
    }

    /// Build the OAuth provider settings injected into
    /// [`OAuth2Client`](crate::auth::client::OAuth2Client)
    pub fn provider(&self) -> Result<ProviderConfig> {
        let redirect_uri = Url::parse(&self.msaccount.redirect_uri).map_err(|e| {
            OneNoteError::Config(format!("msaccount.redirect_uri is not a valid URL: {}", e))
        })?;

        Ok(ProviderConfig {
            name: "msaccount".to_string(),
            client_id: self.msaccount.client_id.clone(),
            client_secret: self.msaccount.client_secret.clone(),
            redirect_uri,
            scope: self.msaccount.scope.clone(),
            auth_url: self.msaccount.auth_url.clone(),
            token_url: self.msaccount.token_url.clone(),
            code_exchange_method: self.msaccount.code_exchange_method,
        })
    }
}
