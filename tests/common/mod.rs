use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use url::Url;

use onenote_sync::auth::client::{OAuth2Client, ProviderConfig};
use onenote_sync::auth::token::AccessToken;
use onenote_sync::auth::token_store::{MemoryTokenStore, TokenStore};
use onenote_sync::onenote::client::ResourceClient;
use onenote_sync::session::Session;
use onenote_sync::storage::SqliteStorage;

/// Access token placed in sessions built by [`signed_in_session`]
#[allow(dead_code)]
pub const ACCESS_TOKEN: &str = "T";

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("onenote.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Provider whose endpoints live on the mock server at `base_url`
#[allow(dead_code)]
pub fn mock_provider(base_url: &str) -> ProviderConfig {
    let mut provider = ProviderConfig::microsoft_live(
        "test-client".to_string(),
        "test-secret".to_string(),
        Url::parse("https://lms.example.com/msaccount/redirect").expect("valid redirect"),
    );
    provider.auth_url = format!("{}/oauth20_authorize.srf", base_url);
    provider.token_url = format!("{}/oauth20_token.srf", base_url);
    provider
}

#[allow(dead_code)]
pub fn oauth_client(base_url: &str, store: Arc<dyn TokenStore>) -> OAuth2Client {
    OAuth2Client::new(reqwest::Client::new(), mock_provider(base_url), store)
}

/// Resource client with an in-memory token store and no sync
#[allow(dead_code)]
pub fn resource_client(base_url: &str) -> ResourceClient {
    let oauth = oauth_client(base_url, Arc::new(MemoryTokenStore::default()));
    ResourceClient::new(oauth, &format!("{}/api/beta", base_url))
}

/// Session for `user` holding a valid [`ACCESS_TOKEN`]
#[allow(dead_code)]
pub fn signed_in_session(user: &str) -> Session {
    let mut session = Session::new(user);
    session.store_access_token(AccessToken::from_expires_in(ACCESS_TOKEN.to_string(), 3600));
    session
}

/// `{"value": [...]}` listing body
#[allow(dead_code)]
pub fn listing(items: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "value": items })
}
