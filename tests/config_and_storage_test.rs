//! Configuration file loading and SQLite persistence tests

mod common;

use std::sync::Arc;

use serial_test::serial;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use onenote_sync::auth::client::TokenRequestMethod;
use onenote_sync::auth::token_store::TokenStore;
use onenote_sync::config::Config;
use onenote_sync::session::Session;
use onenote_sync::storage::{CourseSectionMapping, MappingStore, SqliteStorage};

use common::{create_temp_storage, oauth_client, temp_config_file};

#[test]
fn test_config_file_round_trip_into_provider() {
    let (_dir, config_path) = temp_config_file(
        r#"
msaccount:
  client_id: "000000004C12AB34"
  client_secret: "s3cret"
  redirect_uri: "https://lms.example.com/local/msaccount/msaccount_redirect.php"
  code_exchange_method: get
api:
  base_url: "http://127.0.0.1:8080/api/beta"
sync:
  notebook_name: "Course Notebook"
"#,
    );

    let config = Config::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let provider = config.provider().unwrap();
    assert_eq!(provider.client_id, "000000004C12AB34");
    assert_eq!(provider.code_exchange_method, TokenRequestMethod::Get);
    assert_eq!(
        provider.redirect_uri.as_str(),
        "https://lms.example.com/local/msaccount/msaccount_redirect.php"
    );
    assert_eq!(config.sync.notebook_name, "Course Notebook");
}

#[test]
fn test_config_file_with_invalid_yaml_is_error() {
    let (_dir, config_path) = temp_config_file("msaccount: [unclosed");
    assert!(Config::from_file(&config_path).is_err());
}

#[test]
fn test_sqlite_refresh_token_upsert_and_delete() {
    let (storage, _tmp) = create_temp_storage();

    assert!(storage.get("42").unwrap().is_none());
    storage.upsert("42", "R1").unwrap();
    storage.upsert("42", "R2").unwrap();
    assert_eq!(storage.get("42").unwrap().unwrap().token, "R2");

    storage.delete("42").unwrap();
    assert!(storage.get("42").unwrap().is_none());
}

#[test]
fn test_sqlite_state_survives_reopen() {
    let (storage, tmp) = create_temp_storage();
    storage.upsert("42", "R").unwrap();
    storage
        .upsert_mapping(&CourseSectionMapping {
            course_id: "101".to_string(),
            section_id: "sec-math".to_string(),
            user_id: "42".to_string(),
        })
        .unwrap();
    drop(storage);

    let reopened = SqliteStorage::new_with_path(tmp.path().join("onenote.db")).unwrap();
    assert_eq!(reopened.get("42").unwrap().unwrap().token, "R");
    assert_eq!(
        reopened.get_mapping("101", "42").unwrap().unwrap().section_id,
        "sec-math"
    );
}

#[tokio::test]
async fn test_code_exchange_persists_refresh_token_in_sqlite() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth20_token.srf"))
        .and(body_string_contains("code=validcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "T",
            "expires_in": 3600,
            "refresh_token": "R"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (storage, _tmp) = create_temp_storage();
    let storage = Arc::new(storage);
    let client = oauth_client(&server.uri(), storage.clone());
    let mut session = Session::new("42");

    assert!(client.exchange_code(&mut session, "validcode").await.unwrap());
    assert_eq!(storage.get("42").unwrap().unwrap().token, "R");
}

#[test]
#[serial]
fn test_db_path_env_override() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("nested").join("override.db");
    std::env::set_var("ONENOTE_DB_PATH", &db);
    let storage = SqliteStorage::new();
    std::env::remove_var("ONENOTE_DB_PATH");

    let storage = storage.unwrap();
    assert_eq!(storage.db_path(), db.as_path());
    assert!(db.exists());
}
