/*!
Command handlers for the CLI

Each handler builds the clients from [`Config`], creates a fresh
[`Session`] for the requested user, and runs one operation.  A session
starts without an access token; handlers that call the API first restore
one from the stored refresh token.
*/

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use prettytable::{cell, row, Table};

use crate::auth::client::OAuth2Client;
use crate::auth::token_store::{KeyringTokenStore, TokenStore};
use crate::config::{Config, TokenBackend};
use crate::error::{OneNoteError, Result};
use crate::onenote::client::ResourceClient;
use crate::onenote::sync::{Course, HierarchySync, StaticCourseDirectory};
use crate::onenote::types::RemoteItem;
use crate::session::Session;
use crate::storage::{MappingStore, SqliteStorage};

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Opens the SQLite database named by the configuration.
fn open_storage(config: &Config) -> Result<Arc<SqliteStorage>> {
    let storage = match &config.storage.db_path {
        Some(path) => SqliteStorage::new_with_path(path.clone())?,
        None => SqliteStorage::new()?,
    };
    tracing::debug!(db = %storage.db_path().display(), "Opened storage");
    Ok(Arc::new(storage))
}

fn token_store(config: &Config, storage: &Arc<SqliteStorage>) -> Arc<dyn TokenStore> {
    match config.storage.token_backend {
        TokenBackend::Sqlite => storage.clone() as Arc<dyn TokenStore>,
        TokenBackend::Keyring => Arc::new(KeyringTokenStore::default()),
    }
}

fn build_oauth(config: &Config, storage: &Arc<SqliteStorage>) -> Result<OAuth2Client> {
    Ok(OAuth2Client::new(
        reqwest::Client::new(),
        config.provider()?,
        token_store(config, storage),
    ))
}

fn build_resource_client(
    config: &Config,
    storage: &Arc<SqliteStorage>,
    courses: Vec<Course>,
) -> Result<ResourceClient> {
    let client = ResourceClient::new(build_oauth(config, storage)?, &config.api.base_url);
    if !config.sync.enabled {
        return Ok(client);
    }

    let sync = HierarchySync::new(
        config.sync.notebook_name.clone(),
        Arc::new(StaticCourseDirectory::new(courses)),
        storage.clone(),
    );
    Ok(client.with_sync(sync))
}

/// Restores an access token from the stored refresh token.
async fn sign_in(oauth: &OAuth2Client, session: &mut Session) -> Result<()> {
    if oauth.is_logged_in(session, None).await? || oauth.refresh(session).await? {
        return Ok(());
    }
    Err(OneNoteError::Authentication(
        "not signed in; run `onenote-sync login-url` and then `login --code`".to_string(),
    )
    .into())
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Print the authorization URL
pub fn login_url(config: &Config) -> Result<()> {
    let storage = open_storage(config)?;
    let oauth = build_oauth(config, &storage)?;
    println!("{}", oauth.login_url()?);
    Ok(())
}

/// Exchange an authorization code and persist the refresh token
pub async fn login(config: &Config, user: &str, code: &str) -> Result<()> {
    let storage = open_storage(config)?;
    let oauth = build_oauth(config, &storage)?;
    let mut session = Session::new(user);

    if oauth.is_logged_in(&mut session, Some(code)).await? {
        println!("{}", format!("Signed in as {}", user).green());
        Ok(())
    } else {
        Err(OneNoteError::Authentication("the provider returned no access token".into()).into())
    }
}

/// Report whether a refresh token is stored and still accepted
pub async fn status(config: &Config, user: &str) -> Result<()> {
    let storage = open_storage(config)?;
    let oauth = build_oauth(config, &storage)?;
    let mut session = Session::new(user);

    let signed_in = match oauth.refresh(&mut session).await {
        Ok(signed_in) => signed_in,
        Err(e) => match e.downcast_ref::<OneNoteError>() {
            Some(OneNoteError::TokenEndpoint { status, .. }) => {
                tracing::warn!(status, "Stored refresh token was rejected");
                false
            }
            _ => return Err(e),
        },
    };

    if signed_in {
        println!("{}", format!("{}: signed in", user).green());
    } else {
        println!("{}", format!("{}: not signed in", user).yellow());
    }
    Ok(())
}

/// Delete the stored refresh token
pub fn forget(config: &Config, user: &str) -> Result<()> {
    let storage = open_storage(config)?;
    token_store(config, &storage).delete(user)?;
    println!("Removed stored credentials for {}", user);
    Ok(())
}

// ---------------------------------------------------------------------------
// Browsing
// ---------------------------------------------------------------------------

/// List notebooks, sections or pages
pub async fn list(
    config: &Config,
    user: &str,
    path: &str,
    courses: Vec<Course>,
    json: bool,
) -> Result<()> {
    let storage = open_storage(config)?;
    let client = build_resource_client(config, &storage, courses)?;
    let mut session = Session::new(user);
    sign_in(client.oauth(), &mut session).await?;

    let items = client.list_items(&mut session, path).await?;
    if session.access_token().is_none() {
        println!("{}", "The provider rejected the request; sign in again.".yellow());
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_items(&items);
    }
    Ok(())
}

fn print_items(items: &[RemoteItem]) {
    if items.is_empty() {
        println!("{}", "No items.".yellow());
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["Name", "Kind", "Modified", "Path"]);
    for item in items {
        let modified = item
            .last_modified
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        table.add_row(row![
            item.name,
            format!("{:?}", item.kind).to_lowercase(),
            modified,
            item.path
        ]);
    }
    table.printstd();
}

/// Resolve the name of a notebook or section
pub async fn name(config: &Config, user: &str, id: &str) -> Result<()> {
    let storage = open_storage(config)?;
    let client = ResourceClient::new(build_oauth(config, &storage)?, &config.api.base_url);
    let mut session = Session::new(user);
    sign_in(client.oauth(), &mut session).await?;

    match client.get_item_name(&mut session, id).await? {
        Some(name) => println!("{}", name),
        None => println!("{}", format!("No notebook or section with id {}", id).yellow()),
    }
    Ok(())
}

/// Download a page
pub async fn download(config: &Config, user: &str, page_id: &str, output: &Path) -> Result<()> {
    let storage = open_storage(config)?;
    let client = ResourceClient::new(build_oauth(config, &storage)?, &config.api.base_url);
    let mut session = Session::new(user);
    sign_in(client.oauth(), &mut session).await?;

    match client.download_page(&mut session, page_id, output).await? {
        Some(page) => println!(
            "{}",
            format!("Saved {} to {}", page.source_url, page.path.display()).green()
        ),
        None => println!("{}", format!("Page {} could not be downloaded", page_id).yellow()),
    }
    Ok(())
}

/// Print recorded course → section mappings
pub fn mappings(config: &Config, user: &str) -> Result<()> {
    let storage = open_storage(config)?;
    let mappings = storage.list_mappings(user)?;
    if mappings.is_empty() {
        println!("{}", "No mappings recorded.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Course", "Section"]);
    for mapping in &mappings {
        table.add_row(row![mapping.course_id, mapping.section_id]);
    }
    table.printstd();
    Ok(())
}
