//! onenote-sync - OneNote access for course-management hosts
//!
//! This library signs users in with a Microsoft account, keeps their OAuth
//! tokens fresh, browses the OneNote notebook → section → page hierarchy,
//! mirrors the user's courses as sections of a designated notebook, and
//! downloads pages together with their images.
//!
//! # Architecture
//!
//! - `auth`: generic OAuth 2.0 client, token types and refresh-token stores
//! - `session`: per-user context passed explicitly to every operation
//! - `onenote`: resource client, hierarchy sync and item types
//! - `archive`: page HTML + image bundling
//! - `storage`: SQLite persistence for refresh tokens and course mappings
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`, `commands`: the reference command-line host
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use onenote_sync::{Config, OAuth2Client, ResourceClient, Session};
//! use onenote_sync::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config/config.yaml")?;
//!     config.validate()?;
//!
//!     let storage = Arc::new(SqliteStorage::new()?);
//!     let oauth = OAuth2Client::new(reqwest::Client::new(), config.provider()?, storage);
//!     let client = ResourceClient::new(oauth, &config.api.base_url);
//!
//!     let mut session = Session::new("42");
//!     if client.oauth().refresh(&mut session).await? {
//!         let notebooks = client.list_items(&mut session, "").await?;
//!         println!("{} notebooks", notebooks.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod onenote;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use auth::{OAuth2Client, ProviderConfig, TokenPlacement, TokenStore};
pub use config::Config;
pub use error::{OneNoteError, Result};
pub use onenote::{HierarchySync, RemoteItem, ResourceClient};
pub use session::Session;
