//! Durable refresh-token persistence
//!
//! The [`TokenStore`] trait maps a user identity to that user's refresh
//! token.  Three backends are provided:
//!
//! - [`SqliteStorage`](crate::storage::SqliteStorage) -- the host database
//!   table `refresh_tokens`, shared with the course/section mappings.
//! - [`KeyringTokenStore`] -- the OS native credential store, suitable for a
//!   single desktop user.
//! - [`MemoryTokenStore`] -- process-local map, used by tests and embedders
//!   that bring their own persistence.
//!
//! None of the backends take locks across calls.  Two concurrent refreshes
//! for the same user race and the later `upsert` wins.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::auth::token::RefreshToken;
use crate::error::{OneNoteError, Result};

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Durable mapping from user identity to refresh token.
pub trait TokenStore: Send + Sync {
    /// Returns the stored refresh token for `user_id`, or `None` when the
    /// user never signed in.
    fn get(&self, user_id: &str) -> Result<Option<RefreshToken>>;

    /// Inserts or overwrites the refresh token for `user_id`.
    fn upsert(&self, user_id: &str, token: &str) -> Result<()>;

    /// Removes the refresh token for `user_id`.  A no-op when absent.
    fn delete(&self, user_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-memory [`TokenStore`].
///
/// # Examples
///
/// ```
/// use onenote_sync::auth::token_store::{MemoryTokenStore, TokenStore};
///
/// let store = MemoryTokenStore::default();
/// store.upsert("42", "R1").unwrap();
/// store.upsert("42", "R2").unwrap();
/// assert_eq!(store.get("42").unwrap().unwrap().token, "R2");
/// ```
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.tokens
            .lock()
            .map_err(|_| OneNoteError::Storage("token map lock poisoned".to_string()).into())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, user_id: &str) -> Result<Option<RefreshToken>> {
        Ok(self.lock()?.get(user_id).map(|token| RefreshToken {
            user_id: user_id.to_string(),
            token: token.clone(),
        }))
    }

    fn upsert(&self, user_id: &str, token: &str) -> Result<()> {
        self.lock()?.insert(user_id.to_string(), token.to_string());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        self.lock()?.remove(user_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeyringTokenStore
// ---------------------------------------------------------------------------

/// [`TokenStore`] backed by the OS keyring (Keychain on macOS, Secret
/// Service on Linux, Credential Manager on Windows).
///
/// Each user's token is stored under the service name given at construction
/// with the user identity as the account name.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    /// Creates a store using `service` as the keyring service name.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, user_id: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, user_id).map_err(|e| OneNoteError::Keyring(e).into())
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new("onenote-sync")
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, user_id: &str) -> Result<Option<RefreshToken>> {
        match self.entry(user_id)?.get_password() {
            Ok(token) if !token.is_empty() => Ok(Some(RefreshToken {
                user_id: user_id.to_string(),
                token,
            })),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(OneNoteError::Keyring(e).into()),
        }
    }

    fn upsert(&self, user_id: &str, token: &str) -> Result<()> {
        self.entry(user_id)?
            .set_password(token)
            .map_err(OneNoteError::Keyring)?;
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        match self.entry(user_id)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(OneNoteError::Keyring(e).into()),
        }
    }
}
