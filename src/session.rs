//! Per-user session context
//!
//! A [`Session`] is constructed by the host application once per user
//! session (or per request, when the host keeps the cached token itself) and
//! passed by `&mut` to every operation.  It holds the identity of the
//! current user, the in-session [`AccessToken`] and the item-name cache.
//! Nothing in this crate reads the user identity from ambient state.

use std::collections::HashMap;

use crate::auth::token::AccessToken;

/// State scoped to one signed-in user of the host application.
///
/// # Examples
///
/// ```
/// use onenote_sync::session::Session;
///
/// let session = Session::new("42");
/// assert_eq!(session.user_id(), "42");
/// assert!(session.access_token().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    user_id: String,
    access_token: Option<AccessToken>,
    item_names: HashMap<String, String>,
}

impl Session {
    /// Creates an empty session for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
            item_names: HashMap::new(),
        }
    }

    /// Identity of the host-application user this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The cached access token, expired or not.
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Replaces the cached access token.
    pub fn store_access_token(&mut self, token: AccessToken) {
        self.access_token = Some(token);
    }

    /// Drops the cached access token.  Returns whether one was present.
    pub fn clear_access_token(&mut self) -> bool {
        self.access_token.take().is_some()
    }

    /// Looks up a cached display name.
    pub fn cached_name(&self, key: &str) -> Option<&str> {
        self.item_names.get(key).map(String::as_str)
    }

    /// Caches a display name.  Entries live as long as the session; renames
    /// upstream are not observed until the session ends.
    pub fn cache_name(&mut self, key: String, name: String) {
        self.item_names.insert(key, name);
    }
}
