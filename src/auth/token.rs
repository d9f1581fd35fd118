//! Access and refresh token value types
//!
//! An [`AccessToken`] lives only inside a [`Session`](crate::session::Session)
//! and is never written to durable storage.  A [`RefreshToken`] is the one
//! durable credential, stored per user identity by a
//! [`TokenStore`](super::token_store::TokenStore).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds subtracted from the provider-declared `expires_in` so that a token
/// is refreshed slightly before the provider would reject it.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 10;

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// A short-lived bearer credential cached for the active session.
///
/// # Examples
///
/// ```
/// use onenote_sync::auth::token::AccessToken;
///
/// let token = AccessToken::from_expires_in("T".to_string(), 3600);
/// assert!(!token.is_expired());
///
/// let stale = AccessToken::from_expires_in("T".to_string(), 0);
/// assert!(stale.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The bearer token string.
    pub token: String,

    /// Instant after which the token must not be used any more.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Builds a token from the provider's `expires_in` seconds, applying the
    /// [`EXPIRY_SAFETY_MARGIN_SECS`] margin.
    pub fn from_expires_in(token: String, expires_in: i64) -> Self {
        let lifetime = expires_in.saturating_sub(EXPIRY_SAFETY_MARGIN_SECS);
        Self {
            token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        }
    }

    /// Returns `true` once `now >= expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// RefreshToken
// ---------------------------------------------------------------------------

/// The durable credential used to mint new access tokens.
///
/// Exactly one row exists per user identity; every successful exchange or
/// refresh overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Host-application identity of the user owning the token.
    pub user_id: String,

    /// Opaque refresh token issued by the provider.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_expires_in_applies_safety_margin() {
        let before = Utc::now();
        let token = AccessToken::from_expires_in("T".to_string(), 3600);
        let after = Utc::now();

        assert!(token.expires_at >= before + Duration::seconds(3590));
        assert!(token.expires_at <= after + Duration::seconds(3590));
    }

    #[test]
    fn test_is_expired_at_boundary() {
        let now = Utc::now();
        let token = AccessToken {
            token: "T".to_string(),
            expires_at: now,
        };
        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_short_lifetime_is_already_expired() {
        // expires_in below the margin yields an expiry in the past.
        let token = AccessToken::from_expires_in("T".to_string(), 5);
        assert!(token.is_expired());
    }

    #[test]
    fn test_future_token_not_expired() {
        let token = AccessToken {
            token: "T".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(!token.is_expired());
    }
}
