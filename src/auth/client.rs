//! OAuth 2.0 authorization-code client with refresh-token rotation
//!
//! [`OAuth2Client`] is a single generic implementation configured per
//! provider through [`ProviderConfig`].  It never holds per-user state: the
//! cached access token lives in the caller's [`Session`] and the refresh
//! token in the injected [`TokenStore`].
//!
//! # Token lifecycle
//!
//! 1. The host redirects the user to [`OAuth2Client::login_url`].
//! 2. The provider redirects back with a one-time `code`, which
//!    [`OAuth2Client::is_logged_in`] (or [`OAuth2Client::exchange_code`])
//!    trades for an access token and a refresh token.
//! 3. The access token is cached in the session with its expiry shortened by
//!    [`EXPIRY_SAFETY_MARGIN_SECS`](super::token::EXPIRY_SAFETY_MARGIN_SECS);
//!    the refresh token is persisted for the user.
//! 4. Once the access token expires, [`OAuth2Client::refresh`] mints a new
//!    one from the stored refresh token and persists the rotated refresh
//!    token.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::token::AccessToken;
use crate::auth::token_store::TokenStore;
use crate::error::{OneNoteError, Result};
use crate::session::Session;

/// Microsoft account authorization endpoint.
pub const LIVE_AUTH_URL: &str = "https://login.live.com/oauth20_authorize.srf";

/// Microsoft account token endpoint.
pub const LIVE_TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";

/// Scopes needed to read and create notebooks and to obtain a refresh token.
pub const LIVE_SCOPE: &str = "office.onenote_update wl.skydrive wl.offline_access";

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// HTTP method used for the authorization-code exchange.
///
/// Some providers only accept the exchange as a `GET` with the parameters in
/// the query string; the refresh grant is always a form-encoded `POST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestMethod {
    /// Parameters in the query string.
    Get,
    /// Parameters in a form-encoded body.
    #[default]
    Post,
}

/// Where the bearer token is attached on an authenticated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>` header.
    #[default]
    Header,
    /// `access_token=<token>` query parameter.
    QueryParam,
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Everything that differs between OAuth providers.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use onenote_sync::auth::client::ProviderConfig;
///
/// let provider = ProviderConfig::microsoft_live(
///     "client".to_string(),
///     "secret".to_string(),
///     Url::parse("https://lms.example.com/msaccount/redirect").unwrap(),
/// );
/// assert_eq!(provider.auth_url, "https://login.live.com/oauth20_authorize.srf");
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Short name, also used as the token identity for cache keys.
    pub name: String,

    /// OAuth client id issued by the provider.
    pub client_id: String,

    /// OAuth client secret issued by the provider.
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    pub redirect_uri: Url,

    /// Space-separated scopes requested at authorization time.
    pub scope: String,

    /// Authorization endpoint the user's browser is sent to.
    pub auth_url: String,

    /// Token endpoint for code exchange and refresh.
    pub token_url: String,

    /// HTTP method for the authorization-code exchange.
    pub code_exchange_method: TokenRequestMethod,
}

impl ProviderConfig {
    /// Preset for Microsoft account (login.live.com) with OneNote scopes.
    pub fn microsoft_live(client_id: String, client_secret: String, redirect_uri: Url) -> Self {
        Self {
            name: "msaccount".to_string(),
            client_id,
            client_secret,
            redirect_uri,
            scope: LIVE_SCOPE.to_string(),
            auth_url: LIVE_AUTH_URL.to_string(),
            token_url: LIVE_TOKEN_URL.to_string(),
            code_exchange_method: TokenRequestMethod::Post,
        }
    }
}

// ---------------------------------------------------------------------------
// Token endpoint response
// ---------------------------------------------------------------------------

/// Raw token endpoint body.  Every field is optional so that a body missing
/// `access_token` is a soft failure rather than a parse error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

// ---------------------------------------------------------------------------
// OAuth2Client
// ---------------------------------------------------------------------------

/// Generic OAuth 2.0 authorization-code client.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use url::Url;
/// use onenote_sync::auth::client::{OAuth2Client, ProviderConfig};
/// use onenote_sync::auth::token_store::MemoryTokenStore;
///
/// let provider = ProviderConfig::microsoft_live(
///     "client".to_string(),
///     "secret".to_string(),
///     Url::parse("https://lms.example.com/msaccount/redirect").unwrap(),
/// );
/// let client = OAuth2Client::new(
///     reqwest::Client::new(),
///     provider,
///     Arc::new(MemoryTokenStore::default()),
/// );
/// let url = client.login_url().unwrap();
/// assert!(url.as_str().contains("client_id=client"));
/// ```
pub struct OAuth2Client {
    http: reqwest::Client,
    provider: ProviderConfig,
    token_store: Arc<dyn TokenStore>,
}

impl OAuth2Client {
    /// Creates a client for `provider`, persisting refresh tokens in
    /// `token_store`.
    pub fn new(
        http: reqwest::Client,
        provider: ProviderConfig,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            http,
            provider,
            token_store,
        }
    }

    /// The provider configuration this client was built with.
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Token identity used to scope session caches.
    pub fn token_name(&self) -> &str {
        &self.provider.name
    }

    /// Builds the authorization URL the user's browser must visit.
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::Config`] when `auth_url` is not a valid URL.
    pub fn login_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.provider.auth_url).map_err(|e| {
            OneNoteError::Config(format!("invalid authorization endpoint URL: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.provider.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.provider.redirect_uri.as_str())
            .append_pair("scope", &self.provider.scope);
        Ok(url)
    }

    /// Reports whether the session holds a usable access token, acquiring
    /// one when possible.
    ///
    /// - A cached, unexpired token: `true`.
    /// - A cached, expired token: a refresh is attempted; on failure the
    ///   session is logged out and `false` is returned.
    /// - No cached token: when the host passes the inbound authorization
    ///   `code`, it is exchanged and the outcome returned; otherwise `false`.
    ///
    /// Safe to call once per incoming request.
    ///
    /// # Errors
    ///
    /// Only transport and protocol failures of the token endpoint are
    /// returned as errors.
    pub async fn is_logged_in(&self, session: &mut Session, code: Option<&str>) -> Result<bool> {
        if let Some(token) = session.access_token() {
            if !token.is_expired() {
                return Ok(true);
            }

            tracing::debug!(user = %session.user_id(), "Access token expired, refreshing");
            if self.refresh(session).await? {
                return Ok(true);
            }
            self.log_out(session);
            return Ok(false);
        }

        match code {
            Some(code) if !code.is_empty() => self.exchange_code(session, code).await,
            _ => Ok(false),
        }
    }

    /// Exchanges a one-time authorization code for tokens.
    ///
    /// Returns `Ok(false)` when the provider answered 200 but without an
    /// `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::TokenEndpoint`] on any status other than 200
    /// and a serialization error when the body is not JSON.
    pub async fn exchange_code(&self, session: &mut Session, code: &str) -> Result<bool> {
        let params = [
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
        ];

        let request = match self.provider.code_exchange_method {
            TokenRequestMethod::Get => self.http.get(&self.provider.token_url).query(&params),
            TokenRequestMethod::Post => self.http.post(&self.provider.token_url).form(&params),
        };

        let response = self.send_token_request(request).await?;
        let accepted = self.accept_tokens(session, response)?;
        if accepted {
            tracing::info!(user = %session.user_id(), "Authorization code exchanged");
        } else {
            tracing::warn!(user = %session.user_id(), "Code exchange yielded no access token");
        }
        Ok(accepted)
    }

    /// Mints a new access token from the user's stored refresh token.
    ///
    /// Any previously cached access token is discarded first.  Returns
    /// `Ok(false)` without touching the network when no refresh token is
    /// stored, and `Ok(false)` when the provider answered without an
    /// `access_token`.
    ///
    /// # Errors
    ///
    /// Same as [`exchange_code`](Self::exchange_code), plus token store
    /// failures.
    pub async fn refresh(&self, session: &mut Session) -> Result<bool> {
        self.log_out(session);

        let stored = match self.token_store.get(session.user_id())? {
            Some(stored) if !stored.token.is_empty() => stored,
            _ => {
                tracing::debug!(user = %session.user_id(), "No refresh token stored");
                return Ok(false);
            }
        };

        let params = [
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", stored.token.as_str()),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
        ];

        // `form` sets `Content-Type: application/x-www-form-urlencoded`.
        let request = self.http.post(&self.provider.token_url).form(&params);

        let response = self.send_token_request(request).await?;
        let accepted = self.accept_tokens(session, response)?;
        if accepted {
            tracing::info!(user = %session.user_id(), "Access token refreshed");
        } else {
            tracing::warn!(user = %session.user_id(), "Refresh yielded no access token");
        }
        Ok(accepted)
    }

    /// Forgets the session's access token.  The stored refresh token is kept.
    pub fn log_out(&self, session: &mut Session) {
        if session.clear_access_token() {
            tracing::debug!(user = %session.user_id(), "Cleared access token");
        }
    }

    /// Starts an authenticated request with the bearer token attached as
    /// `placement` dictates.
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::Authentication`] when the session holds no
    /// access token.
    pub fn request(
        &self,
        session: &Session,
        method: Method,
        url: &str,
        placement: TokenPlacement,
    ) -> Result<RequestBuilder> {
        let token = session.access_token().ok_or_else(|| {
            OneNoteError::Authentication("no access token in session".to_string())
        })?;

        let builder = self.http.request(method, url);
        Ok(match placement {
            TokenPlacement::Header => builder.bearer_auth(&token.token),
            TokenPlacement::QueryParam => builder.query(&[("access_token", token.token.as_str())]),
        })
    }

    /// Sends a token endpoint request and parses its body.
    async fn send_token_request(&self, request: RequestBuilder) -> Result<TokenResponse> {
        let resp = request.send().await.map_err(OneNoteError::Http)?;

        let status = resp.status();
        let body = resp.text().await.map_err(OneNoteError::Http)?;
        if status != StatusCode::OK {
            return Err(OneNoteError::TokenEndpoint {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// Caches the access token and persists the refresh token.
    fn accept_tokens(&self, session: &mut Session, response: TokenResponse) -> Result<bool> {
        let Some(access_token) = response.access_token else {
            return Ok(false);
        };

        // A missing `expires_in` leaves the token already expired, so the
        // next check refreshes it.
        let expires_in = response.expires_in.unwrap_or(0);
        session.store_access_token(AccessToken::from_expires_in(access_token, expires_in));

        match response.refresh_token {
            Some(refresh_token) => self.token_store.upsert(session.user_id(), &refresh_token)?,
            None => tracing::debug!("Token response carried no refresh_token; keeping stored one"),
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_store::MemoryTokenStore;

    fn make_client() -> OAuth2Client {
        let provider = ProviderConfig::microsoft_live(
            "client-id".to_string(),
            "client-secret".to_string(),
            Url::parse("https://lms.example.com/redirect?sesskey=abc").unwrap(),
        );
        OAuth2Client::new(
            reqwest::Client::new(),
            provider,
            Arc::new(MemoryTokenStore::default()),
        )
    }

    #[test]
    fn test_login_url_contains_required_params() {
        let client = make_client();
        let url = client.login_url().unwrap();

        assert!(url.as_str().starts_with(LIVE_AUTH_URL));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(pairs.get("scope").map(String::as_str), Some(LIVE_SCOPE));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("https://lms.example.com/redirect?sesskey=abc")
        );
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
    }

    #[test]
    fn test_request_without_token_is_authentication_error() {
        let client = make_client();
        let session = Session::new("u1");
        let err = client
            .request(&session, Method::GET, "https://api.example.com/x", TokenPlacement::Header)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OneNoteError>(),
            Some(OneNoteError::Authentication(_))
        ));
    }

    #[test]
    fn test_request_token_placement() {
        let client = make_client();
        let mut session = Session::new("u1");
        session.store_access_token(AccessToken::from_expires_in("TOK".to_string(), 3600));

        let header = client
            .request(&session, Method::GET, "https://api.example.com/x", TokenPlacement::Header)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            header.headers().get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer TOK")
        );
        assert!(header.url().query().is_none());

        let param = client
            .request(
                &session,
                Method::GET,
                "https://api.example.com/x",
                TokenPlacement::QueryParam,
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(param.url().query(), Some("access_token=TOK"));
        assert!(param.headers().get("authorization").is_none());
    }

    #[test]
    fn test_log_out_keeps_refresh_token() {
        let store = Arc::new(MemoryTokenStore::default());
        store.upsert("u1", "R").unwrap();
        let client = OAuth2Client::new(
            reqwest::Client::new(),
            make_client().provider().clone(),
            store.clone(),
        );
        let mut session = Session::new("u1");
        session.store_access_token(AccessToken::from_expires_in("T".to_string(), 3600));

        client.log_out(&mut session);
        assert!(session.access_token().is_none());
        assert_eq!(store.get("u1").unwrap().unwrap().token, "R");
    }

    #[test]
    fn test_token_request_method_deserializes_lowercase() {
        let m: TokenRequestMethod = serde_yaml::from_str("get").unwrap();
        assert_eq!(m, TokenRequestMethod::Get);
        assert_eq!(TokenRequestMethod::default(), TokenRequestMethod::Post);
    }
}
