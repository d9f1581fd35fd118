//! OneNote REST client
//!
//! [`ResourceClient`] lists the notebook → section → page hierarchy, resolves
//! item names, creates notebooks and sections, and downloads page content.
//! Every call goes through the wrapped [`OAuth2Client`] with the bearer
//! token in the `Authorization` header.
//!
//! # Failure handling
//!
//! Transport failures, unexpected HTTP statuses without an error payload and
//! unparsable JSON are returned as errors.  A JSON body carrying an `error`
//! member, an empty body, or a session without an access token is a soft
//! failure: user-facing operations log the session out and return an empty
//! or `None` result so that the host asks the user to sign in again.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::archive::{AssetFetcher, PageArchiver};
use crate::auth::client::{OAuth2Client, TokenPlacement};
use crate::error::{OneNoteError, Result};
use crate::onenote::sync::HierarchySync;
use crate::onenote::types::{DownloadedPage, ListTarget, RemoteItem, WireItem, WireList};
use crate::session::Session;

/// Base URL of the OneNote REST API.
pub const ONENOTE_API_BASE: &str = "https://www.onenote.com/api/beta";

// ---------------------------------------------------------------------------
// Soft failures
// ---------------------------------------------------------------------------

/// A resource call that did not succeed but is not a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SoftFailure {
    /// The session holds no access token; nothing was sent.
    NotSignedIn,
    /// The provider answered with an `error` member.
    Provider(String),
    /// The provider answered with an empty body.
    EmptyBody,
}

impl std::fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftFailure::NotSignedIn => write!(f, "not signed in"),
            SoftFailure::Provider(message) => write!(f, "provider error: {message}"),
            SoftFailure::EmptyBody => write!(f, "empty response"),
        }
    }
}

pub(crate) type Outcome<T> = std::result::Result<T, SoftFailure>;

// ---------------------------------------------------------------------------
// ResourceClient
// ---------------------------------------------------------------------------

/// Authenticated access to the OneNote notebook hierarchy.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use url::Url;
/// use onenote_sync::auth::client::{OAuth2Client, ProviderConfig};
/// use onenote_sync::auth::token_store::MemoryTokenStore;
/// use onenote_sync::onenote::client::{ResourceClient, ONENOTE_API_BASE};
/// use onenote_sync::session::Session;
///
/// # async fn example() -> onenote_sync::error::Result<()> {
/// let provider = ProviderConfig::microsoft_live(
///     "client".to_string(),
///     "secret".to_string(),
///     Url::parse("https://lms.example.com/msaccount/redirect")?,
/// );
/// let oauth = OAuth2Client::new(
///     reqwest::Client::new(),
///     provider,
///     Arc::new(MemoryTokenStore::default()),
/// );
/// let client = ResourceClient::new(oauth, ONENOTE_API_BASE);
///
/// let mut session = Session::new("42");
/// if client.oauth().refresh(&mut session).await? {
///     for notebook in client.list_items(&mut session, "").await? {
///         println!("{} ({})", notebook.name, notebook.path);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ResourceClient {
    oauth: OAuth2Client,
    api_base: String,
    sync: Option<HierarchySync>,
    archiver: PageArchiver,
}

impl ResourceClient {
    /// Creates a client for the API rooted at `api_base`.
    pub fn new(oauth: OAuth2Client, api_base: &str) -> Self {
        Self {
            oauth,
            api_base: api_base.trim_end_matches('/').to_string(),
            sync: None,
            archiver: PageArchiver::default(),
        }
    }

    /// Runs `sync` after every successful top-level listing.
    pub fn with_sync(mut self, sync: HierarchySync) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Uses `archiver` for page downloads instead of the default one.
    pub fn with_archiver(mut self, archiver: PageArchiver) -> Self {
        self.archiver = archiver;
        self
    }

    /// The wrapped OAuth client.
    pub fn oauth(&self) -> &OAuth2Client {
        &self.oauth
    }

    /// Lists the items under `path`; see
    /// [`ListTarget`](crate::onenote::types::ListTarget) for the path
    /// grammar.
    ///
    /// Soft failures log the session out and yield an empty list.  A
    /// successful top-level listing also runs the configured
    /// [`HierarchySync`]; its failures are logged and never affect the
    /// returned items.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or protocol failure, or when `path`
    /// contains a malformed segment.
    pub async fn list_items(&self, session: &mut Session, path: &str) -> Result<Vec<RemoteItem>> {
        let target = ListTarget::from_path(path)?;
        tracing::debug!(?target, "Listing items");

        let items = match self.fetch_items(session, &target, path).await? {
            Ok(items) => items,
            Err(failure) => {
                tracing::warn!(%failure, path, "Listing failed, signing out");
                self.oauth.log_out(session);
                return Ok(Vec::new());
            }
        };

        if target == ListTarget::Notebooks {
            if let Some(sync) = &self.sync {
                match sync.reconcile(self, session, &items).await {
                    Ok(report) => tracing::info!(?report, "Hierarchy sync finished"),
                    Err(e) => tracing::warn!("Hierarchy sync failed: {e:#}"),
                }
            }
        }

        Ok(items)
    }

    /// Resolves the display name of a notebook or section id.
    ///
    /// The session-scoped cache is consulted first.  On a miss the id is
    /// looked up as a notebook and then, if that fails, as a section.  A
    /// lookup fails on a soft failure, a failure status or an undecodable
    /// body.  When both lookups fail the session is logged out and `None`
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::InvalidArgument`] when `item_id` is empty, and
    /// transport failures.
    pub async fn get_item_name(&self, session: &mut Session, item_id: &str) -> Result<Option<String>> {
        if item_id.is_empty() {
            return Err(
                OneNoteError::InvalidArgument("empty item id passed to get_item_name".into())
                    .into(),
            );
        }

        let cache_key = self.item_cache_key(item_id);
        if let Some(name) = session.cached_name(&cache_key) {
            tracing::debug!(item_id, "Item name cache hit");
            return Ok(Some(name.to_string()));
        }

        let mut resolved = None;
        for collection in ["notebooks", "sections"] {
            let url = self.url(&[collection, item_id]);
            let outcome = match self.send_json(session, Method::GET, &url, None).await {
                Ok(outcome) => outcome,
                Err(e) if is_lookup_miss(&e) => {
                    tracing::debug!(item_id, collection, "Lookup rejected: {e:#}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match outcome {
                Ok(body) => match name_from_lookup(&body) {
                    Some(name) => {
                        resolved = Some(name);
                        break;
                    }
                    None => tracing::debug!(item_id, collection, "Lookup returned no name"),
                },
                Err(failure) => tracing::debug!(item_id, collection, %failure, "Lookup failed"),
            }
        }

        match resolved {
            Some(name) => {
                session.cache_name(cache_key, name.clone());
                Ok(Some(name))
            }
            None => {
                tracing::warn!(item_id, "Could not resolve item name, signing out");
                self.oauth.log_out(session);
                Ok(None)
            }
        }
    }

    /// Downloads a page to `destination`.
    ///
    /// Pages without images are written as plain HTML; pages with images are
    /// bundled with their images into a zip archive by the
    /// [`PageArchiver`].  A soft failure logs the session out and returns
    /// `None` without creating any file.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and filesystem failures.
    pub async fn download_page(
        &self,
        session: &mut Session,
        page_id: &str,
        destination: &Path,
    ) -> Result<Option<DownloadedPage>> {
        if page_id.is_empty() {
            return Err(OneNoteError::InvalidArgument("empty page id".into()).into());
        }

        let source_url = self.url(&["pages", page_id, "content"]);
        tracing::debug!(page_id, "Downloading page");

        let html = match self.fetch_content(session, &source_url).await? {
            Ok(html) => html,
            Err(failure) => {
                tracing::warn!(page_id, %failure, "Page download failed, signing out");
                self.oauth.log_out(session);
                return Ok(None);
            }
        };

        let fetcher = SessionAssetFetcher {
            client: self,
            session: &*session,
        };
        self.archiver.archive(&html, &fetcher, destination).await?;

        Ok(Some(DownloadedPage {
            path: destination.to_path_buf(),
            source_url,
        }))
    }

    /// Creates a notebook and returns its id.
    pub(crate) async fn create_notebook(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Outcome<String>> {
        let url = self.url(&["notebooks"]);
        self.create(session, &url, name).await
    }

    /// Creates a section inside `notebook_id` and returns its id.
    pub(crate) async fn create_section(
        &self,
        session: &Session,
        notebook_id: &str,
        name: &str,
    ) -> Result<Outcome<String>> {
        let url = self.url(&["notebooks", notebook_id, "sections"]);
        self.create(session, &url, name).await
    }

    /// Lists a collection without touching the session on failure.
    pub(crate) async fn fetch_items(
        &self,
        session: &Session,
        target: &ListTarget,
        parent_path: &str,
    ) -> Result<Outcome<Vec<RemoteItem>>> {
        let url = match target {
            ListTarget::Notebooks => self.url(&["notebooks"]),
            ListTarget::Sections { notebook_id } => {
                self.url(&["notebooks", notebook_id, "sections"])
            }
            ListTarget::Pages { section_id } => self.url(&["sections", section_id, "pages"]),
        };

        let body = match self.send_json(session, Method::GET, &url, None).await? {
            Ok(body) => body,
            Err(failure) => return Ok(Err(failure)),
        };

        let list: WireList = serde_json::from_value(body)?;
        let kind = target.item_kind();
        Ok(Ok(list
            .value
            .into_iter()
            .map(|item| RemoteItem::from_wire(item, kind, parent_path))
            .collect()))
    }

    async fn create(&self, session: &Session, url: &str, name: &str) -> Result<Outcome<String>> {
        let body = serde_json::json!({ "name": name });
        let reply = match self.send_json(session, Method::POST, url, Some(&body)).await? {
            Ok(reply) => reply,
            Err(failure) => return Ok(Err(failure)),
        };

        match reply.get("id").and_then(Value::as_str) {
            Some(id) => Ok(Ok(id.to_string())),
            None => Ok(Err(SoftFailure::Provider("creation response has no id".into()))),
        }
    }

    /// Sends an authenticated request and classifies its JSON reply.
    async fn send_json(
        &self,
        session: &Session,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Outcome<Value>> {
        if session.access_token().is_none() {
            return Ok(Err(SoftFailure::NotSignedIn));
        }

        let mut request = self
            .oauth
            .request(session, method, url, TokenPlacement::Header)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(OneNoteError::Http)?;
        let status = resp.status();
        let text = resp.text().await.map_err(OneNoteError::Http)?;

        classify_json(status, text)
    }

    /// Fetches raw page HTML.
    async fn fetch_content(&self, session: &Session, url: &str) -> Result<Outcome<String>> {
        if session.access_token().is_none() {
            return Ok(Err(SoftFailure::NotSignedIn));
        }

        let resp = self
            .oauth
            .request(session, Method::GET, url, TokenPlacement::Header)?
            .send()
            .await
            .map_err(OneNoteError::Http)?;
        let status = resp.status();
        let text = resp.text().await.map_err(OneNoteError::Http)?;

        if let Some(message) = provider_error(&text) {
            return Ok(Err(SoftFailure::Provider(message)));
        }
        if !status.is_success() {
            return Err(OneNoteError::Api {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        if text.trim().is_empty() {
            return Ok(Err(SoftFailure::EmptyBody));
        }
        Ok(Ok(text))
    }

    /// Fetches an embedded asset referenced by a page.
    async fn fetch_asset(&self, session: &Session, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .oauth
            .request(session, Method::GET, url, TokenPlacement::Header)?
            .send()
            .await
            .map_err(OneNoteError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OneNoteError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = resp.bytes().await.map_err(OneNoteError::Http)?;
        Ok(bytes.to_vec())
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.api_base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn item_cache_key(&self, item_id: &str) -> String {
        format!("{}_{}", self.oauth.token_name(), item_id)
    }
}

// ---------------------------------------------------------------------------
// Asset fetching bound to a session
// ---------------------------------------------------------------------------

struct SessionAssetFetcher<'a> {
    client: &'a ResourceClient,
    session: &'a Session,
}

#[async_trait]
impl<'a> AssetFetcher for SessionAssetFetcher<'a> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.client.fetch_asset(self.session, url).await
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Splits a JSON reply into success, soft failure or hard error.
fn classify_json(status: StatusCode, text: String) -> Result<Outcome<Value>> {
    if text.trim().is_empty() {
        if status.is_success() {
            return Ok(Err(SoftFailure::EmptyBody));
        }
        return Err(OneNoteError::Api {
            status: status.as_u16(),
            body: text,
        }
        .into());
    }

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(OneNoteError::Api {
                status: status.as_u16(),
                body: text,
            }
            .into())
        }
        Err(e) => return Err(OneNoteError::Serialization(e).into()),
    };

    if let Some(error) = value.get("error") {
        return Ok(Err(SoftFailure::Provider(error_message(error))));
    }

    if !status.is_success() {
        return Err(OneNoteError::Api {
            status: status.as_u16(),
            body: text,
        }
        .into());
    }

    Ok(Ok(value))
}

/// Returns the error message when `text` is a JSON object with an `error`
/// member.
fn provider_error(text: &str) -> Option<String> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("error").map(error_message)
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// A rejected name lookup: the server answered, but not with a usable body.
fn is_lookup_miss(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<OneNoteError>(),
        Some(OneNoteError::Api { .. }) | Some(OneNoteError::Serialization(_))
    )
}

/// Extracts the item name from a notebook/section lookup body:
/// `{"value": [{"name": ..}]}` or a bare `{"name": ..}`.
fn name_from_lookup(body: &Value) -> Option<String> {
    if let Ok(list) = serde_json::from_value::<WireList>(body.clone()) {
        if let Some(WireItem { name: Some(name), .. }) = list.value.into_iter().next() {
            return Some(name);
        }
    }
    body.get("name").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_json_success() {
        let outcome = classify_json(StatusCode::OK, r#"{"value": []}"#.to_string()).unwrap();
        assert_eq!(outcome, Ok(json!({"value": []})));
    }

    #[test]
    fn test_classify_json_error_member_is_soft_even_on_404() {
        let outcome = classify_json(
            StatusCode::NOT_FOUND,
            r#"{"error": {"code": "20102", "message": "not found"}}"#.to_string(),
        )
        .unwrap();
        assert_eq!(outcome, Err(SoftFailure::Provider("not found".to_string())));
    }

    #[test]
    fn test_classify_json_non_json_failure_status_is_hard() {
        let err = classify_json(StatusCode::BAD_GATEWAY, "<html>oops</html>".to_string())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OneNoteError>(),
            Some(OneNoteError::Api { status: 502, .. })
        ));
    }

    #[test]
    fn test_classify_json_malformed_success_body_is_hard() {
        let err = classify_json(StatusCode::OK, "{not json".to_string()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OneNoteError>(),
            Some(OneNoteError::Serialization(_))
        ));
    }

    #[test]
    fn test_classify_json_empty_success_body_is_soft() {
        let outcome = classify_json(StatusCode::OK, "  ".to_string()).unwrap();
        assert_eq!(outcome, Err(SoftFailure::EmptyBody));
    }

    #[test]
    fn test_provider_error_ignores_html() {
        assert_eq!(provider_error("<html><body>page</body></html>"), None);
        assert_eq!(
            provider_error(r#"{"error": "gone"}"#),
            Some("gone".to_string())
        );
    }

    #[test]
    fn test_name_from_lookup_shapes() {
        assert_eq!(
            name_from_lookup(&json!({"value": [{"id": "n1", "name": "Biology"}]})),
            Some("Biology".to_string())
        );
        assert_eq!(
            name_from_lookup(&json!({"id": "n1", "name": "Chemistry"})),
            Some("Chemistry".to_string())
        );
        assert_eq!(name_from_lookup(&json!({"value": []})), None);
    }
}
