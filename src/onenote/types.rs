//! OneNote hierarchy types
//!
//! [`RemoteItem`] is the transient, normalized view of a notebook, section
//! or page returned by a listing call.  The `Wire*` structs mirror the raw
//! JSON of the OneNote REST API and never leave this crate.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OneNoteError, Result};

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Level of an item in the notebook → section → page hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Top level container.
    Notebook,
    /// Child of a notebook.
    Section,
    /// Leaf, child of a section.
    Page,
}

// ---------------------------------------------------------------------------
// ListTarget
// ---------------------------------------------------------------------------

/// The collection a listing path refers to.
///
/// The kind is decided purely from the number of path segments:
///
/// | path                    | target                      |
/// |-------------------------|-----------------------------|
/// | `""` or `"/"`           | all notebooks               |
/// | `"/<nb>"`               | sections of notebook `nb`   |
/// | `"/<nb>/<sec>"` (or more) | pages of section `sec`    |
///
/// Segments are percent-decoded.
///
/// # Examples
///
/// ```
/// use onenote_sync::onenote::types::ListTarget;
///
/// assert_eq!(ListTarget::from_path("").unwrap(), ListTarget::Notebooks);
/// assert_eq!(
///     ListTarget::from_path("/nb%211").unwrap(),
///     ListTarget::Sections { notebook_id: "nb!1".to_string() },
/// );
/// assert_eq!(
///     ListTarget::from_path("/nb1/sec1").unwrap(),
///     ListTarget::Pages { section_id: "sec1".to_string() },
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTarget {
    /// `GET /notebooks`
    Notebooks,
    /// `GET /notebooks/{id}/sections`
    Sections {
        /// Parent notebook id.
        notebook_id: String,
    },
    /// `GET /sections/{id}/pages`
    Pages {
        /// Parent section id.
        section_id: String,
    },
}

impl ListTarget {
    /// Parses a listing path.
    ///
    /// # Errors
    ///
    /// Returns [`OneNoteError::InvalidArgument`] when a segment is not valid
    /// percent-encoded UTF-8.
    pub fn from_path(path: &str) -> Result<Self> {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s).map(|d| d.into_owned()).map_err(|e| {
                    OneNoteError::InvalidArgument(format!("bad path segment '{s}': {e}"))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(match segments.as_slice() {
            [] => ListTarget::Notebooks,
            [notebook_id] => ListTarget::Sections {
                notebook_id: notebook_id.clone(),
            },
            [.., section_id] => ListTarget::Pages {
                section_id: section_id.clone(),
            },
        })
    }

    /// The kind of the items this listing returns.
    pub fn item_kind(&self) -> ItemKind {
        match self {
            ListTarget::Notebooks => ItemKind::Notebook,
            ListTarget::Sections { .. } => ItemKind::Section,
            ListTarget::Pages { .. } => ItemKind::Page,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteItem
// ---------------------------------------------------------------------------

/// A notebook, section or page as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Provider item id.
    pub id: String,

    /// Hierarchy level.
    pub kind: ItemKind,

    /// Display name (notebook/section `name`, page `title`).
    pub name: String,

    /// Web or self URL of the item.
    pub url: Option<String>,

    /// Last modification time (creation time for pages).
    pub last_modified: Option<DateTime<Utc>>,

    /// Creator identity (`createdBy`, or `createdByAppId` for pages).
    pub author_id: Option<String>,

    /// Listing path of this item: the parent path with the percent-encoded
    /// id appended.  Passing it back to `list_items` lists the children.
    pub path: String,
}

impl RemoteItem {
    pub(crate) fn from_wire(item: WireItem, kind: ItemKind, parent_path: &str) -> Self {
        let path = format!(
            "{}/{}",
            parent_path.trim_end_matches('/'),
            urlencoding::encode(&item.id)
        );
        let web_url = item
            .links
            .and_then(|l| l.one_note_web_url)
            .map(|link| link.href);

        match kind {
            ItemKind::Notebook | ItemKind::Section => RemoteItem {
                name: item.name.unwrap_or_default(),
                url: if kind == ItemKind::Section {
                    item.self_url
                } else {
                    web_url
                },
                last_modified: parse_timestamp(item.last_modified_time.as_deref()),
                author_id: item.created_by,
                id: item.id,
                kind,
                path,
            },
            ItemKind::Page => RemoteItem {
                name: item.title.or(item.name).unwrap_or_default(),
                url: web_url,
                last_modified: parse_timestamp(item.created_time.as_deref()),
                author_id: item.created_by_app_id,
                id: item.id,
                kind,
                path,
            },
        }
    }

    /// A section just created under the notebook listed at `notebook_path`.
    pub(crate) fn created_section(id: String, name: String, notebook_path: &str) -> Self {
        let path = format!(
            "{}/{}",
            notebook_path.trim_end_matches('/'),
            urlencoding::encode(&id)
        );
        RemoteItem {
            id,
            kind: ItemKind::Section,
            name,
            url: None,
            last_modified: None,
            author_id: None,
            path,
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// DownloadedPage
// ---------------------------------------------------------------------------

/// Result of a successful page download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPage {
    /// Where the HTML file or archive was written.
    pub path: PathBuf,

    /// Content URL the page was fetched from.
    pub source_url: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `{"value": [...]}` envelope of listing and lookup responses.
#[derive(Debug, Deserialize)]
pub(crate) struct WireList {
    #[serde(default)]
    pub value: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_by_app_id: Option<String>,
    #[serde(default, rename = "self")]
    pub self_url: Option<String>,
    #[serde(default)]
    pub links: Option<WireLinks>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireLinks {
    #[serde(default, rename = "oneNoteWebUrl")]
    pub one_note_web_url: Option<WireHref>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHref {
    pub href: String,
}
