//! OneNote resource access
//!
//! - [`client`] -- listing, name resolution, creation and page download
//! - [`sync`]   -- course → section reconciliation run on top-level listings
//! - [`types`]  -- normalized hierarchy items and wire formats

pub mod client;
pub mod sync;
pub mod types;

pub use client::{ResourceClient, ONENOTE_API_BASE};
pub use sync::{Course, CourseDirectory, HierarchySync, StaticCourseDirectory, SyncReport};
pub use types::{DownloadedPage, ItemKind, ListTarget, RemoteItem};
