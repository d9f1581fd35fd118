//! Page archiving
//!
//! A downloaded page is stored either as plain HTML (no images) or as a zip
//! archive laid out as:
//!
//! ```text
//! page.html
//! page_files/1
//! page_files/2
//! ...
//! ```
//!
//! Image `src` attributes in `page.html` are rewritten to
//! `./page_files/<n>`, numbered from 1 in document order, so the page renders
//! once the archive is expanded.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{OneNoteError, Result};

/// Name of the rewritten HTML document inside an archive.
pub const PAGE_HTML: &str = "page.html";

/// Directory holding the downloaded images inside an archive.
pub const PAGE_FILES_DIR: &str = "page_files";

/// Markup the image scan stops at: a comment (skipped whole, unterminated
/// comments run to the end of the document) or the start of an `<img` tag.
const MARKUP_PATTERN: &str = r"(?s)<!--.*?(?:-->|\z)|(?i:<img\b)";

/// One attribute at the start of the input, with its optional value.
const ATTRIBUTE_PATTERN: &str =
    r#"\A([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#;

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(MARKUP_PATTERN).expect("markup pattern is valid"))
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ATTRIBUTE_PATTERN).expect("attribute pattern is valid"))
}

/// Downloads the bytes behind an image reference.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetches `url` with a plain GET.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// An image `src` value found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Byte range of the raw attribute value in the document.
    pub span: std::ops::Range<usize>,
    /// Attribute value with HTML entities decoded.
    pub url: String,
}

/// Finds the `src` attribute of every `<img>` tag in `html`, in document
/// order.
///
/// Attributes are read one by one, so text inside another attribute's
/// quoted value never counts as `src`.  Tags inside comments are ignored.
///
/// # Examples
///
/// ```
/// use onenote_sync::archive::image_refs;
///
/// let html = r#"<p><img src="https://x/a?x=1&amp;y=2"><img alt='b' src='https://x/b'></p>"#;
/// let refs = image_refs(html);
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].url, "https://x/a?x=1&y=2");
/// assert_eq!(refs[1].url, "https://x/b");
/// ```
pub fn image_refs(html: &str) -> Vec<ImageRef> {
    let mut refs = Vec::new();
    let mut pos = 0;
    while let Some(found) = markup_pattern().find_at(html, pos) {
        pos = if found.as_str().starts_with("<!--") {
            found.end()
        } else {
            scan_img_tag(html, found.end(), &mut refs)
        };
    }
    refs
}

/// Reads the attributes of an `<img` tag starting at `pos`, records its
/// first `src` value and returns the offset just past the tag.
fn scan_img_tag(html: &str, mut pos: usize, refs: &mut Vec<ImageRef>) -> usize {
    let mut has_src = false;
    loop {
        let rest = &html[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();

        let next = match trimmed.chars().next() {
            None => return pos,
            Some('>') => return pos + 1,
            Some(c) => c,
        };

        let Some(caps) = attribute_pattern().captures(trimmed) else {
            // Stray `/`, quote or `=` between attributes.
            pos += next.len_utf8();
            continue;
        };

        if !has_src && caps[1].eq_ignore_ascii_case("src") {
            if let Some(value) = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)) {
                refs.push(ImageRef {
                    span: pos + value.start()..pos + value.end(),
                    url: html_escape::decode_html_entities(value.as_str()).into_owned(),
                });
                has_src = true;
            }
        }
        pos += caps.get(0).map_or(next.len_utf8(), |m| m.end());
    }
}

/// Replaces the value of each reference with `./page_files/<n>`.
pub fn rewrite_image_refs(html: &str, refs: &[ImageRef]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (index, image) in refs.iter().enumerate() {
        out.push_str(&html[cursor..image.span.start]);
        out.push_str(&format!("./{}/{}", PAGE_FILES_DIR, index + 1));
        cursor = image.span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Writes page HTML, plus its images when it has any, to a single file.
#[derive(Debug, Clone)]
pub struct PageArchiver {
    work_root: PathBuf,
}

impl Default for PageArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl PageArchiver {
    /// Archiver using the system temporary directory for scratch space.
    pub fn new() -> Self {
        Self {
            work_root: std::env::temp_dir(),
        }
    }

    /// Archiver creating its working directories under `work_root`.
    pub fn with_work_root<P: Into<PathBuf>>(work_root: P) -> Self {
        Self {
            work_root: work_root.into(),
        }
    }

    /// Stores `html` at `destination`.
    ///
    /// Without images the HTML is written verbatim.  Otherwise each image is
    /// fetched sequentially through `fetcher` into a fresh working directory,
    /// the document is rewritten to point at the local copies, and the
    /// working directory is zipped to `destination`.  The working directory
    /// is removed afterwards whether or not archiving succeeded.
    ///
    /// # Errors
    ///
    /// Returns filesystem and zip failures, and any error from `fetcher`.
    pub async fn archive(
        &self,
        html: &str,
        fetcher: &dyn AssetFetcher,
        destination: &Path,
    ) -> Result<()> {
        let refs = image_refs(html);
        if refs.is_empty() {
            tracing::debug!(path = %destination.display(), "Page has no images, writing HTML");
            tokio::fs::write(destination, html)
                .await
                .map_err(OneNoteError::Io)?;
            return Ok(());
        }

        let work_dir = self
            .work_root
            .join(format!("onenote_page_{}", Uuid::new_v4().simple()));
        if work_dir.exists() {
            tokio::fs::remove_dir_all(&work_dir)
                .await
                .map_err(OneNoteError::Io)?;
        }
        tokio::fs::create_dir_all(work_dir.join(PAGE_FILES_DIR))
            .await
            .map_err(OneNoteError::Io)?;

        let result = self
            .build_archive(html, &refs, fetcher, &work_dir, destination)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            tracing::warn!(dir = %work_dir.display(), "Failed to remove working directory: {e}");
        }

        result
    }

    async fn build_archive(
        &self,
        html: &str,
        refs: &[ImageRef],
        fetcher: &dyn AssetFetcher,
        work_dir: &Path,
        destination: &Path,
    ) -> Result<()> {
        let files_dir = work_dir.join(PAGE_FILES_DIR);
        for (index, image) in refs.iter().enumerate() {
            let bytes = fetcher.fetch(&image.url).await?;
            tokio::fs::write(files_dir.join((index + 1).to_string()), &bytes)
                .await
                .map_err(OneNoteError::Io)?;
        }
        tracing::debug!(images = refs.len(), "Fetched page images");

        let rewritten = rewrite_image_refs(html, refs);
        tokio::fs::write(work_dir.join(PAGE_HTML), rewritten)
            .await
            .map_err(OneNoteError::Io)?;

        let (source, output) = (work_dir.to_path_buf(), destination.to_path_buf());
        tokio::task::spawn_blocking(move || zip_directory(&source, &output))
            .await
            .map_err(|e| OneNoteError::Archive(format!("zip task failed: {e}")))??;
        tracing::info!(path = %destination.display(), images = refs.len(), "Page archived");
        Ok(())
    }
}

/// Zips the contents of `source_dir` (not the directory itself) into
/// `output_path`.  Blocking; run it off the async executor.
fn zip_directory(source_dir: &Path, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(OneNoteError::Io)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| OneNoteError::Archive(e.to_string()))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(source_dir)
            .map_err(|e| OneNoteError::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_file() {
            zip.start_file(name.as_str(), options)
                .map_err(OneNoteError::Zip)?;
            let content = std::fs::read(path).map_err(OneNoteError::Io)?;
            zip.write_all(&content).map_err(OneNoteError::Io)?;
        } else if path.is_dir() && path != source_dir {
            zip.add_directory(format!("{name}/"), options)
                .map_err(OneNoteError::Zip)?;
        }
    }

    zip.finish().map_err(OneNoteError::Zip)?;
    Ok(())
}
