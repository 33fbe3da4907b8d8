//! Remote folder listings: JSON index documents with an HTML fallback.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::fetch::Fetcher;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src], img[data-src]").expect("valid image selector"));

static IMAGE_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|webp|avif|heic|heif|tiff?|bmp)$").expect("valid regex")
});

/// A file discovered in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, not percent-encoded.
    pub name: String,
    /// Thumbnail URL, when the listing provides one.
    pub thumb_url: Option<String>,
}

impl FileEntry {
    /// Creates an entry without a thumbnail.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thumb_url: None,
        }
    }
}

/// A subfolder discovered in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    /// Folder name, not percent-encoded.
    pub name: String,
}

/// Uniform contents of a remote folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Files, in document order.
    pub files: Vec<FileEntry>,
    /// Subfolders, in document order.
    pub folders: Vec<FolderRef>,
}

impl Listing {
    /// Returns true if the listing holds neither files nor folders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

/// An entry of an index or manifest: a bare name or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum NamedEntry {
    Plain(String),
    Named {
        name: String,
        #[serde(default)]
        thumb: Option<String>,
    },
}

impl NamedEntry {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Plain(name) => (name, None),
            Self::Named { name, thumb } => (name, thumb),
        }
    }
}

#[derive(Deserialize)]
struct IndexDocument {
    #[serde(default)]
    files: Vec<NamedEntry>,
    #[serde(default)]
    folders: Vec<NamedEntry>,
}

/// Parses an index or manifest document.
///
/// # Errors
///
/// Returns an error if `text` is not a JSON object of the expected shape.
pub fn parse_index(text: &str) -> Result<Listing> {
    let doc: IndexDocument = serde_json::from_str(text)?;
    Ok(Listing {
        files: doc
            .files
            .into_iter()
            .map(|entry| {
                let (name, thumb_url) = entry.into_parts();
                FileEntry { name, thumb_url }
            })
            .collect(),
        folders: doc
            .folders
            .into_iter()
            .map(|entry| FolderRef {
                name: entry.into_parts().0,
            })
            .collect(),
    })
}

enum Child {
    Folder(String),
    File(String),
}

fn decode(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

/// Classifies `href` as a direct child of `folder_url`, if it is one.
fn direct_child(folder_url: &Url, href: &str) -> Option<Child> {
    let target = folder_url.join(href.trim()).ok()?;
    if target.origin() != folder_url.origin() {
        return None;
    }
    let base = decode(folder_url.path());
    let path = decode(target.path());
    let rest = path.strip_prefix(base.as_ref())?;
    let (segment, is_folder) = match rest.strip_suffix('/') {
        Some(segment) => (segment, true),
        None => (rest, false),
    };
    if segment.is_empty() || segment.contains('/') {
        return None;
    }
    let name = segment.to_string();
    Some(if is_folder {
        Child::Folder(name)
    } else {
        Child::File(name)
    })
}

/// Collects image references under `folder_url`, keyed by base filename.
fn scan_images(document: &Html, folder_url: &Url) -> Vec<FileEntry> {
    let base = decode(folder_url.path());
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for img in document.select(&IMAGES) {
        let Some(src) = img
            .value()
            .attr("data-src")
            .or_else(|| img.value().attr("src"))
        else {
            continue;
        };
        let Ok(target) = folder_url.join(src.trim()) else {
            continue;
        };
        if target.origin() != folder_url.origin() {
            continue;
        }
        let path = decode(target.path());
        if !path.starts_with(base.as_ref()) {
            continue;
        }
        let Some(name) = path.rsplit('/').next().filter(|n| IMAGE_EXT.is_match(n)) else {
            continue;
        };
        if seen.insert(name.to_string()) {
            files.push(FileEntry {
                name: name.to_string(),
                thumb_url: Some(target.to_string()),
            });
        }
    }

    files
}

/// Parses an HTML directory listing served at `folder_url`.
///
/// Anchors with a trailing slash are folders, other anchors are files; only
/// direct children of the folder are kept. If no file anchors are found,
/// embedded image references are used instead.
#[must_use]
pub fn parse_html_listing(html: &str, folder_url: &Url) -> Listing {
    let document = Html::parse_document(html);
    let mut listing = Listing::default();
    let mut seen_files = HashSet::new();
    let mut seen_folders = HashSet::new();

    for anchor in document.select(&ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        match direct_child(folder_url, href) {
            Some(Child::Folder(name)) => {
                if seen_folders.insert(name.clone()) {
                    listing.folders.push(FolderRef { name });
                }
            }
            Some(Child::File(name)) => {
                if seen_files.insert(name.clone()) {
                    listing.files.push(FileEntry::new(name));
                }
            }
            None => {}
        }
    }

    if listing.files.is_empty() {
        listing.files = scan_images(&document, folder_url);
        if !listing.files.is_empty() {
            log::debug!(
                "{folder_url}: no file links, using {} image reference(s)",
                listing.files.len()
            );
        }
    }

    listing
}

/// Appends a trailing slash if missing.
pub(crate) fn with_trailing_slash(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("{path}/"))
    }
}

/// Fetches folder listings from the remote store.
///
/// No caching happens here; the folder tree caches expanded nodes.
pub struct RemoteListing<F: Fetcher> {
    fetcher: Arc<F>,
    base: Url,
    index_name: String,
}

impl<F: Fetcher> RemoteListing<F> {
    /// Creates a listing client resolving folder paths against `base`.
    pub fn new(fetcher: Arc<F>, base: Url, index_name: impl Into<String>) -> Self {
        Self {
            fetcher,
            base,
            index_name: index_name.into(),
        }
    }

    /// Resolves a folder path to its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base URL.
    pub fn folder_url(&self, folder_path: &str) -> Result<Url> {
        Ok(self.base.join(&with_trailing_slash(folder_path))?)
    }

    /// Lists `folder_path` using the per-folder index document.
    ///
    /// # Errors
    ///
    /// Returns an error only if the HTML fallback could not be fetched.
    pub async fn list(&self, folder_path: &str) -> Result<Listing> {
        self.list_with(folder_path, &self.index_name).await
    }

    /// Lists `folder_path`, trying `document` as JSON before the HTML listing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the HTML fallback could not be fetched.
    /// Malformed documents degrade to an empty listing.
    pub async fn list_with(&self, folder_path: &str, document: &str) -> Result<Listing> {
        let folder_url = self.folder_url(folder_path)?;
        let doc_url = folder_url.join(document)?;

        match self.fetcher.fetch_text(&doc_url).await {
            Ok(text) => match parse_index(&text) {
                Ok(listing) => return Ok(listing),
                Err(e) => log::debug!("{doc_url} is not a valid index: {e}"),
            },
            Err(e) => log::debug!("{doc_url} unavailable: {e}"),
        }

        let html = self.fetcher.fetch_text(&folder_url).await?;
        Ok(parse_html_listing(&html, &folder_url))
    }
}
