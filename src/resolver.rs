//! Locating pre-built folder archives.

use std::sync::Arc;

use url::Url;

use crate::config::{ArchiveOverride, SiteConfig};
use crate::fetch::Fetcher;
use crate::listing::with_trailing_slash;

/// Ordered archive URLs to probe for one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    /// Override location, checked before anything else.
    pub override_url: Option<Url>,
    /// Generic locations, in probe order.
    pub candidates: Vec<Url>,
}

impl CandidateList {
    /// Iterates every URL in probe order.
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.override_url.iter().chain(&self.candidates)
    }
}

/// Finds the first existing pre-built archive for a folder.
pub struct ZipCandidateResolver<F: Fetcher> {
    fetcher: Arc<F>,
    base: Url,
    photos_root: String,
    templates: Vec<String>,
    overrides: Vec<ArchiveOverride>,
}

impl<F: Fetcher> ZipCandidateResolver<F> {
    /// Creates a resolver from the site layout.
    pub fn new(fetcher: Arc<F>, base: Url, site: &SiteConfig) -> Self {
        Self {
            fetcher,
            base,
            photos_root: with_trailing_slash(&site.photos_root).into_owned(),
            templates: site.candidate_templates.clone(),
            overrides: site.archive_overrides.clone(),
        }
    }

    fn find_override(&self, folder_name: &str) -> Option<&ArchiveOverride> {
        let wanted = folder_name.to_lowercase();
        self.overrides
            .iter()
            .find(|o| o.folder.to_lowercase() == wanted)
    }

    fn join(&self, path: &str) -> Option<Url> {
        match self.base.join(path) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Skipping archive candidate {path:?}: {e}");
                None
            }
        }
    }

    /// Builds the candidate list for a folder without probing anything.
    #[must_use]
    pub fn candidates(&self, folder_name: &str, folder_path: &str) -> CandidateList {
        let folder_path = with_trailing_slash(folder_path);
        let encoded = urlencoding::encode(folder_name);

        let override_url = self
            .find_override(folder_name)
            .and_then(|o| self.join(&o.url));

        let candidates = self
            .templates
            .iter()
            .map(|t| {
                t.replace("{folder_path}", &folder_path)
                    .replace("{root}", &self.photos_root)
                    .replace("{name}", &encoded)
            })
            .filter_map(|path| self.join(&path))
            .collect();

        CandidateList {
            override_url,
            candidates,
        }
    }

    /// Probes the candidates in order and returns the first that exists.
    ///
    /// An existing override short-circuits the generic candidates. Probing
    /// stops at the first hit.
    pub async fn resolve(&self, folder_name: &str, folder_path: &str) -> Option<Url> {
        let list = self.candidates(folder_name, folder_path);

        if let Some(url) = list.override_url {
            if self.fetcher.exists(&url).await {
                log::info!("Using override archive for {folder_name}: {url}");
                return Some(url);
            }
            log::debug!("Override archive {url} for {folder_name} is missing");
        }

        for url in list.candidates {
            if self.fetcher.exists(&url).await {
                log::info!("Found pre-built archive for {folder_name}: {url}");
                return Some(url);
            }
            log::debug!("No archive at {url}");
        }
        None
    }
}
