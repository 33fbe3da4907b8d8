//! Root folder discovery.

use std::sync::Arc;

use url::Url;

use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use crate::listing::{Listing, RemoteListing, with_trailing_slash};

/// Loads the top-level folders from the root manifest, falling back to the
/// HTML listing of the photos root.
pub struct ManifestLoader<F: Fetcher> {
    listing: RemoteListing<F>,
    root: String,
}

impl<F: Fetcher> ManifestLoader<F> {
    /// Creates a loader for the site's photos root.
    pub fn new(fetcher: Arc<F>, base: Url, site: &SiteConfig) -> Self {
        Self {
            listing: RemoteListing::new(fetcher, base, site.manifest_name.clone()),
            root: with_trailing_slash(&site.photos_root).into_owned(),
        }
    }

    /// Root-relative path of the photo tree.
    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root
    }

    /// Returns the root contents. Never fails: if neither the manifest nor
    /// the HTML listing can be fetched, the listing is empty.
    pub async fn load(&self) -> Listing {
        match self.listing.list(&self.root).await {
            Ok(listing) => {
                log::info!("Found {} top-level folder(s)", listing.folders.len());
                listing
            }
            Err(e) => {
                log::warn!("Root listing {} unavailable: {e}", self.root);
                Listing::default()
            }
        }
    }
}
