//! folio-dl - A library for browsing photo folders and downloading them as
//! archives.
//!
//! The site is discovered lazily: the root comes from a manifest, every other
//! folder from its own index document or an HTML directory listing. A folder
//! download prefers a pre-built archive, then assembles one from the folder's
//! files, and finally saves the files one by one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use folio_dl::{AppConfig, NoProgress, Session};
//!
//! # async fn example() -> folio_dl::Result<()> {
//! let config = AppConfig::load(&AppConfig::default_path())?;
//! let session = Session::new(config, Arc::new(NoProgress))?;
//!
//! let trip = session.locate("2024/Trip").await?;
//! let outcome = session.download_folder(trip).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod listing;
pub mod manifest;
pub mod pool;
pub mod progress;
pub mod resolver;
pub mod sequential;
pub mod session;
pub mod stats;
pub mod tree;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use archive::{ArchiveBuilder, ArchiveLayout, ArchiveTask, BuiltArchive};
pub use config::{AppConfig, ArchiveConfig, ArchiveOverride, PathConfig, SiteConfig};
pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use fs::{FileSystem, TokioFileSystem};
pub use listing::{FileEntry, FolderRef, Listing, RemoteListing};
pub use manifest::ManifestLoader;
pub use progress::{NoProgress, ProgressReporter, ProgressSink};
pub use resolver::{CandidateList, ZipCandidateResolver};
pub use sequential::{SequentialDownloader, SequentialReport};
pub use session::{DownloadOutcome, Session};
pub use stats::{TransferStats, TransferStatsBuilder};
pub use tree::{Expansion, FolderNode, FolderTree, NodeId};
