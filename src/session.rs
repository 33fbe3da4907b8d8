//! Top-level operations over one browsing session.
//!
//! A [`Session`] is built once with its configuration and collaborators and
//! owns the folder tree for its whole lifetime. Front ends call its
//! operations; none of the retry or fallback logic lives in the front end.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use crate::archive::{ArchiveBuilder, ArchiveLayout, ArchiveTask};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::fs::{FileSystem, TokioFileSystem, save_atomic};
use crate::listing::RemoteListing;
use crate::manifest::ManifestLoader;
use crate::progress::{ProgressReporter, ProgressSink};
use crate::resolver::ZipCandidateResolver;
use crate::sequential::SequentialDownloader;
use crate::stats::TransferStats;
use crate::tree::{Expansion, FolderTree, NodeId};

/// How a download request was satisfied.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// A pre-built archive was found and saved.
    Prebuilt {
        /// Where the archive was found.
        url: Url,
        /// Where it was saved.
        path: PathBuf,
        /// Archive size in bytes.
        size: u64,
    },
    /// An archive was assembled from the folder contents.
    Built {
        /// Where the archive was saved.
        path: PathBuf,
        /// Packed entry names.
        entries: Vec<String>,
        /// Per-item accounting.
        stats: TransferStats,
    },
    /// Files were saved one by one.
    Sequential {
        /// Why no archive was built.
        reason: String,
        /// Saved files, in task order.
        saved: Vec<PathBuf>,
        /// Per-item accounting.
        stats: TransferStats,
    },
}

/// Clears the busy flag when an operation ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turns a remote name into a single safe file name.
fn file_name_for(name: &str, fallback: &str) -> String {
    let cleaned = name.replace(['/', '\\'], "_");
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// A browsing session over one photo site.
pub struct Session<F: Fetcher = HttpFetcher, S: FileSystem = TokioFileSystem> {
    config: AppConfig,
    fetcher: Arc<F>,
    fs: Arc<S>,
    listing: RemoteListing<F>,
    manifest: ManifestLoader<F>,
    resolver: ZipCandidateResolver<F>,
    builder: ArchiveBuilder<F>,
    sequential: SequentialDownloader<F, S>,
    tree: Mutex<FolderTree>,
    progress: ProgressReporter,
    busy: AtomicBool,
}

impl Session {
    /// Creates a session talking HTTP and writing to the local disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: AppConfig, sink: Arc<dyn ProgressSink>) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(HttpFetcher::new()?),
            Arc::new(TokioFileSystem::new()),
            sink,
        )
    }
}

impl<F: Fetcher, S: FileSystem> Session<F, S> {
    /// Creates a session from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is invalid.
    pub fn with_parts(
        config: AppConfig,
        fetcher: Arc<F>,
        fs: Arc<S>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        let base = config.site.base()?;
        let site = &config.site;
        let manifest = ManifestLoader::new(Arc::clone(&fetcher), base.clone(), site);
        let tree = FolderTree::new(manifest.root_path());

        Ok(Self {
            listing: RemoteListing::new(Arc::clone(&fetcher), base.clone(), site.index_name.clone()),
            resolver: ZipCandidateResolver::new(Arc::clone(&fetcher), base.clone(), site),
            builder: ArchiveBuilder::new(Arc::clone(&fetcher), base.clone(), config.archive.clone()),
            sequential: SequentialDownloader::new(
                Arc::clone(&fetcher),
                Arc::clone(&fs),
                base,
                Duration::from_millis(config.archive.sequential_pause_ms),
            ),
            manifest,
            tree: Mutex::new(tree),
            progress: ProgressReporter::new(sink),
            busy: AtomicBool::new(false),
            config,
            fetcher,
            fs,
        })
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the shared progress indicator.
    #[must_use]
    pub const fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Returns a copy of the tree as discovered so far.
    pub async fn snapshot(&self) -> FolderTree {
        self.tree.lock().await.clone()
    }

    /// Expands the root folder.
    pub async fn load_root(&self) -> Expansion {
        let root = self.tree.lock().await.root();
        self.expand(root).await
    }

    /// Expands one folder; later calls for the same folder are no-ops.
    pub async fn expand(&self, id: NodeId) -> Expansion {
        let mut tree = self.tree.lock().await;
        tree.expand(id, &self.listing, &self.manifest).await
    }

    /// Expands the root and every folder up to `depth` levels below it.
    ///
    /// Returns the number of folders expanded by this call.
    pub async fn expand_to_depth(&self, depth: usize) -> usize {
        let mut level = vec![self.tree.lock().await.root()];
        let mut expanded = 0;

        for remaining in (0..=depth).rev() {
            let mut next = Vec::new();
            for id in level {
                if self.expand(id).await != Expansion::AlreadyLoaded {
                    expanded += 1;
                }
                if remaining > 0 {
                    let tree = self.tree.lock().await;
                    next.extend(tree.get(id).map(|n| n.children.clone()).unwrap_or_default());
                }
            }
            level = next;
        }
        expanded
    }

    /// Finds a folder by its slash-separated names below the root,
    /// expanding folders along the way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderNotFound`] if a segment does not exist.
    pub async fn locate(&self, path: &str) -> Result<NodeId> {
        let mut current = self.tree.lock().await.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.expand(current).await;
            current = self
                .tree
                .lock()
                .await
                .find_child(current, segment)
                .ok_or_else(|| Error::FolderNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    fn begin_operation(&self) -> Result<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    /// Downloads one folder.
    ///
    /// A pre-built archive is preferred; otherwise the folder is expanded
    /// and its files are packed into a fresh archive, or saved one by one
    /// when archives cannot be built. Progress always ends at 100.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another operation is running,
    /// [`Error::NoFiles`] for an empty folder, [`Error::NothingDownloaded`]
    /// if every file failed, or an I/O error if the result cannot be saved.
    pub async fn download_folder(&self, id: NodeId) -> Result<DownloadOutcome> {
        let _guard = self.begin_operation()?;
        let (name, path) = {
            let tree = self.tree.lock().await;
            let node = tree
                .get(id)
                .ok_or_else(|| Error::FolderNotFound(format!("{id:?}")))?;
            (node.name.clone(), node.path.clone())
        };

        self.progress.begin(&name);
        let result = self.download_folder_inner(id, &name, &path).await;
        self.progress.finish();
        if let Err(e) = &result {
            log::error!("Download of {name} failed: {e}");
        }
        result
    }

    async fn download_folder_inner(
        &self,
        id: NodeId,
        name: &str,
        path: &str,
    ) -> Result<DownloadOutcome> {
        if let Some(url) = self.resolver.resolve(name, path).await {
            match self.save_prebuilt(&url, name).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => log::warn!("Pre-built archive {url} unusable ({e}); assembling instead"),
            }
        }

        self.expand(id).await;
        let tasks = self.tree.lock().await.folder_tasks(id);
        if tasks.is_empty() {
            return Err(Error::NoFiles(name.to_string()));
        }
        let archive_name = format!("{}.zip", file_name_for(name, "folder"));
        self.assemble(&tasks, ArchiveLayout::Flat, &archive_name, name)
            .await
    }

    /// Downloads every file of every expanded folder as one archive grouped
    /// by folder.
    ///
    /// # Errors
    ///
    /// Same as [`download_folder`](Self::download_folder).
    pub async fn download_all_visible(&self) -> Result<DownloadOutcome> {
        const LABEL: &str = "all visible folders";

        let _guard = self.begin_operation()?;
        let tasks = self.tree.lock().await.visible_tasks();

        self.progress.begin(LABEL);
        let result = if tasks.is_empty() {
            Err(Error::NoFiles(LABEL.to_string()))
        } else {
            let archive_name = format!("folio-{}.zip", chrono::Local::now().format("%Y%m%d-%H%M%S"));
            self.assemble(&tasks, ArchiveLayout::ByFolder, &archive_name, LABEL)
                .await
        };
        self.progress.finish();
        if let Err(e) = &result {
            log::error!("Download of {LABEL} failed: {e}");
        }
        result
    }

    async fn save_prebuilt(&self, url: &Url, folder_name: &str) -> Result<DownloadOutcome> {
        let bytes = self.fetcher.fetch_bytes(url).await?;
        let fallback = format!("{}.zip", file_name_for(folder_name, "folder"));
        let file_name = url
            .path_segments()
            .and_then(Iterator::last)
            .and_then(|s| urlencoding::decode(s).ok())
            .map_or_else(|| fallback.clone(), |s| file_name_for(&s, &fallback));

        let path = self.config.paths.download_dir.join(&file_name);
        save_atomic(self.fs.as_ref(), &path, &bytes).await?;
        self.progress.item_complete(&file_name);
        log::info!("Saved pre-built archive {url} to {}", path.display());

        Ok(DownloadOutcome::Prebuilt {
            url: url.clone(),
            path,
            size: bytes.len() as u64,
        })
    }

    /// Builds an archive from `tasks`, falling back to sequential downloads
    /// when the builder cannot be used.
    async fn assemble(
        &self,
        tasks: &[ArchiveTask],
        layout: ArchiveLayout,
        archive_name: &str,
        label: &str,
    ) -> Result<DownloadOutcome> {
        let dest = &self.config.paths.download_dir;

        match self.builder.build(tasks, layout, &self.progress).await {
            Ok(built) if built.stats.made_progress() => {
                let path = dest.join(archive_name);
                save_atomic(self.fs.as_ref(), &path, &built.bytes).await?;
                log::info!(
                    "Saved {} of {} file(s) to {}",
                    built.entries.len(),
                    tasks.len(),
                    path.display()
                );
                Ok(DownloadOutcome::Built {
                    path,
                    entries: built.entries,
                    stats: built.stats,
                })
            }
            Ok(_) => Err(Error::NothingDownloaded(label.to_string())),
            Err(e) => {
                log::warn!("Cannot build archive ({e}); downloading files one by one");
                let report = self
                    .sequential
                    .download_all(tasks, layout, dest, &self.progress)
                    .await;
                if !report.stats.made_progress() {
                    return Err(Error::NothingDownloaded(label.to_string()));
                }
                Ok(DownloadOutcome::Sequential {
                    reason: e.to_string(),
                    saved: report.saved,
                    stats: report.stats,
                })
            }
        }
    }
}
