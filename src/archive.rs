//! Concurrent archive assembly.

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use url::Url;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::listing::with_trailing_slash;
use crate::pool::run_bounded;
use crate::progress::ProgressReporter;
use crate::stats::{TransferStats, TransferStatsBuilder};

/// How entries are named inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLayout {
    /// Bare file names; used for a single folder.
    Flat,
    /// `<folder label>/<file name>`; used for multi-folder batches.
    ByFolder,
}

/// One file to fetch and pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTask {
    /// Root-relative URL path of the containing folder.
    pub source_folder_path: String,
    /// File name, not percent-encoded.
    pub file_name: String,
    /// Slash-separated folder names used for grouping.
    pub folder_label: String,
}

fn checked(component: &str) -> Result<&str> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\'])
    {
        Err(Error::UnsafeName(component.to_string()))
    } else {
        Ok(component)
    }
}

impl ArchiveTask {
    /// URL of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto `base`.
    pub fn url(&self, base: &Url) -> Result<Url> {
        let folder = with_trailing_slash(&self.source_folder_path);
        Ok(base.join(&format!(
            "{folder}{}",
            urlencoding::encode(&self.file_name)
        ))?)
    }

    fn components(&self, layout: ArchiveLayout) -> Result<Vec<&str>> {
        let mut parts = Vec::new();
        if layout == ArchiveLayout::ByFolder && !self.folder_label.is_empty() {
            for part in self.folder_label.split('/') {
                parts.push(checked(part)?);
            }
        }
        parts.push(checked(&self.file_name)?);
        Ok(parts)
    }

    /// Entry name inside the archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsafeName`] if a name would escape its folder.
    pub fn entry_name(&self, layout: ArchiveLayout) -> Result<String> {
        Ok(self.components(layout)?.join("/"))
    }

    /// Relative path used when saving the file on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsafeName`] if a name would escape its folder.
    pub fn relative_path(&self, layout: ArchiveLayout) -> Result<PathBuf> {
        Ok(self.components(layout)?.into_iter().collect())
    }
}

/// An archive assembled in memory.
#[derive(Debug)]
pub struct BuiltArchive {
    /// Encoded archive.
    pub bytes: Vec<u8>,
    /// Packed entry names, in completion order.
    pub entries: Vec<String>,
    /// Per-item accounting.
    pub stats: TransferStats,
}

#[cfg(feature = "archive")]
struct ZipEncoder {
    writer: zip::ZipWriter<std::io::Cursor<Vec<u8>>>,
    options: zip::write::SimpleFileOptions,
}

#[cfg(feature = "archive")]
impl ZipEncoder {
    fn open(config: &ArchiveConfig) -> Result<Self> {
        if !config.enabled {
            return Err(Error::CapabilityUnavailable(
                "archive building is disabled".to_string(),
            ));
        }
        let method = if config.compress {
            zip::CompressionMethod::Deflated
        } else {
            zip::CompressionMethod::Stored
        };
        Ok(Self {
            writer: zip::ZipWriter::new(std::io::Cursor::new(Vec::new())),
            options: zip::write::SimpleFileOptions::default().compression_method(method),
        })
    }

    fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        use std::io::Write;

        self.writer.start_file(name, self.options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

#[cfg(not(feature = "archive"))]
struct ZipEncoder;

#[cfg(not(feature = "archive"))]
impl ZipEncoder {
    fn open(_config: &ArchiveConfig) -> Result<Self> {
        Err(Error::CapabilityUnavailable(
            "built without the `archive` feature".to_string(),
        ))
    }

    fn add(&mut self, _name: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Fetches files under a concurrency cap and packs them into one archive.
pub struct ArchiveBuilder<F: Fetcher> {
    fetcher: Arc<F>,
    base: Url,
    config: ArchiveConfig,
}

impl<F: Fetcher> ArchiveBuilder<F> {
    /// Creates a builder resolving task paths against `base`.
    pub const fn new(fetcher: Arc<F>, base: Url, config: ArchiveConfig) -> Self {
        Self {
            fetcher,
            base,
            config,
        }
    }

    async fn fetch(&self, task: &ArchiveTask) -> Result<Bytes> {
        let url = task.url(&self.base)?;
        self.fetcher.fetch_bytes(&url).await
    }

    /// Fetches every task and packs the successful ones.
    ///
    /// Each task is attempted once. A failed task is logged, reported to
    /// `progress` and left out; it never stops its siblings. Progress
    /// advances after every task, success or failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnavailable`] before fetching anything if
    /// archives cannot be built, or an archive error if the final encode
    /// fails.
    pub async fn build(
        &self,
        tasks: &[ArchiveTask],
        layout: ArchiveLayout,
        progress: &ProgressReporter,
    ) -> Result<BuiltArchive> {
        let mut encoder = ZipEncoder::open(&self.config)?;
        let total = tasks.len();
        let mut stats = TransferStatsBuilder::new();
        let mut entries = Vec::with_capacity(total);

        let mut fetches = pin!(run_bounded(
            tasks,
            self.config.effective_limit(),
            |task| async move { (task, self.fetch(task).await) },
        ));

        // Packing runs between fetch completions, so the encoder is never
        // shared across tasks.
        while let Some((task, fetched)) = fetches.next().await {
            let packed = task.entry_name(layout).and_then(|name| {
                let bytes = fetched?;
                encoder.add(&name, &bytes)?;
                Ok((name, bytes.len() as u64))
            });
            match packed {
                Ok((name, len)) => {
                    stats.add_success(len);
                    progress.item_complete(&name);
                    entries.push(name);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {e}", task.file_name);
                    progress.item_error(&task.file_name, &e.to_string());
                    stats.add_failure(task.file_name.clone());
                }
            }
            progress.advance(stats.completed(), total);
        }

        let bytes = encoder.finish()?;
        log::info!(
            "Packed {} of {total} file(s) into {} byte archive",
            entries.len(),
            bytes.len()
        );
        Ok(BuiltArchive {
            bytes,
            entries,
            stats: stats.build(),
        })
    }
}
