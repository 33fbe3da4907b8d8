//! One-file-at-a-time fallback used when no archive can be built.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::archive::{ArchiveLayout, ArchiveTask};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::fs::{FileSystem, save_atomic};
use crate::progress::ProgressReporter;
use crate::stats::{TransferStats, TransferStatsBuilder};

/// Files saved by a sequential run.
#[derive(Debug)]
pub struct SequentialReport {
    /// Saved files, in task order.
    pub saved: Vec<PathBuf>,
    /// Per-item accounting.
    pub stats: TransferStats,
}

/// Downloads files one at a time, pausing between them.
pub struct SequentialDownloader<F: Fetcher, S: FileSystem> {
    fetcher: Arc<F>,
    fs: Arc<S>,
    base: Url,
    pause: Duration,
}

impl<F: Fetcher, S: FileSystem> SequentialDownloader<F, S> {
    /// Creates a downloader with a fixed pause between files.
    pub const fn new(fetcher: Arc<F>, fs: Arc<S>, base: Url, pause: Duration) -> Self {
        Self {
            fetcher,
            fs,
            base,
            pause,
        }
    }

    async fn download_one(
        &self,
        task: &ArchiveTask,
        layout: ArchiveLayout,
        dest: &Path,
    ) -> Result<(PathBuf, u64)> {
        let path = dest.join(task.relative_path(layout)?);
        let url = task.url(&self.base)?;
        let bytes = self.fetcher.fetch_bytes(&url).await?;
        save_atomic(self.fs.as_ref(), &path, &bytes).await?;
        Ok((path, bytes.len() as u64))
    }

    /// Saves every task under `dest`, in task order.
    ///
    /// Never fails: a file that cannot be fetched or written is logged and
    /// skipped.
    pub async fn download_all(
        &self,
        tasks: &[ArchiveTask],
        layout: ArchiveLayout,
        dest: &Path,
        progress: &ProgressReporter,
    ) -> SequentialReport {
        let total = tasks.len();
        let mut stats = TransferStatsBuilder::new();
        let mut saved = Vec::new();

        for (i, task) in tasks.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            match self.download_one(task, layout, dest).await {
                Ok((path, len)) => {
                    log::debug!("Saved {}", path.display());
                    stats.add_success(len);
                    progress.item_complete(&task.file_name);
                    saved.push(path);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {e}", task.file_name);
                    progress.item_error(&task.file_name, &e.to_string());
                    stats.add_failure(task.file_name.clone());
                }
            }
            progress.advance(i + 1, total);
        }

        SequentialReport {
            saved,
            stats: stats.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{MemoryFileSystem, MockFetcher, RecordingProgress};

    fn task(folder: &str, label: &str, name: &str) -> ArchiveTask {
        ArchiveTask {
            source_folder_path: folder.to_string(),
            file_name: name.to_string(),
            folder_label: label.to_string(),
        }
    }

    fn downloader(
        fetcher: &Arc<MockFetcher>,
        fs: &Arc<MemoryFileSystem>,
        pause_ms: u64,
    ) -> SequentialDownloader<MockFetcher, MemoryFileSystem> {
        SequentialDownloader::new(
            Arc::clone(fetcher),
            Arc::clone(fs),
            Url::parse("http://gallery.test/").unwrap(),
            Duration::from_millis(pause_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn downloads_in_order_with_pauses_between() {
        let fetcher = Arc::new(MockFetcher::new());
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fetcher.bytes(&format!("http://gallery.test/photos/Trip/{name}"), name.as_bytes());
        }
        let fs = Arc::new(MemoryFileSystem::new());
        let tasks = [
            task("/photos/Trip/", "Trip", "a.jpg"),
            task("/photos/Trip/", "Trip", "b.jpg"),
            task("/photos/Trip/", "Trip", "c.jpg"),
        ];

        let start = tokio::time::Instant::now();
        let report = downloader(&fetcher, &fs, 250)
            .download_all(&tasks, ArchiveLayout::Flat, Path::new("out"), &ProgressReporter::default())
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(
            fetcher.gets(),
            vec![
                "http://gallery.test/photos/Trip/a.jpg".to_string(),
                "http://gallery.test/photos/Trip/b.jpg".to_string(),
                "http://gallery.test/photos/Trip/c.jpg".to_string(),
            ]
        );
        assert_eq!(fetcher.max_in_flight(), 1);
        assert_eq!(report.saved.len(), 3);
        assert_eq!(fs.contents("out/b.jpg").unwrap(), b"b.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_skipped() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.bytes("http://gallery.test/photos/A/1.jpg", b"1");
        fetcher.bytes("http://gallery.test/photos/B/3.jpg", b"3");
        let fs = Arc::new(MemoryFileSystem::new());
        let sink = Arc::new(RecordingProgress::default());
        let progress = ProgressReporter::new(sink.clone());
        let tasks = [
            task("/photos/A/", "A", "1.jpg"),
            task("/photos/A/", "A", "2.jpg"),
            task("/photos/B/", "B", "3.jpg"),
        ];

        let report = downloader(&fetcher, &fs, 200)
            .download_all(&tasks, ArchiveLayout::ByFolder, Path::new("out"), &progress)
            .await;

        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.failed, vec!["2.jpg".to_string()]);
        assert_eq!(
            fs.paths(),
            vec![PathBuf::from("out/A/1.jpg"), PathBuf::from("out/B/3.jpg")]
        );
        assert_eq!(sink.percents(), vec![33, 66, 100]);
    }

    #[tokio::test]
    async fn unsafe_names_are_skipped_without_fetching() {
        let fetcher = Arc::new(MockFetcher::new());
        let fs = Arc::new(MemoryFileSystem::new());

        let report = downloader(&fetcher, &fs, 0)
            .download_all(
                &[task("/photos/A/", "A", "../escape.jpg")],
                ArchiveLayout::Flat,
                Path::new("out"),
                &ProgressReporter::default(),
            )
            .await;

        assert_eq!(report.stats.failed.len(), 1);
        assert!(fetcher.requests().is_empty());
        assert!(fs.paths().is_empty());
    }
}
