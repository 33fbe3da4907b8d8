//! File system abstraction for testability.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Abstraction over file system operations for testability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Writes `contents` to a file, replacing it if present.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;

    /// Renames a file from one path to another.
    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Removes a file.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".part");
    PathBuf::from(os)
}

/// Saves `contents` at `path` through a `.part` file renamed on success.
///
/// Creates the parent directory if needed. The `.part` file is removed if
/// the write or rename fails.
///
/// # Errors
///
/// Returns an error if the directory, the `.part` file, or the rename fails.
pub async fn save_atomic<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    contents: &[u8],
) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent).await?;
    }

    let pp = part_path(path);
    let result = match fs.write_file(&pp, contents).await {
        Ok(()) => fs.rename_file(&pp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() && fs.file_exists(&pp).await {
        let _ = fs.remove_file(&pp).await;
    }
    result
}
