//! Error types for the folio-dl library.

use thiserror::Error;

/// Errors that can occur while browsing folders or assembling archives.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A path or reference could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the archive encoder.
    #[cfg(feature = "archive")]
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A remote file or folder name cannot be used as a path component.
    #[error("Unsafe name: {0:?}")]
    UnsafeName(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Archive building is not available; the caller must fall back to
    /// sequential downloads.
    #[error("Archive support unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The requested folder holds no files.
    #[error("No files found in {0}")]
    NoFiles(String),

    /// Every item of the operation failed.
    #[error("Nothing could be downloaded from {0}")]
    NothingDownloaded(String),

    /// No folder matches the requested path.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Another top-level operation is still running.
    #[error("Another download is already in progress")]
    Busy,
}

impl Error {
    /// Returns true for errors meant to be shown to the user as a blocking
    /// notification. Everything else is logged and degraded.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NoFiles(_) | Self::NothingDownloaded(_) | Self::FolderNotFound(_) | Self::Busy
        )
    }
}

/// A specialized `Result` type for folio-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
