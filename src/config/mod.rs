//! Configuration types for browsing and archive operations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default ordered archive candidates, probed after any override.
pub const DEFAULT_CANDIDATE_TEMPLATES: [&str; 4] = [
    "{folder_path}{name}.zip",
    "{folder_path}{name}.ZIP",
    "{root}{name}.zip",
    "{root}altfiles/{name}.zip",
];

/// Maps one folder name to a fixed archive location checked before any
/// generic candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOverride {
    /// Folder name, compared case-insensitively.
    pub folder: String,
    /// Absolute path (or full URL) of the archive.
    pub url: String,
}

/// Where the photo tree lives and how its documents are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin every root-relative path is resolved against.
    pub base_url: String,
    /// Root-relative path of the photo tree, with trailing slash.
    pub photos_root: String,
    /// Name of the root manifest document.
    pub manifest_name: String,
    /// Name of the per-folder index document.
    pub index_name: String,
    /// Ordered candidate archive locations.
    pub candidate_templates: Vec<String>,
    /// Per-folder archive overrides.
    pub archive_overrides: Vec<ArchiveOverride>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            photos_root: "/photos/".to_string(),
            manifest_name: "manifest.json".to_string(),
            index_name: "index.json".to_string(),
            candidate_templates: DEFAULT_CANDIDATE_TEMPLATES
                .iter()
                .map(ToString::to_string)
                .collect(),
            archive_overrides: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Adds an archive override.
    #[must_use]
    pub fn with_override(mut self, folder: impl Into<String>, url: impl Into<String>) -> Self {
        self.archive_overrides.push(ArchiveOverride {
            folder: folder.into(),
            url: url.into(),
        });
        self
    }

    /// Parses the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the base URL is not a valid URL.
    pub fn base(&self) -> crate::Result<url::Url> {
        url::Url::parse(&self.base_url)
            .map_err(|e| crate::Error::Config(format!("invalid base_url {:?}: {e}", self.base_url)))
    }
}

/// Configuration for archive assembly and the sequential fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Maximum number of file fetches in flight while building an archive.
    pub concurrency_limit: usize,
    /// Pause between two sequential downloads, in milliseconds.
    pub sequential_pause_ms: u64,
    /// Whether to deflate archive entries instead of storing them.
    pub compress: bool,
    /// Whether archive building is available at all.
    pub enabled: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            sequential_pause_ms: 250,
            compress: false,
            enabled: true,
        }
    }
}

impl ArchiveConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub const fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Sets the pause between sequential downloads.
    #[must_use]
    pub const fn with_sequential_pause_ms(mut self, pause_ms: u64) -> Self {
        self.sequential_pause_ms = pause_ms;
        self
    }

    /// Sets whether archive entries are deflated.
    #[must_use]
    pub const fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Sets whether archive building is available.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Concurrency limit clamped to at least one slot.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.concurrency_limit.max(1)
    }
}

/// Path configuration for downloaded artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory where archives and files are saved.
    pub download_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Site layout.
    pub site: SiteConfig,
    /// Archive settings.
    pub archive: ArchiveConfig,
    /// Output paths.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio-dl")
            .join("config.toml")
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(crate::Error::Config(format!("{}: {e}", path.display()))),
        }
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the string is not valid TOML for
    /// this structure.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_archive_config() {
        let config = ArchiveConfig::default();
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.sequential_pause_ms, 250);
        assert!(!config.compress);
        assert!(config.enabled);
    }

    #[test]
    fn archive_config_builder_pattern() {
        let config = ArchiveConfig::new()
            .with_concurrency_limit(8)
            .with_sequential_pause_ms(200)
            .with_compress(true)
            .with_enabled(false);

        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.sequential_pause_ms, 200);
        assert!(config.compress);
        assert!(!config.enabled);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let config = ArchiveConfig::new().with_concurrency_limit(0);
        assert_eq!(config.effective_limit(), 1);
    }

    #[test]
    fn default_site_config() {
        let site = SiteConfig::default();
        assert_eq!(site.photos_root, "/photos/");
        assert_eq!(site.manifest_name, "manifest.json");
        assert_eq!(site.index_name, "index.json");
        assert_eq!(site.candidate_templates.len(), 4);
        assert!(site.archive_overrides.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [site]
            base_url = "https://pics.example.org/"

            [[site.archive_overrides]]
            folder = "Wedding"
            url = "/downloads/wedding-full.zip"

            [archive]
            concurrency_limit = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.site.base_url, "https://pics.example.org/");
        assert_eq!(config.site.photos_root, "/photos/");
        assert_eq!(config.site.archive_overrides.len(), 1);
        assert_eq!(config.archive.concurrency_limit, 2);
        assert_eq!(config.archive.sequential_pause_ms, 250);
        assert_eq!(config.paths.download_dir, PathBuf::from("."));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("[archive]\nconcurrency_limit = \"many\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.archive.concurrency_limit, 4);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let loaded = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(loaded.site.candidate_templates, config.site.candidate_templates);
        assert_eq!(loaded.archive.concurrency_limit, config.archive.concurrency_limit);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let site = SiteConfig::default().with_base_url("not a url");
        assert!(matches!(site.base(), Err(crate::Error::Config(_))));
    }
}
