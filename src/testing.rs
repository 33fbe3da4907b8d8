//! In-memory doubles shared by the unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::fs::FileSystem;
use crate::progress::ProgressSink;

#[derive(Clone)]
struct Route {
    body: Bytes,
    delay: Duration,
    status: u16,
    present: bool,
}

/// A fetcher serving canned responses, tracking requests and in-flight
/// fetches. Unknown URLs answer 404.
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn route(&self, url: &str, route: Route) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }

    pub fn text(&self, url: &str, body: &str) {
        self.bytes(url, body.as_bytes());
    }

    pub fn bytes(&self, url: &str, body: &[u8]) {
        self.delayed(url, body, Duration::ZERO);
    }

    pub fn delayed(&self, url: &str, body: &[u8], delay: Duration) {
        self.route(
            url,
            Route {
                body: Bytes::copy_from_slice(body),
                delay,
                status: 200,
                present: true,
            },
        );
    }

    pub fn failing(&self, url: &str, status: u16) {
        self.route(
            url,
            Route {
                body: Bytes::new(),
                delay: Duration::ZERO,
                status,
                present: status == 200,
            },
        );
    }

    /// Answers existence checks positively while every GET fails with 500.
    pub fn probe_only(&self, url: &str) {
        self.route(
            url,
            Route {
                body: Bytes::new(),
                delay: Duration::ZERO,
                status: 500,
                present: true,
            },
        );
    }

    /// Every request as `"GET <url>"` or `"HEAD <url>"`, in issue order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<String> {
        self.with_method("GET ")
    }

    pub fn probes(&self) -> Vec<String> {
        self.with_method("HEAD ")
    }

    fn with_method(&self, prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| r.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, url: &Url) -> Result<Bytes> {
        self.requests.lock().unwrap().push(format!("GET {url}"));
        let route = self.routes.lock().unwrap().get(url.as_str()).cloned();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = route.as_ref().map(|r| r.delay).filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match route {
            Some(route) if route.status == 200 => Ok(route.body),
            Some(route) => Err(Error::Status {
                url: url.to_string(),
                status: route.status,
            }),
            None => Err(Error::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let body = self.respond(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        self.respond(url).await
    }

    async fn exists(&self, url: &Url) -> bool {
        self.requests.lock().unwrap().push(format!("HEAD {url}"));
        self.routes
            .lock()
            .unwrap()
            .get(url.as_str())
            .is_some_and(|r| r.present)
    }
}

/// A file system kept in a map.
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    async fn create_dir_all(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        let mut files = self.files.lock().unwrap();
        let contents = files
            .remove(from)
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// A progress sink recording every event.
#[derive(Default)]
pub struct RecordingProgress {
    pub percents: Mutex<Vec<u8>>,
    pub labels: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub finishes: AtomicUsize,
}

impl RecordingProgress {
    pub fn percents(&self) -> Vec<u8> {
        self.percents.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_begin(&self, label: &str) {
        self.labels.lock().unwrap().push(label.to_string());
    }

    fn on_percent(&self, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }

    fn on_item_complete(&self, name: &str) {
        self.completed.lock().unwrap().push(name.to_string());
    }

    fn on_item_error(&self, name: &str, _error: &str) {
        self.errors.lock().unwrap().push(name.to_string());
    }

    fn on_finish(&self) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
    }
}
