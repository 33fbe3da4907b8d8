//! Lazily expanded folder tree.

use std::borrow::Cow;

use crate::archive::ArchiveTask;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::listing::{FileEntry, Listing, RemoteListing, with_trailing_slash};
use crate::manifest::ManifestLoader;

/// Handle to a node in a [`FolderTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A remote folder. Children and files stay empty until expanded.
#[derive(Debug, Clone)]
pub struct FolderNode {
    /// Display name, not percent-encoded.
    pub name: String,
    /// Root-relative URL path with trailing slash.
    pub path: String,
    /// Slash-separated names from the root, empty for the root itself.
    pub label: String,
    /// Subfolders in listing order.
    pub children: Vec<NodeId>,
    /// Files in listing order.
    pub files: Vec<FileEntry>,
    /// Set once, on the first expansion.
    pub loaded: bool,
    /// Why the expansion came back empty, if it failed.
    pub error: Option<String>,
}

/// Result of an [`FolderTree::expand`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The node was expanded earlier; nothing was fetched.
    AlreadyLoaded,
    /// Contents were fetched and cached.
    Loaded {
        /// Number of subfolders found.
        folders: usize,
        /// Number of files found.
        files: usize,
    },
    /// Nothing could be fetched; the node is cached as empty.
    Failed(String),
}

/// Folder nodes discovered so far, owned in one arena.
///
/// Nodes are never removed for the lifetime of the tree.
#[derive(Debug, Clone)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
}

impl FolderTree {
    /// Creates a tree holding only the unexpanded root.
    #[must_use]
    pub fn new(root_path: &str) -> Self {
        let path = with_trailing_slash(root_path).into_owned();
        let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        let name = if last.is_empty() {
            "/".to_string()
        } else {
            urlencoding::decode(last).map_or_else(|_| last.to_string(), Cow::into_owned)
        };
        Self {
            nodes: vec![FolderNode {
                name,
                path,
                label: String::new(),
                children: Vec::new(),
                files: Vec::new(),
                loaded: false,
                error: None,
            }],
        }
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&FolderNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes discovered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the direct child of `id` called `name`.
    #[must_use]
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.get(id)?
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].name == name)
    }

    /// Caches a listing outcome on `id`. No-op if the node is loaded.
    pub fn apply(&mut self, id: NodeId, result: Result<Listing>) -> Expansion {
        let Some(node) = self.nodes.get(id.0) else {
            return Expansion::Failed(format!("unknown folder {id:?}"));
        };
        if node.loaded {
            return Expansion::AlreadyLoaded;
        }
        let parent_path = node.path.clone();
        let parent_label = node.label.clone();

        let (listing, error) = match result {
            Ok(listing) => (listing, None),
            Err(e) => {
                log::warn!("Could not list {parent_path}: {e}");
                (Listing::default(), Some(e.to_string()))
            }
        };

        let mut children = Vec::with_capacity(listing.folders.len());
        for folder in listing.folders {
            if matches!(folder.name.as_str(), "" | "." | "..") {
                log::warn!("Ignoring folder {:?} listed under {parent_path}", folder.name);
                continue;
            }
            let child = NodeId(self.nodes.len());
            let label = if parent_label.is_empty() {
                folder.name.clone()
            } else {
                format!("{parent_label}/{}", folder.name)
            };
            self.nodes.push(FolderNode {
                path: format!("{parent_path}{}/", urlencoding::encode(&folder.name)),
                name: folder.name,
                label,
                children: Vec::new(),
                files: Vec::new(),
                loaded: false,
                error: None,
            });
            children.push(child);
        }

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.files = listing.files;
        node.loaded = true;

        match error {
            Some(e) => {
                node.error = Some(e.clone());
                Expansion::Failed(e)
            }
            None => Expansion::Loaded {
                folders: node.children.len(),
                files: node.files.len(),
            },
        }
    }

    /// Expands `id` on first call; later calls are no-ops.
    ///
    /// The root is read through the manifest, every other node through its
    /// folder index. Failures leave the node loaded and empty.
    pub async fn expand<F: Fetcher>(
        &mut self,
        id: NodeId,
        listing: &RemoteListing<F>,
        manifest: &ManifestLoader<F>,
    ) -> Expansion {
        let Some(node) = self.get(id) else {
            return Expansion::Failed(format!("unknown folder {id:?}"));
        };
        if node.loaded {
            return Expansion::AlreadyLoaded;
        }
        let result = if id == self.root() {
            Ok(manifest.load().await)
        } else {
            let path = node.path.clone();
            listing.list(&path).await
        };
        self.apply(id, result)
    }

    /// Loaded nodes in depth-first order from the root.
    #[must_use]
    pub fn loaded_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if !node.loaded {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// One task per file of `id`, in listing order.
    #[must_use]
    pub fn folder_tasks(&self, id: NodeId) -> Vec<ArchiveTask> {
        self.get(id).map_or_else(Vec::new, |node| {
            node.files
                .iter()
                .map(|file| ArchiveTask {
                    source_folder_path: node.path.clone(),
                    file_name: file.name.clone(),
                    folder_label: node.label.clone(),
                })
                .collect()
        })
    }

    /// Tasks for every file of every loaded folder.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<ArchiveTask> {
        self.loaded_nodes()
            .into_iter()
            .flat_map(|id| self.folder_tasks(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use url::Url;

    use crate::config::SiteConfig;
    use crate::listing::FolderRef;
    use crate::testing::MockFetcher;

    struct Fixture {
        fetcher: Arc<MockFetcher>,
        listing: RemoteListing<MockFetcher>,
        manifest: ManifestLoader<MockFetcher>,
    }

    fn fixture() -> Fixture {
        let fetcher = Arc::new(MockFetcher::new());
        let base = Url::parse("http://gallery.test/").unwrap();
        let site = SiteConfig::default();
        Fixture {
            listing: RemoteListing::new(Arc::clone(&fetcher), base.clone(), "index.json"),
            manifest: ManifestLoader::new(Arc::clone(&fetcher), base, &site),
            fetcher,
        }
    }

    fn listing(folders: &[&str], files: &[&str]) -> Listing {
        Listing {
            folders: folders
                .iter()
                .map(|n| FolderRef {
                    name: (*n).to_string(),
                })
                .collect(),
            files: files.iter().map(|n| FileEntry::new(*n)).collect(),
        }
    }

    #[test]
    fn dot_segment_folders_are_ignored() {
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.apply(root, Ok(listing(&["Trip"], &[])));
        let trip = tree.find_child(root, "Trip").unwrap();

        let outcome = tree.apply(trip, Ok(listing(&["..", ".", "", "Day 1"], &["a.jpg"])));

        assert_eq!(outcome, Expansion::Loaded { folders: 1, files: 1 });
        let children = &tree.get(trip).unwrap().children;
        assert_eq!(children.len(), 1);
        assert_eq!(tree.get(children[0]).unwrap().path, "/photos/Trip/Day%201/");
    }

    #[test]
    fn new_tree_has_unloaded_root() {
        let tree = FolderTree::new("/photos");
        let root = tree.get(tree.root()).unwrap();
        assert_eq!(root.name, "photos");
        assert_eq!(root.path, "/photos/");
        assert!(!root.loaded);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn apply_builds_encoded_child_paths_and_labels() {
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.apply(root, Ok(listing(&["Summer Trip"], &[])));
        let trip = tree.find_child(root, "Summer Trip").unwrap();
        tree.apply(trip, Ok(listing(&["Day 1"], &["a.jpg"])));
        let day = tree.find_child(trip, "Day 1").unwrap();

        let day = tree.get(day).unwrap();
        assert_eq!(day.path, "/photos/Summer%20Trip/Day%201/");
        assert_eq!(day.label, "Summer Trip/Day 1");
    }

    #[test]
    fn apply_is_once_only() {
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        assert_eq!(
            tree.apply(root, Ok(listing(&["A"], &["x.jpg"]))),
            Expansion::Loaded {
                folders: 1,
                files: 1
            }
        );
        assert_eq!(
            tree.apply(root, Ok(listing(&["B", "C"], &[]))),
            Expansion::AlreadyLoaded
        );
        assert_eq!(tree.get(root).unwrap().children.len(), 1);
        assert_eq!(tree.len(), 2);
    }

    #[tokio::test]
    async fn expand_fetches_once() {
        let fx = fixture();
        fx.fetcher.text(
            "http://gallery.test/photos/manifest.json",
            r#"{"folders": ["Trip"]}"#,
        );
        fx.fetcher.text(
            "http://gallery.test/photos/Trip/index.json",
            r#"{"files": ["a.jpg", "b.jpg"], "folders": []}"#,
        );

        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.expand(root, &fx.listing, &fx.manifest).await;
        let trip = tree.find_child(root, "Trip").unwrap();

        let first = tree.expand(trip, &fx.listing, &fx.manifest).await;
        let requests = fx.fetcher.requests().len();
        let second = tree.expand(trip, &fx.listing, &fx.manifest).await;

        assert_eq!(
            first,
            Expansion::Loaded {
                folders: 0,
                files: 2
            }
        );
        assert_eq!(second, Expansion::AlreadyLoaded);
        assert_eq!(fx.fetcher.requests().len(), requests);
    }

    #[tokio::test]
    async fn failed_expansion_caches_empty_node() {
        let fx = fixture();
        fx.fetcher.text(
            "http://gallery.test/photos/manifest.json",
            r#"{"folders": ["Gone"]}"#,
        );

        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.expand(root, &fx.listing, &fx.manifest).await;
        let gone = tree.find_child(root, "Gone").unwrap();

        let outcome = tree.expand(gone, &fx.listing, &fx.manifest).await;
        assert!(matches!(outcome, Expansion::Failed(_)));

        let node = tree.get(gone).unwrap();
        assert!(node.loaded);
        assert!(node.files.is_empty() && node.children.is_empty());
        assert!(node.error.is_some());
        assert_eq!(
            tree.expand(gone, &fx.listing, &fx.manifest).await,
            Expansion::AlreadyLoaded
        );
    }

    #[tokio::test]
    async fn unreachable_root_yields_no_folders() {
        let fx = fixture();
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();

        let outcome = tree.expand(root, &fx.listing, &fx.manifest).await;
        assert_eq!(
            outcome,
            Expansion::Loaded {
                folders: 0,
                files: 0
            }
        );
    }

    #[test]
    fn visible_tasks_cover_loaded_nodes_in_tree_order() {
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.apply(root, Ok(listing(&["A", "B", "C"], &[])));
        let a = tree.find_child(root, "A").unwrap();
        let b = tree.find_child(root, "B").unwrap();
        tree.apply(a, Ok(listing(&["Inner"], &["a1.jpg"])));
        tree.apply(b, Ok(listing(&[], &["b1.jpg", "b2.jpg"])));
        let inner = tree.find_child(a, "Inner").unwrap();
        tree.apply(inner, Ok(listing(&[], &["i.jpg"])));

        let tasks: Vec<_> = tree
            .visible_tasks()
            .into_iter()
            .map(|t| format!("{}|{}", t.folder_label, t.file_name))
            .collect();
        assert_eq!(tasks, ["A|a1.jpg", "A/Inner|i.jpg", "B|b1.jpg", "B|b2.jpg"]);
    }

    #[test]
    fn folder_tasks_carry_source_path() {
        let mut tree = FolderTree::new("/photos/");
        let root = tree.root();
        tree.apply(root, Ok(listing(&["Summer Trip"], &[])));
        let trip = tree.find_child(root, "Summer Trip").unwrap();
        tree.apply(trip, Ok(listing(&[], &["a.jpg"])));

        let tasks = tree.folder_tasks(trip);
        assert_eq!(
            tasks,
            vec![ArchiveTask {
                source_folder_path: "/photos/Summer%20Trip/".into(),
                file_name: "a.jpg".into(),
                folder_label: "Summer Trip".into(),
            }]
        );
    }
}
