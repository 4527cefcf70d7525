use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

/// Extensions treated as shortcut files when none are configured.
pub const DEFAULT_SHORTCUT_EXTENSIONS: &[&str] = &["lnk", "mblink", "strm"];

/// Async file-system abstraction used by the reconciler.
#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Check whether a path exists. Unreadable paths count as absent.
    async fn path_exists(&self, path: &Path) -> bool;

    /// Open a directory for iteration.
    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>>;

    /// Fetch lightweight file metadata.
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;

    /// Whether `path` names a shortcut file rather than media.
    fn is_shortcut(&self, path: &Path) -> bool;

    /// Target a shortcut file points at.
    async fn resolve_shortcut(&self, path: &Path) -> io::Result<PathBuf>;

    /// Drains a directory into entries, in listing order.
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>> {
        let mut stream = self.read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = stream.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Lightweight metadata needed by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FsEntry {
    fn new(path: PathBuf, metadata: FsMetadata) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            is_dir: metadata.is_dir,
            len: metadata.len,
            modified: metadata.modified,
        }
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// Async directory iterator (similar to tokio::fs::ReadDir).
#[async_trait]
pub trait ReadDirStream {
    /// Return the next entry, or None when exhausted.
    async fn next_entry(&mut self) -> io::Result<Option<FsEntry>>;
}

fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .map(|ext| extensions.contains(&ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or(false)
}

fn default_shortcut_extensions() -> HashSet<String> {
    DEFAULT_SHORTCUT_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Real filesystem implementation backed by tokio::fs.
///
/// Shortcut files are small text files whose first non-empty line is the
/// target path.
#[derive(Debug, Clone)]
pub struct RealFs {
    shortcut_extensions: HashSet<String>,
}

impl Default for RealFs {
    fn default() -> Self {
        Self::new()
    }
}

impl RealFs {
    pub fn new() -> Self {
        Self {
            shortcut_extensions: default_shortcut_extensions(),
        }
    }

    pub fn with_shortcut_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shortcut_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }
}

fn to_metadata(md: &std::fs::Metadata) -> FsMetadata {
    FsMetadata {
        is_dir: md.is_dir(),
        len: md.len(),
        modified: md.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        // try_exists avoids errors for permission issues by returning false
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>> {
        let rd = tokio::fs::read_dir(path).await?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let md = tokio::fs::metadata(path).await?;
        Ok(to_metadata(&md))
    }

    fn is_shortcut(&self, path: &Path) -> bool {
        has_extension(path, &self.shortcut_extensions)
    }

    async fn resolve_shortcut(&self, path: &Path) -> io::Result<PathBuf> {
        let contents = tokio::fs::read_to_string(path).await?;
        contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("shortcut {} has no target", path.display()),
                )
            })
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<FsEntry>> {
        let Some(entry) = self.inner.next_entry().await? else {
            return Ok(None);
        };
        let md = entry.metadata().await?;
        Ok(Some(FsEntry::new(entry.path(), to_metadata(&md))))
    }
}

/// In-memory filesystem for tests.
/// Note: Paths are treated literally; callers should use consistent absolute paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFs {
    nodes: HashMap<PathBuf, Node>,
    failing: HashSet<PathBuf>,
    shortcut_extensions: HashSet<String>,
}

#[derive(Debug, Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File { len: u64, modified: Option<DateTime<Utc>>, target: Option<PathBuf> },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            failing: HashSet::new(),
            shortcut_extensions: default_shortcut_extensions(),
        }
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if self.nodes.contains_key(&path) {
            return;
        }
        self.ensure_parent_link(&path);
        self.nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P, len: u64) {
        let path = path.into();
        self.ensure_parent_link(&path);
        self.nodes.insert(
            path,
            Node::File {
                len,
                modified: None,
                target: None,
            },
        );
    }

    /// Adds a shortcut file pointing at `target`.
    pub fn add_shortcut<P: Into<PathBuf>, T: Into<PathBuf>>(&mut self, path: P, target: T) {
        let path = path.into();
        self.ensure_parent_link(&path);
        self.nodes.insert(
            path,
            Node::File {
                len: 0,
                modified: None,
                target: Some(target.into()),
            },
        );
    }

    /// Removes a path and everything beneath it.
    pub fn remove<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        self.nodes.retain(|candidate, _| !candidate.starts_with(path));
        if let Some(parent) = path.parent()
            && let Some(Node::Dir { children }) = self.nodes.get_mut(parent)
        {
            children.retain(|child| child != path);
        }
    }

    /// Makes listing `path` fail with a permission error.
    pub fn fail_dir<P: Into<PathBuf>>(&mut self, path: P) {
        self.failing.insert(path.into());
    }

    fn ensure_parent_link(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !self.nodes.contains_key(parent) {
                self.nodes.insert(
                    parent.to_path_buf(),
                    Node::Dir {
                        children: Vec::new(),
                    },
                );
                self.ensure_parent_link(parent);
            }
            if let Some(Node::Dir { children }) = self.nodes.get_mut(parent)
                && !children.iter().any(|p| p.as_path() == path)
            {
                children.push(path.to_path_buf());
            }
        }
    }

    fn node_metadata(node: &Node) -> FsMetadata {
        match node {
            Node::Dir { .. } => FsMetadata {
                is_dir: true,
                len: 0,
                modified: None,
            },
            Node::File { len, modified, .. } => FsMetadata {
                is_dir: false,
                len: *len,
                modified: *modified,
            },
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("missing path: {}", path.display()),
    )
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Box<dyn ReadDirStream + Send>> {
        if self.failing.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("read_dir denied: {}", path.display()),
            ));
        }
        match self.nodes.get(path) {
            Some(Node::Dir { children }) => {
                let queue = children
                    .iter()
                    .filter_map(|child| {
                        self.nodes
                            .get(child)
                            .map(|node| FsEntry::new(child.clone(), Self::node_metadata(node)))
                    })
                    .collect();
                Ok(Box::new(InMemReadDir { queue }))
            }
            Some(Node::File { .. }) => Err(io::Error::other(format!(
                "read_dir on file: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        self.nodes
            .get(path)
            .map(Self::node_metadata)
            .ok_or_else(|| not_found(path))
    }

    fn is_shortcut(&self, path: &Path) -> bool {
        has_extension(path, &self.shortcut_extensions)
    }

    async fn resolve_shortcut(&self, path: &Path) -> io::Result<PathBuf> {
        match self.nodes.get(path) {
            Some(Node::File {
                target: Some(target),
                ..
            }) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not a shortcut: {}", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}

struct InMemReadDir {
    queue: VecDeque<FsEntry>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<FsEntry>> {
        Ok(self.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_listing_keeps_insertion_order() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/lib/b.mkv", 10);
        fs.add_dir("/lib/sub");
        fs.add_file("/lib/a.mkv", 5);

        let names: Vec<_> = fs
            .list_dir(Path::new("/lib"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        assert_eq!(
            names,
            vec![
                ("b.mkv".to_string(), false),
                ("sub".to_string(), true),
                ("a.mkv".to_string(), false)
            ]
        );
        assert!(fs.path_exists(Path::new("/")).await);
    }

    #[tokio::test]
    async fn removal_unlinks_from_parent() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/lib/sub/x.mkv", 1);
        fs.remove("/lib/sub");
        assert!(!fs.path_exists(Path::new("/lib/sub/x.mkv")).await);
        assert!(fs.list_dir(Path::new("/lib")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_dir_reports_permission_error() {
        let mut fs = InMemoryFs::new();
        fs.add_dir("/lib/locked");
        fs.fail_dir("/lib/locked");
        let err = fs.list_dir(Path::new("/lib/locked")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn shortcuts_resolve_on_both_backends() {
        let mut fs = InMemoryFs::new();
        fs.add_shortcut("/lib/other.lnk", "/elsewhere/movie.mkv");
        assert!(fs.is_shortcut(Path::new("/lib/other.lnk")));
        assert_eq!(
            fs.resolve_shortcut(Path::new("/lib/other.lnk")).await.unwrap(),
            PathBuf::from("/elsewhere/movie.mkv")
        );

        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("film.mblink");
        tokio::fs::write(&link, "\n  /mnt/films/film.mkv\n").await.unwrap();
        let real = RealFs::new();
        assert!(real.is_shortcut(&link));
        assert_eq!(
            real.resolve_shortcut(&link).await.unwrap(),
            PathBuf::from("/mnt/films/film.mkv")
        );
        assert_eq!(real.list_dir(dir.path()).await.unwrap().len(), 1);
    }
}
