use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::warn;
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// An open track file.
pub trait TrackSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> TrackSource for T {}

/// Every file system operation the scanner, reader, and repair engine perform.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<EntryKind>;
    fn open(&self, path: &Path) -> io::Result<Box<dyn TrackSource>>;
    /// Entries sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
    fn mkdir(&self, path: &Path) -> io::Result<()>;
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = std::fs::metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn TrackSource>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    /// Children that cannot be examined, such as dangling links, are logged and skipped.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() > 0 => {
                    warn!(path = ?err.path(), error = %err, "skipping unreadable directory entry");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let kind = if entry.file_type().is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_path_buf(),
                kind,
            });
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::copy(from, to).map(|_| ())
    }
}

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// In-memory file system that counts mutations and can be told to fail on chosen paths.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    failing: Mutex<HashSet<PathBuf>>,
    writes: Mutex<usize>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `path` and any missing parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.write();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir);
        }
    }

    /// Creates a file (and its parents) without counting it as a write.
    pub fn add_file(&self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .write()
            .insert(path.to_path_buf(), Node::File(bytes.into()));
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.read().get(path.as_ref()) {
            Some(Node::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.read().contains_key(path.as_ref())
    }

    /// Every operation touching `path` fails from now on.
    pub fn fail_path(&self, path: impl AsRef<Path>) {
        self.failing.lock().insert(path.as_ref().to_path_buf());
    }

    /// Number of mutating operations performed so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    pub fn reset_write_count(&self) {
        *self.writes.lock() = 0;
    }

    fn check(&self, path: &Path) -> io::Result<()> {
        if self.failing.lock().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected failure for {}", path.display()),
            ));
        }
        Ok(())
    }

    fn count_write(&self) {
        *self.writes.lock() += 1;
    }

    fn require_parent(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Ok(()),
            Some(parent) => match nodes.get(parent) {
                Some(Node::Dir) => Ok(()),
                _ => Err(not_found(parent)),
            },
            None => Ok(()),
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn file_bytes(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<Vec<u8>> {
    match nodes.get(path) {
        Some(Node::File(bytes)) => Ok(bytes.clone()),
        Some(Node::Dir) => Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} is a directory", path.display()),
        )),
        None => Err(not_found(path)),
    }
}

impl FileSystem for MemoryFileSystem {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        self.check(path)?;
        match self.nodes.read().get(path) {
            Some(Node::Dir) => Ok(EntryKind::Dir),
            Some(Node::File(_)) => Ok(EntryKind::File),
            None => Err(not_found(path)),
        }
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn TrackSource>> {
        self.check(path)?;
        let bytes = file_bytes(&self.nodes.read(), path)?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.check(path)?;
        let nodes = self.nodes.read();
        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        let entries = nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(path))
            .map(|(child, node)| DirEntry {
                name: child
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default(),
                path: child.clone(),
                kind: match node {
                    Node::Dir => EntryKind::Dir,
                    Node::File(_) => EntryKind::File,
                },
            })
            .collect();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check(path)?;
        file_bytes(&self.nodes.read(), path)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.check(path)?;
        let mut nodes = self.nodes.write();
        Self::require_parent(&nodes, path)?;
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }
        nodes.insert(path.to_path_buf(), Node::File(bytes.to_vec()));
        self.count_write();
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(from)?;
        self.check(to)?;
        let mut nodes = self.nodes.write();
        Self::require_parent(&nodes, to)?;
        let bytes = file_bytes(&nodes, from)?;
        nodes.remove(from);
        nodes.insert(to.to_path_buf(), Node::File(bytes));
        self.count_write();
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.check(path)?;
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                self.count_write();
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check(path)?;
        let mut nodes = self.nodes.write();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        nodes.retain(|candidate, _| !candidate.starts_with(path));
        self.count_write();
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        self.check(path)?;
        let mut nodes = self.nodes.write();
        if nodes.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        Self::require_parent(&nodes, path)?;
        nodes.insert(path.to_path_buf(), Node::Dir);
        self.count_write();
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(from)?;
        self.check(to)?;
        let mut nodes = self.nodes.write();
        Self::require_parent(&nodes, to)?;
        let bytes = file_bytes(&nodes, from)?;
        nodes.insert(to.to_path_buf(), Node::File(bytes));
        self.count_write();
        Ok(())
    }
}
