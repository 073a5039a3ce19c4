//! In-process backing store.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::{FileStatus, FileType, FsError, ROOT_PATH, ReadStream, StoreDir, StoreRead, StoreWrite};

#[derive(Clone)]
enum Content {
    Dir,
    File(Arc<Vec<u8>>),
}

#[derive(Clone)]
struct Entry {
    content: Content,
    modified: SystemTime,
}

impl Entry {
    fn dir() -> Self {
        Self {
            content: Content::Dir,
            modified: SystemTime::now(),
        }
    }

    fn file(data: Vec<u8>) -> Self {
        Self {
            content: Content::File(Arc::new(data)),
            modified: SystemTime::now(),
        }
    }

    fn status(&self, path: &Path) -> FileStatus {
        let (file_type, len) = match &self.content {
            Content::Dir => (FileType::Directory, 0),
            Content::File(data) => (FileType::Regular, data.len() as u64),
        };
        FileStatus {
            path: path.to_path_buf(),
            file_type,
            len,
            modified: self.modified,
            accessed: self.modified,
        }
    }
}

type Tree = BTreeMap<PathBuf, Entry>;

/// Store held entirely in memory.
///
/// Cloning yields another handle onto the same tree. Open read streams see
/// the file as it was when opened.
#[derive(Clone)]
pub struct MemoryStore {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryStore {
    /// Create a store holding only the root directory.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(PathBuf::from(ROOT_PATH), Entry::dir());
        Self {
            tree: Arc::new(RwLock::new(tree)),
        }
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.read_tree().len())
            .finish()
    }
}

fn not_found(path: &Path) -> FsError {
    FsError::NotFound {
        path: path.to_path_buf(),
    }
}

/// Parent must be an existing directory.
fn check_parent(tree: &Tree, path: &Path) -> Result<(), FsError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match tree.get(parent).map(|e| &e.content) {
        Some(Content::Dir) => Ok(()),
        Some(Content::File(_)) => Err(FsError::io(
            "create",
            path,
            io::Error::other("parent is not a directory"),
        )),
        None => Err(not_found(parent)),
    }
}

impl StoreRead for MemoryStore {
    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        Ok(self.read_tree().contains_key(path))
    }

    fn status(&self, path: &Path) -> Result<FileStatus, FsError> {
        self.read_tree()
            .get(path)
            .map(|entry| entry.status(path))
            .ok_or_else(|| not_found(path))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ReadStream>, FsError> {
        match self.read_tree().get(path).map(|e| &e.content) {
            Some(Content::File(data)) => Ok(Box::new(MemoryStream {
                path: path.to_path_buf(),
                data: Arc::clone(data),
                closed: AtomicBool::new(false),
            })),
            Some(Content::Dir) => Err(FsError::io(
                "open",
                path,
                io::Error::other("is a directory"),
            )),
            None => Err(not_found(path)),
        }
    }
}

impl StoreWrite for MemoryStore {
    fn create_new_file(&self, path: &Path) -> Result<bool, FsError> {
        let mut tree = self.write_tree();
        if tree.contains_key(path) {
            return Ok(false);
        }
        check_parent(&tree, path)?;
        tree.insert(path.to_path_buf(), Entry::file(Vec::new()));
        Ok(true)
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, FsError> {
        let mut tree = self.write_tree();
        if let Some(Entry {
            content: Content::Dir,
            ..
        }) = tree.get(path)
        {
            return Err(FsError::io(
                "create",
                path,
                io::Error::other("is a directory"),
            ));
        }
        check_parent(&tree, path)?;
        tree.insert(path.to_path_buf(), Entry::file(Vec::new()));
        Ok(Box::new(MemoryWriter {
            store: self.clone(),
            path: path.to_path_buf(),
            buf: Vec::new(),
        }))
    }

    fn delete(&self, path: &Path) -> Result<bool, FsError> {
        let mut tree = self.write_tree();
        let Some(entry) = tree.get(path) else {
            return Ok(false);
        };
        if matches!(entry.content, Content::Dir) {
            let has_children = tree
                .range(path.to_path_buf()..)
                .skip(1)
                .take_while(|(p, _)| p.starts_with(path))
                .next()
                .is_some();
            if has_children || path == Path::new(ROOT_PATH) {
                return Ok(false);
            }
        }
        tree.remove(path);
        Ok(true)
    }
}

impl StoreDir for MemoryStore {
    fn mkdirs(&self, path: &Path) -> Result<bool, FsError> {
        let mut tree = self.write_tree();
        let mut missing = Vec::new();
        for ancestor in path.ancestors() {
            match tree.get(ancestor).map(|e| &e.content) {
                Some(Content::Dir) => break,
                Some(Content::File(_)) => {
                    return Err(FsError::AlreadyExists {
                        path: ancestor.to_path_buf(),
                        operation: "mkdirs",
                    });
                }
                None => missing.push(ancestor.to_path_buf()),
            }
        }
        for dir in missing {
            tree.insert(dir, Entry::dir());
        }
        Ok(true)
    }

    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>, FsError> {
        let tree = self.read_tree();
        match tree.get(path).map(|e| &e.content) {
            Some(Content::Dir) => {}
            Some(Content::File(_)) => {
                return Err(FsError::io(
                    "list",
                    path,
                    io::Error::other("not a directory"),
                ));
            }
            None => return Err(not_found(path)),
        }
        Ok(tree
            .range(path.to_path_buf()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(path))
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, entry)| entry.status(p))
            .collect())
    }
}

/// Snapshot of a file taken at open.
struct MemoryStream {
    path: PathBuf,
    data: Arc<Vec<u8>>,
    closed: AtomicBool,
}

impl ReadStream for MemoryStream {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FsError::io(
                "read",
                &self.path,
                io::Error::other("stream closed"),
            ));
        }
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn close(&self) -> Result<(), FsError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Buffers writes and publishes them on flush and on drop.
struct MemoryWriter {
    store: MemoryStore,
    path: PathBuf,
    buf: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut tree = self.store.write_tree();
        tree.insert(self.path.clone(), Entry::file(self.buf.clone()));
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
