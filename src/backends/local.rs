//! Backing store over a directory of the local filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use crate::{FileStatus, FileType, FsError, ReadStream, StoreDir, StoreRead, StoreWrite};

/// Store whose `/` is a directory on the local filesystem.
///
/// Store paths are absolute (`/a/b`) and are resolved beneath the root;
/// `..` components are rejected.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Serve the existing directory `root`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `root` does not exist
    /// - [`FsError::Io`] if `root` is not a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FsError> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|e| FsError::io("open root", &root, e))?;
        if !meta.is_dir() {
            return Err(FsError::io(
                "open root",
                &root,
                io::Error::other("not a directory"),
            ));
        }
        Ok(Self { root })
    }

    /// Local directory backing `/`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local(&self, path: &Path) -> Result<PathBuf, FsError> {
        let mut local = self.root.clone();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(name) => local.push(name),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(FsError::InvalidName {
                        name: path.display().to_string(),
                    });
                }
            }
        }
        Ok(local)
    }
}

fn file_type_of(meta: &fs::Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_dir() {
        return FileType::Directory;
    }
    if ft.is_file() {
        return FileType::Regular;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_block_device() {
            return FileType::BlockDevice;
        }
        if ft.is_char_device() {
            return FileType::CharDevice;
        }
        if ft.is_socket() {
            return FileType::Socket;
        }
        if ft.is_fifo() {
            return FileType::Fifo;
        }
    }
    FileType::Regular
}

fn status_of(path: PathBuf, meta: &fs::Metadata) -> FileStatus {
    let file_type = file_type_of(meta);
    FileStatus {
        path,
        file_type,
        len: if file_type == FileType::Directory {
            0
        } else {
            meta.len()
        },
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        accessed: meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

impl StoreRead for LocalStore {
    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        let local = self.local(path)?;
        local
            .try_exists()
            .map_err(|e| FsError::io("exists", path, e))
    }

    fn status(&self, path: &Path) -> Result<FileStatus, FsError> {
        let local = self.local(path)?;
        let meta = fs::metadata(&local).map_err(|e| FsError::io("status", path, e))?;
        Ok(status_of(path.to_path_buf(), &meta))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ReadStream>, FsError> {
        let local = self.local(path)?;
        let file = File::open(&local).map_err(|e| FsError::io("open", path, e))?;
        let meta = file.metadata().map_err(|e| FsError::io("open", path, e))?;
        if meta.is_dir() {
            return Err(FsError::io(
                "open",
                path,
                io::Error::other("is a directory"),
            ));
        }
        Ok(Box::new(LocalStream {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
        }))
    }
}

impl StoreWrite for LocalStore {
    fn create_new_file(&self, path: &Path) -> Result<bool, FsError> {
        let local = self.local(path)?;
        match OpenOptions::new().write(true).create_new(true).open(&local) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(FsError::io("create", path, e)),
        }
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, FsError> {
        let local = self.local(path)?;
        let file = File::create(&local).map_err(|e| FsError::io("create", path, e))?;
        Ok(Box::new(file))
    }

    fn delete(&self, path: &Path) -> Result<bool, FsError> {
        let local = self.local(path)?;
        let meta = match fs::symlink_metadata(&local) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(FsError::io("delete", path, e)),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir(&local)
        } else {
            fs::remove_file(&local)
        };
        match removed {
            Ok(()) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(FsError::io("delete", path, e)),
        }
    }
}

impl StoreDir for LocalStore {
    fn mkdirs(&self, path: &Path) -> Result<bool, FsError> {
        let local = self.local(path)?;
        fs::create_dir_all(&local).map_err(|e| FsError::io("mkdirs", path, e))?;
        Ok(true)
    }

    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>, FsError> {
        let local = self.local(path)?;
        let entries = fs::read_dir(&local).map_err(|e| FsError::io("list", path, e))?;
        let mut statuses = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::io("list", path, e))?;
            let child = path.join(entry.file_name());
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Removed between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(FsError::io("list", &child, e)),
            };
            statuses.push(status_of(child, &meta));
        }
        Ok(statuses)
    }
}

/// Open local file serving positional reads.
struct LocalStream {
    path: PathBuf,
    file: RwLock<Option<File>>,
}

impl ReadStream for LocalStream {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let guard = self.file.read().unwrap_or_else(PoisonError::into_inner);
        let file = guard.as_ref().ok_or_else(|| {
            FsError::io("read", &self.path, io::Error::other("stream closed"))
        })?;
        positional_read(file, buf, offset).map_err(|e| FsError::io("read", &self.path, e))
    }

    fn close(&self) -> Result<(), FsError> {
        self.file
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
