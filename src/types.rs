//! Core types exchanged with the protocol layer and the backing store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

use crate::FsError;

/// Path of the exported root directory.
pub const ROOT_PATH: &str = "/";

/// Size of a file handle on the wire.
pub const HANDLE_LEN: usize = 16;

/// Permission bits reported for every object (`rwxrwxrwx`).
///
/// The backing store's own permission model is not mapped through.
pub const ALL_ACCESS: u32 = 0o777;

/// Directory type bits of a Unix mode.
pub const S_IFDIR: u32 = 0o040000;

/// Regular-file type bits of a Unix mode.
pub const S_IFREG: u32 = 0o100000;

/// Opaque 128-bit file handle.
///
/// Randomly generated on first exposure of a path. Encoded on the wire as two
/// big-endian 64-bit words, most significant word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileHandle(Uuid);

impl FileHandle {
    /// Mint a fresh random handle.
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a handle from its two 64-bit words.
    pub const fn from_words(most: u64, least: u64) -> Self {
        Self(Uuid::from_u128(((most as u128) << 64) | least as u128))
    }

    /// Decode a handle from its 16-byte wire form.
    ///
    /// # Errors
    ///
    /// - [`FsError::MalformedHandle`] if `bytes` is not exactly 16 bytes long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FsError> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| FsError::MalformedHandle { len: bytes.len() })
    }

    /// Encode this handle into its 16-byte wire form.
    #[inline]
    pub fn to_bytes(&self) -> [u8; HANDLE_LEN] {
        *self.0.as_bytes()
    }

    /// The (most significant, least significant) 64-bit words.
    #[inline]
    pub fn words(&self) -> (u64, u64) {
        let v = self.0.as_u128();
        ((v >> 64) as u64, v as u64)
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path paired with its handle: the unit returned to the protocol layer.
///
/// Only [`HandleRegistry`](crate::HandleRegistry) constructs nodes, so two
/// nodes for the same path always carry the same handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    path: PathBuf,
    handle: FileHandle,
}

impl Node {
    pub(crate) fn new(path: PathBuf, handle: FileHandle) -> Self {
        Self { path, handle }
    }

    /// Backing store path of this node.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle of this node.
    #[inline]
    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Wire encoding of this node's handle.
    #[inline]
    pub fn to_bytes(&self) -> [u8; HANDLE_LEN] {
        self.handle.to_bytes()
    }

    /// Stable 64-bit file id for attribute replies.
    pub fn fileid(&self) -> u64 {
        let (most, least) = self.handle.words();
        most ^ least
    }

    /// Returns `true` if this is the exported root.
    pub fn is_root(&self) -> bool {
        self.path == Path::new(ROOT_PATH)
    }
}

/// Type of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Block device.
    BlockDevice,
    /// Character device.
    CharDevice,
    /// Unix domain socket.
    Socket,
    /// Named pipe.
    Fifo,
}

impl FileType {
    /// Unix file-type bits for this type, for the types the adapter reports.
    pub const fn mode_bits(self) -> u32 {
        match self {
            FileType::Directory => S_IFDIR,
            _ => S_IFREG,
        }
    }
}

/// Status of one path as reported by the backing store.
#[derive(Debug, Clone)]
pub struct FileStatus {
    /// Full path of the object.
    pub path: PathBuf,
    /// Object type.
    pub file_type: FileType,
    /// Length in bytes (0 for directories).
    pub len: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time.
    pub accessed: SystemTime,
}

impl FileStatus {
    /// Final path component, or `/` for the root.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ROOT_PATH.to_string())
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Attributes reported to the protocol layer by `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stat {
    /// Object type.
    pub file_type: FileType,
    /// Unix mode: type bits plus [`ALL_ACCESS`].
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
    /// Stable file id derived from the handle.
    pub fileid: u64,
    /// Last access time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub accessed: SystemTime,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
}

impl Stat {
    /// Synthesize protocol attributes for `node` from a store status.
    pub fn from_status(node: &Node, status: &FileStatus) -> Self {
        Self {
            file_type: status.file_type,
            mode: status.file_type.mode_bits() | ALL_ACCESS,
            size: status.len,
            fileid: node.fileid(),
            accessed: status.accessed,
            modified: status.modified,
        }
    }

    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Filesystem-wide capacity figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FsStat {
    /// Total size in bytes.
    pub total_bytes: u64,
    /// Free bytes.
    pub free_bytes: u64,
    /// Total number of objects.
    pub total_files: u64,
    /// Number of objects that can still be created.
    pub free_files: u64,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry (final component only).
    pub name: String,
    /// Node for the entry.
    pub node: Node,
}

/// Owner and mode requested by `create`/`mkdir`. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateAttrs {
    /// Requested owner uid.
    pub uid: u32,
    /// Requested group gid.
    pub gid: u32,
    /// Requested permission bits.
    pub mode: u32,
}

/// Attribute changes requested by the protocol layer.
///
/// Accepted and discarded: the store's metadata is not mutable through the
/// adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetAttr {
    /// New owner uid.
    pub uid: Option<u32>,
    /// New group gid.
    pub gid: Option<u32>,
    /// New permission bits.
    pub mode: Option<u32>,
    /// New size.
    pub size: Option<u64>,
    /// New access time.
    pub accessed: Option<SystemTime>,
    /// New modification time.
    pub modified: Option<SystemTime>,
}

#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
