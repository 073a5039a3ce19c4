//! End-to-end behaviour of the adapter over real stores.
//!
//! These tests verify that:
//! 1. Handles form a bijection with paths, including under concurrency
//! 2. Concurrent first reads of one path open the store once
//! 3. Short reads, delete races and unsupported operations behave as documented
//! 4. The same scenarios hold over the in-memory and local-directory stores

use handlefs::*;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// =============================================================================
// Store Wrappers
// =============================================================================

/// Memory store that counts and slows down `open` calls.
///
/// `open_delay` is spent before the object is opened, `open_lag` after, so
/// a lagging open holds a snapshot older than writes made meanwhile.
struct CountingStore {
    inner: MemoryStore,
    opens: AtomicUsize,
    open_delay: Duration,
    open_lag: Duration,
}

impl CountingStore {
    fn new(open_delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            opens: AtomicUsize::new(0),
            open_delay,
            open_lag: Duration::ZERO,
        }
    }

    fn with_open_lag(mut self, lag: Duration) -> Self {
        self.open_lag = lag;
        self
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl StoreRead for CountingStore {
    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        self.inner.exists(path)
    }

    fn status(&self, path: &Path) -> Result<FileStatus, FsError> {
        self.inner.status(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ReadStream>, FsError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.open_delay);
        let stream = self.inner.open(path);
        thread::sleep(self.open_lag);
        stream
    }
}

impl StoreWrite for CountingStore {
    fn create_new_file(&self, path: &Path) -> Result<bool, FsError> {
        self.inner.create_new_file(path)
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, FsError> {
        self.inner.create(path)
    }

    fn delete(&self, path: &Path) -> Result<bool, FsError> {
        self.inner.delete(path)
    }
}

impl StoreDir for CountingStore {
    fn mkdirs(&self, path: &Path) -> Result<bool, FsError> {
        self.inner.mkdirs(path)
    }

    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>, FsError> {
        self.inner.list_status(path)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn memory_adapter() -> FsAdapter<MemoryStore> {
    FsAdapter::new(
        Arc::new(MemoryStore::new()),
        Arc::new(HandleRegistry::new()),
        &ReadCacheConfig::default(),
    )
}

fn local_adapter() -> (tempfile::TempDir, FsAdapter<LocalStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    let fs = FsAdapter::new(
        Arc::new(store),
        Arc::new(HandleRegistry::new()),
        &ReadCacheConfig::default(),
    );
    (dir, fs)
}

fn new_file<S: BackingStore + ?Sized>(fs: &FsAdapter<S>, name: &str) -> Node {
    fs.create(
        fs.root().handle(),
        name,
        FileType::Regular,
        CreateAttrs::default(),
    )
    .unwrap()
}

// =============================================================================
// Registry Properties
// =============================================================================

#[test]
fn handle_path_bijection() {
    let registry = HandleRegistry::new();
    let paths: Vec<PathBuf> = (0..200)
        .map(|i| PathBuf::from(format!("/dir{}/file{}", i % 7, i)))
        .collect();

    let handles: Vec<FileHandle> = paths.iter().map(|p| registry.handle_for(p)).collect();
    for (path, handle) in paths.iter().zip(&handles) {
        assert_eq!(&registry.path_for(*handle).unwrap(), path);
    }
    let distinct: HashSet<_> = handles.iter().collect();
    assert_eq!(distinct.len(), paths.len());
}

#[test]
fn concurrent_lookups_share_one_handle() {
    let fs = Arc::new(memory_adapter());
    // Created behind the adapter's back, so no handle exists yet.
    fs.store().create_new_file(Path::new("/fresh.txt")).unwrap();

    let barrier = Arc::new(Barrier::new(12));
    let threads: Vec<_> = (0..12)
        .map(|_| {
            let fs = Arc::clone(&fs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fs.lookup(fs.root().handle(), "fresh.txt").unwrap()
            })
        })
        .collect();

    let nodes: HashSet<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    assert_eq!(nodes.len(), 1);
}

#[test]
fn two_adapters_sharing_a_registry_agree() {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(HandleRegistry::new());
    let a = FsAdapter::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        &ReadCacheConfig::default(),
    );
    let b = FsAdapter::new(store, registry, &ReadCacheConfig::default());

    let node = new_file(&a, "x");
    assert_eq!(b.node_from_bytes(&node.to_bytes()).unwrap(), node);
    assert_eq!(b.lookup(b.root().handle(), "x").unwrap(), node);
}

// =============================================================================
// Stream Cache Properties
// =============================================================================

#[test]
fn concurrent_first_reads_open_once() {
    let store = Arc::new(CountingStore::new(Duration::from_millis(50)));
    let fs = Arc::new(FsAdapter::new(
        Arc::clone(&store),
        Arc::new(HandleRegistry::new()),
        &ReadCacheConfig::default(),
    ));
    let node = new_file(&*fs, "big.bin");
    fs.write(node.handle(), 0, b"0123456789abcdef").unwrap();

    let barrier = Arc::new(Barrier::new(10));
    let threads: Vec<_> = (0..10u64)
        .map(|i| {
            let fs = Arc::clone(&fs);
            let barrier = Arc::clone(&barrier);
            let handle = node.handle();
            thread::spawn(move || {
                barrier.wait();
                (i, fs.read(handle, i, 4).unwrap())
            })
        })
        .collect();

    let data = b"0123456789abcdef";
    for t in threads {
        let (i, bytes) = t.join().unwrap();
        let start = i as usize;
        assert_eq!(bytes, &data[start..start + 4]);
    }
    assert_eq!(store.opens(), 1);
}

#[test]
fn read_after_write_sees_new_content_despite_racing_open() {
    let store = Arc::new(
        CountingStore::new(Duration::ZERO).with_open_lag(Duration::from_millis(200)),
    );
    let fs = Arc::new(FsAdapter::new(
        Arc::clone(&store),
        Arc::new(HandleRegistry::new()),
        &ReadCacheConfig::default(),
    ));
    let node = new_file(&*fs, "racy.txt");
    fs.write(node.handle(), 0, b"old").unwrap();

    let reader = {
        let fs = Arc::clone(&fs);
        let handle = node.handle();
        thread::spawn(move || fs.read(handle, 0, 16).unwrap())
    };
    // Land the write while the reader's open still holds the old snapshot.
    thread::sleep(Duration::from_millis(50));
    fs.write(node.handle(), 0, b"new").unwrap();
    reader.join().unwrap();

    assert_eq!(fs.read(node.handle(), 0, 16).unwrap(), b"new");
    assert_eq!(fs.read(node.handle(), 0, 16).unwrap(), b"new");
}

#[test]
fn bounded_cache_still_serves_reads() {
    let fs = FsAdapter::new(
        Arc::new(MemoryStore::new()),
        Arc::new(HandleRegistry::new()),
        &ReadCacheConfig::unbounded().with_max_streams(2),
    );
    let nodes: Vec<_> = (0..6).map(|i| new_file(&fs, &format!("f{i}"))).collect();
    for (i, node) in nodes.iter().enumerate() {
        fs.write(node.handle(), 0, format!("content-{i}").as_bytes())
            .unwrap();
    }
    for _ in 0..3 {
        for (i, node) in nodes.iter().enumerate() {
            let expected = format!("content-{i}");
            assert_eq!(fs.read(node.handle(), 0, 64).unwrap(), expected.as_bytes());
        }
        fs.readers().run_pending_evictions();
    }
}

// =============================================================================
// Read Bounds and Races
// =============================================================================

#[test]
fn read_past_end_is_short_not_an_error() {
    let fs = memory_adapter();
    let node = new_file(&fs, "a");
    fs.write(node.handle(), 0, b"abc").unwrap();

    assert_eq!(fs.read(node.handle(), 1, 10).unwrap(), b"bc");
    assert!(fs.read(node.handle(), 3, 10).unwrap().is_empty());
    assert!(fs.read(node.handle(), 1_000, 10).unwrap().is_empty());
}

#[test]
fn delete_between_lookup_and_read_is_not_found() {
    let fs = memory_adapter();
    let node = new_file(&fs, "doomed");
    fs.write(node.handle(), 0, b"bytes").unwrap();

    let found = fs.lookup(fs.root().handle(), "doomed").unwrap();
    assert!(fs.store().delete(Path::new("/doomed")).unwrap());

    let err = fs.read(found.handle(), 0, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn removal_through_another_adapter_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(HandleRegistry::new());
    let a = FsAdapter::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        &ReadCacheConfig::default(),
    );
    let b = FsAdapter::new(store, registry, &ReadCacheConfig::default());

    let node = new_file(&a, "shared");
    a.write(node.handle(), 0, b"secret").unwrap();
    assert_eq!(b.read(node.handle(), 0, 6).unwrap(), b"secret");

    let found = b.lookup(b.root().handle(), "shared").unwrap();
    assert!(a.remove(a.root().handle(), "shared").unwrap());
    assert_eq!(
        b.read(found.handle(), 0, 6).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn list_of_vanished_directory_is_not_found() {
    let fs = memory_adapter();
    let dir = fs
        .mkdir(fs.root().handle(), "gone", CreateAttrs::default())
        .unwrap();
    assert!(fs.remove(fs.root().handle(), "gone").unwrap());
    assert_eq!(fs.list(dir.handle()).unwrap_err().kind(), ErrorKind::NotFound);
}

// =============================================================================
// Unsupported Surface
// =============================================================================

#[test]
fn unsupported_operations_always_fail() {
    let fs = memory_adapter();
    let root = fs.root().handle();
    let file = new_file(&fs, "f").handle();
    let stale = FileHandle::from_words(u64::MAX, 1);

    for handle in [root, file, stale] {
        assert_eq!(fs.read_link(handle).unwrap_err().kind(), ErrorKind::NotSupported);
        assert_eq!(
            fs.symlink(handle, "l", "target", CreateAttrs::default())
                .unwrap_err()
                .kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            fs.hard_link(handle, file, "h").unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            fs.rename(handle, "f", root, "g").unwrap_err().kind(),
            ErrorKind::NotSupported
        );
    }
    // Nothing changed.
    assert_eq!(fs.list(root).unwrap().len(), 1);
}

// =============================================================================
// Scenarios (both stores)
// =============================================================================

fn create_then_stat<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let node = new_file(fs, "a.txt");
    let stat = fs.stat(node.handle()).unwrap();
    assert_eq!(stat.size, 0);
    assert_eq!(stat.file_type, FileType::Regular);
    assert_eq!(stat.mode, S_IFREG | ALL_ACCESS);
    assert_eq!(stat.fileid, node.fileid());
}

fn list_empty_root<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    assert!(fs.list(fs.root().handle()).unwrap().is_empty());
}

fn write_then_read_back<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let node = new_file(fs, "hello.txt");
    assert_eq!(fs.write(node.handle(), 0, b"hello").unwrap(), 5);
    assert!(!fs.readers().contains(node.path()));
    assert_eq!(fs.read(node.handle(), 0, 5).unwrap(), b"hello");
    assert_eq!(fs.stat(node.handle()).unwrap().size, 5);
}

fn remove_nonexistent<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    assert!(!fs.remove(fs.root().handle(), "missing").unwrap());
}

fn remove_non_empty_directory<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let dir = fs
        .mkdir(fs.root().handle(), "full", CreateAttrs::default())
        .unwrap();
    fs.create(dir.handle(), "f", FileType::Regular, CreateAttrs::default())
        .unwrap();
    assert!(!fs.remove(fs.root().handle(), "full").unwrap());
    assert!(fs.remove(dir.handle(), "f").unwrap());
    assert!(fs.remove(fs.root().handle(), "full").unwrap());
}

fn write_offset_is_not_random_access<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let node = new_file(fs, "offset.txt");
    fs.write(node.handle(), 0, b"abcdef").unwrap();
    assert_eq!(fs.write(node.handle(), 3, b"XY").unwrap(), 2);
    // The store rewrites from the start; the earlier bytes are gone.
    assert_eq!(fs.read(node.handle(), 0, 16).unwrap(), b"XY");
}

fn warm_read_then_delete_is_not_found<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let node = new_file(fs, "doomed");
    fs.write(node.handle(), 0, b"bytes").unwrap();
    assert_eq!(fs.read(node.handle(), 0, 5).unwrap(), b"bytes");
    assert!(fs.readers().contains(node.path()));

    let found = fs.lookup(fs.root().handle(), "doomed").unwrap();
    assert!(fs.store().delete(Path::new("/doomed")).unwrap());

    let err = fs.read(found.handle(), 0, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

fn nested_directories<S: BackingStore + ?Sized>(fs: &FsAdapter<S>) {
    let a = fs
        .mkdir(fs.root().handle(), "a", CreateAttrs::default())
        .unwrap();
    let b = fs.mkdir(a.handle(), "b", CreateAttrs::default()).unwrap();
    let f = fs
        .create(b.handle(), "f", FileType::Regular, CreateAttrs::default())
        .unwrap();
    assert_eq!(f.path(), Path::new("/a/b/f"));
    assert_eq!(fs.parent_of(f.handle()).unwrap(), b);
    assert_eq!(fs.node_type(b.handle()).unwrap(), FileType::Directory);
    assert_eq!(fs.node_type(f.handle()).unwrap(), FileType::Regular);

    let names: Vec<_> = fs
        .list(a.handle())
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["b"]);
}

macro_rules! scenarios {
    ($($name:ident),* $(,)?) => {
        mod memory_store {
            use super::*;
            $(
                #[test]
                fn $name() {
                    super::$name(&memory_adapter());
                }
            )*
        }

        mod local_store {
            use super::*;
            $(
                #[test]
                fn $name() {
                    let (_dir, fs) = local_adapter();
                    super::$name(&fs);
                }
            )*
        }
    };
}

scenarios!(
    create_then_stat,
    list_empty_root,
    write_then_read_back,
    remove_nonexistent,
    remove_non_empty_directory,
    write_offset_is_not_random_access,
    warm_read_then_delete_is_not_found,
    nested_directories,
);

// =============================================================================
// Endpoint Configuration
// =============================================================================

#[test]
fn connect_through_file_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("existing.txt"), b"on disk").unwrap();

    let uri = url::Url::from_directory_path(dir.path()).unwrap();
    let config = AdapterConfig::new(uri.as_str())
        .unwrap()
        .with_read_cache(ReadCacheConfig::unbounded());
    let fs = FsAdapter::<dyn BackingStore>::connect(&config).unwrap();

    let node = fs.lookup(fs.root().handle(), "existing.txt").unwrap();
    assert_eq!(fs.read(node.handle(), 3, 100).unwrap(), b"disk");
}

#[test]
fn connect_to_unknown_scheme_is_unsupported() {
    let config = AdapterConfig::new("hdfs://localhost:9000").unwrap();
    let err = FsAdapter::<dyn BackingStore>::connect(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}
