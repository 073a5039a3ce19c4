//! Drive the adapter the way a protocol server would, over a local directory.
//!
//! Exports the directory given as the first argument, or a fresh temporary
//! directory when none is given, then walks through the handle-based
//! operations an NFS front end issues.
//!
//! Run with: `RUST_LOG=handlefs=debug cargo run --example export_local [DIR]`

use handlefs::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Keep the temp dir alive until the end of main.
    let scratch = tempfile::tempdir()?;
    let dir: PathBuf = match std::env::args_os().nth(1) {
        Some(arg) => std::fs::canonicalize(arg)?,
        None => scratch.path().to_path_buf(),
    };

    // =========================================================================
    // Step 1: Connect
    // =========================================================================

    let endpoint = url::Url::from_directory_path(&dir)
        .map_err(|()| format!("not an absolute directory: {}", dir.display()))?;
    let config = AdapterConfig::new(endpoint.as_str())?.with_read_cache(
        ReadCacheConfig::default()
            .with_max_streams(64)
            .with_idle_timeout(Duration::from_secs(30)),
    );
    let fs = FsAdapter::<dyn BackingStore>::connect(&config)?;
    let root = fs.root();
    println!("exporting {} as {}", dir.display(), root.handle());

    // =========================================================================
    // Step 2: Create and write
    // =========================================================================

    let docs = fs.mkdir(root.handle(), "handlefs-demo", CreateAttrs::default())?;
    let readme = fs.create(
        docs.handle(),
        "README",
        FileType::Regular,
        CreateAttrs::default(),
    )?;
    let written = fs.write(readme.handle(), 0, b"served through 16-byte handles\n")?;
    println!("wrote {written} bytes to {}", readme.path().display());

    // =========================================================================
    // Step 3: Resolve a handle that came back over the wire
    // =========================================================================

    let wire = readme.to_bytes();
    let node = fs.node_from_bytes(&wire)?;
    let stat = fs.stat(node.handle())?;
    println!(
        "{} -> mode {:o}, size {}, fileid {:#x}",
        node.path().display(),
        stat.mode,
        stat.size,
        stat.fileid
    );

    // =========================================================================
    // Step 4: Read through the stream cache
    // =========================================================================

    let head = fs.read(node.handle(), 0, 6)?;
    let tail = fs.read(node.handle(), 6, 1024)?;
    println!(
        "read {:?} + {:?} (cached: {})",
        String::from_utf8_lossy(&head),
        String::from_utf8_lossy(&tail),
        fs.readers().contains(node.path())
    );

    // =========================================================================
    // Step 5: List and clean up
    // =========================================================================

    for entry in fs.list(root.handle())? {
        let kind = fs.node_type(entry.node.handle())?;
        println!("  {:<12} {:?} {}", entry.name, kind, entry.node.handle());
    }

    match fs.rename(root.handle(), "handlefs-demo", root.handle(), "handlefs-renamed") {
        Err(err) => println!("rename: {err} ({:?})", err.kind()),
        Ok(()) => println!("rename unexpectedly succeeded"),
    }

    fs.remove(docs.handle(), "README")?;
    fs.remove(root.handle(), "handlefs-demo")?;
    println!(
        "removed; old handle still known: {}, still present: {}",
        fs.node_of(readme.handle()).is_ok(),
        fs.exists(readme.handle())
    );

    Ok(())
}
