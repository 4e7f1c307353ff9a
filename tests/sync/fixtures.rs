// Shared helpers for sync tests
// Temporary source/replica trees, snapshots, log capture and a failing filesystem

use foldersync::fs::{DirEntry, EntryKind, Filesystem, LocalFs};
use foldersync::logging::LogHandle;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::Dispatch;

/// A temporary directory holding a `source` and a `replica` folder.
pub struct Trees {
    _dir: TempDir,
    pub root: PathBuf,
    pub source: PathBuf,
    pub replica: PathBuf,
}

impl Trees {
    /// Both folders exist and are empty.
    pub fn new() -> Self {
        let trees = Self::without_replica();
        fs::create_dir(&trees.replica).unwrap();
        trees
    }

    /// The source exists, the replica does not.
    pub fn without_replica() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let source = root.join("source");
        let replica = root.join("replica");
        fs::create_dir(&source).unwrap();
        Self {
            _dir: dir,
            root,
            source,
            replica,
        }
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn mkdir(root: &Path, rel: &str) {
    fs::create_dir_all(root.join(rel)).unwrap();
}

pub fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

/// Every relative path under `root`: `None` for directories, bytes for files.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut entries = BTreeMap::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel) = pending.pop() {
        for entry in fs::read_dir(root.join(&rel)).unwrap() {
            let entry = entry.unwrap();
            let path = rel.join(entry.file_name());
            if entry.file_type().unwrap().is_dir() {
                pending.push(path.clone());
                entries.insert(path, None);
            } else {
                entries.insert(path, Some(fs::read(entry.path()).unwrap()));
            }
        }
    }

    entries
}

/// Log handle whose output can be read back, at the default `info` level.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> LogHandle {
        let buffer = Arc::clone(&self.buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(Arc::clone(&buffer)))
            .finish();
        LogHandle::new(Dispatch::new(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

/// `LocalFs` that fails operations on chosen file names.
#[derive(Default)]
pub struct FaultyFs {
    inner: LocalFs,
    fail_copy: Vec<String>,
    fail_remove: Vec<String>,
    fail_list: Option<String>,
    list_failures_left: AtomicUsize,
}

impl FaultyFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copying a file with this name is denied.
    pub fn fail_copy(mut self, name: &str) -> Self {
        self.fail_copy.push(name.to_string());
        self
    }

    /// Removing an entry with this name is denied.
    pub fn fail_remove(mut self, name: &str) -> Self {
        self.fail_remove.push(name.to_string());
        self
    }

    /// Listing a directory with this name fails `times` times.
    pub fn fail_list(mut self, name: &str, times: usize) -> Self {
        self.fail_list = Some(name.to_string());
        self.list_failures_left = AtomicUsize::new(times);
        self
    }

    fn matches(path: &Path, names: &[String]) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| names.iter().any(|n| n == name))
    }

    fn denied(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, format!("simulated denial: {}", path.display()))
    }
}

impl Filesystem for FaultyFs {
    fn list_dir(&self, dir: &Path, follow_symlinks: bool) -> io::Result<Vec<DirEntry>> {
        if let Some(name) = &self.fail_list {
            if Self::matches(dir, std::slice::from_ref(name))
                && self
                    .list_failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok()
            {
                return Err(Self::denied(dir));
            }
        }
        self.inner.list_dir(dir, follow_symlinks)
    }

    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        self.inner.entry_kind(path)
    }

    fn same_contents(&self, a: &Path, b: &Path) -> io::Result<bool> {
        self.inner.same_contents(a, b)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if Self::matches(from, &self.fail_copy) {
            return Err(Self::denied(from));
        }
        self.inner.copy_file(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if Self::matches(path, &self.fail_remove) {
            return Err(Self::denied(path));
        }
        self.inner.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if Self::matches(path, &self.fail_remove) {
            return Err(Self::denied(path));
        }
        self.inner.remove_dir_all(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }
}
