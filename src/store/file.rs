//! FileStore (`spec.md` §4.1, C1): the only component that touches disk.
//!
//! Every other component addresses files and directories through logical
//! paths relative to a project root; `FileStore` normalizes, locks, and
//! performs the actual I/O. Locking is an in-process advisory registry
//! keyed by normalized logical path — sufficient for the "parallel threads
//! of control within this tool's own processes" concurrency model fixed by
//! `spec.md` §5; it is not a cross-process file lock.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, ZeusError};

/// Whether a `WithLock` acquisition is for reading (shared) or writing
/// (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Default lock-acquisition deadline (`spec.md` §5): thirty seconds.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A single path's advisory lock state: a reader count and an exclusive
/// flag, guarded by a `Mutex` + condvar-free poll loop (locks are held for
/// the duration of a handler call, not hot-looped, so polling is fine).
#[derive(Default)]
struct PathLock {
    readers: u32,
    writer: bool,
}

/// The per-path lock registry. Cloned handles share the same table.
#[derive(Clone, Default)]
struct LockTable {
    inner: Arc<Mutex<HashMap<PathBuf, PathLock>>>,
}

impl LockTable {
    fn acquire(&self, path: &Path, mode: LockMode, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut table = self.inner.lock().expect("lock table poisoned");
                let entry = table.entry(path.to_path_buf()).or_default();
                match mode {
                    LockMode::Shared if !entry.writer => {
                        entry.readers += 1;
                        return Ok(());
                    }
                    LockMode::Exclusive if !entry.writer && entry.readers == 0 => {
                        entry.writer = true;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            if Instant::now() >= deadline {
                return Err(ZeusError::Timeout {
                    path: path.display().to_string(),
                });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn release(&self, path: &Path, mode: LockMode) {
        let mut table = self.inner.lock().expect("lock table poisoned");
        if let Some(entry) = table.get_mut(path) {
            match mode {
                LockMode::Shared => entry.readers = entry.readers.saturating_sub(1),
                LockMode::Exclusive => entry.writer = false,
            }
        }
    }
}

/// A held lock, released on drop so every exit path (including panics from
/// the guarded closure and cancellation) releases it.
struct LockGuard<'a> {
    table: &'a LockTable,
    path: PathBuf,
    mode: LockMode,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.path, self.mode);
    }
}

/// Path-safe, atomic read/write of text-serialized records, with a per-path
/// advisory lock registry.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    locks: LockTable,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ZeusError::io(&root, e))?;
        Ok(Self {
            root,
            locks: LockTable::default(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalizes a logical path and rejects it if it escapes the root,
    /// or contains null bytes, control characters, or parent-directory
    /// components. This is the only layer enforcing path safety.
    fn resolve(&self, logical: &Path) -> Result<PathBuf> {
        let raw = logical.to_string_lossy();
        if raw.contains('\0') || raw.chars().any(|c| c.is_control() && c != '\n') {
            return Err(ZeusError::UnsafePath(raw.into_owned()));
        }
        let mut normalized = PathBuf::new();
        for component in logical.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ZeusError::UnsafePath(raw.into_owned()));
                }
            }
        }
        Ok(self.root.join(normalized))
    }

    /// Returns the file contents, or a distinct "not found" error via `Io`
    /// with `ErrorKind::NotFound` preserved for callers to match on.
    pub fn read(&self, logical: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(logical)?;
        fs::read(&path).map_err(|e| ZeusError::io(path, e))
    }

    pub fn read_to_string(&self, logical: &Path) -> Result<String> {
        let path = self.resolve(logical)?;
        fs::read_to_string(&path).map_err(|e| ZeusError::io(path, e))
    }

    #[must_use]
    pub fn exists(&self, logical: &Path) -> bool {
        self.resolve(logical)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Creates or replaces a file atomically: write to a sibling temp file,
    /// sync, rename. A successful write is durable on return.
    pub fn write(&self, logical: &Path, contents: &[u8]) -> Result<()> {
        let path = self.resolve(logical)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ZeusError::io(parent, e))?;
        }
        let tmp_name = format!(
            ".tmp-{}-{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("record"),
            uuid::Uuid::new_v4()
        );
        let tmp_path = path.with_file_name(tmp_name);
        let mut file = fs::File::create(&tmp_path).map_err(|e| ZeusError::io(&tmp_path, e))?;
        use io::Write as _;
        file.write_all(contents).map_err(|e| ZeusError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| ZeusError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| ZeusError::io(&path, e))?;
        Ok(())
    }

    /// Removes the file; idempotent.
    pub fn delete(&self, logical: &Path) -> Result<()> {
        let path = self.resolve(logical)?;
        match fs::remove_file(&path) {
            Ok(()) | Err(_) if !path.exists() => Ok(()),
            Err(e) => Err(ZeusError::io(path, e)),
        }
    }

    /// Lists entries of a directory in lexicographic order, skipping hidden
    /// files and recovery temp files (`.tmp-*`). Returns an empty list for a
    /// directory that doesn't exist yet.
    pub fn list(&self, logical_dir: &Path) -> Result<Vec<String>> {
        let path = self.resolve(logical_dir)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in ignore::WalkBuilder::new(&path)
            .max_depth(Some(1))
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build()
        {
            let entry = entry.map_err(|e| ZeusError::io(&path, io::Error::other(e)))?;
            if entry.path() == path {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(".tmp-") {
                    continue;
                }
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copies one logical directory tree wholesale to another logical path,
    /// used by `SnapshotManager`. Skips hidden files and recovery temp
    /// files, same as `list`.
    pub fn copy_tree(&self, from_logical: &Path, to_logical: &Path) -> Result<u64> {
        let from = self.resolve(from_logical)?;
        let to = self.resolve(to_logical)?;
        let mut count = 0u64;
        if !from.exists() {
            return Ok(count);
        }
        if from.is_file() {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|e| ZeusError::io(parent, e))?;
            }
            fs::copy(&from, &to).map_err(|e| ZeusError::io(&to, e))?;
            return Ok(1);
        }
        fs::create_dir_all(&to).map_err(|e| ZeusError::io(&to, e))?;
        for entry in ignore::WalkBuilder::new(&from)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build()
        {
            let entry = entry.map_err(|e| ZeusError::io(&from, io::Error::other(e)))?;
            let rel = entry.path().strip_prefix(&from).unwrap_or(entry.path());
            if rel.as_os_str().is_empty() {
                continue;
            }
            let name = entry.file_name().to_str().unwrap_or_default();
            if name.starts_with(".tmp-") {
                continue;
            }
            let dest = to.join(rel);
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                fs::create_dir_all(&dest).map_err(|e| ZeusError::io(&dest, e))?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| ZeusError::io(parent, e))?;
                }
                fs::copy(entry.path(), &dest).map_err(|e| ZeusError::io(&dest, e))?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Acquires a per-path advisory lock, runs `f`, releases on every exit
    /// path (including the closure returning an error or panicking).
    pub fn with_lock<T>(
        &self,
        logical: &Path,
        mode: LockMode,
        timeout: Duration,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.locks.acquire(logical, mode, timeout)?;
        let _guard = LockGuard {
            table: &self.locks,
            path: logical.to_path_buf(),
            mode,
        };
        f()
    }

    /// Acquires locks on multiple logical paths in a single canonical order
    /// (lexicographic by path), so no two callers ever request the same two
    /// locks in opposite order — the deadlock-avoidance rule in `spec.md`
    /// §5/§9. Releases all of them, in reverse order, on exit.
    pub fn with_locks<T>(
        &self,
        mut logical_paths: Vec<PathBuf>,
        mode: LockMode,
        timeout: Duration,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        logical_paths.sort();
        logical_paths.dedup();
        let mut guards = Vec::with_capacity(logical_paths.len());
        for path in &logical_paths {
            self.locks.acquire(path, mode, timeout)?;
            guards.push(LockGuard {
                table: &self.locks,
                path: path.clone(),
                mode,
            });
        }
        let result = f();
        drop(guards);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_d, fs) = store();
        fs.write(Path::new("objectives/obj-001"), b"hello").unwrap();
        assert_eq!(fs.read(Path::new("objectives/obj-001")).unwrap(), b"hello");
    }

    #[test]
    fn rejects_parent_dir_component() {
        let (_d, fs) = store();
        let err = fs.write(Path::new("../escape"), b"x").unwrap_err();
        assert!(matches!(err, ZeusError::UnsafePath(_)));
    }

    #[test]
    fn rejects_null_byte() {
        let (_d, fs) = store();
        let err = fs.write(Path::new("obj\0ective"), b"x").unwrap_err();
        assert!(matches!(err, ZeusError::UnsafePath(_)));
    }

    #[test]
    fn list_is_lexicographic_and_skips_hidden() {
        let (_d, fs) = store();
        fs.write(Path::new("tasks/task-002"), b"b").unwrap();
        fs.write(Path::new("tasks/task-001"), b"a").unwrap();
        fs.write(Path::new("tasks/.hidden"), b"h").unwrap();
        let names = fs.list(Path::new("tasks")).unwrap();
        assert_eq!(names, vec!["task-001".to_string(), "task-002".to_string()]);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let (_d, fs) = store();
        assert!(fs.list(Path::new("nope")).unwrap().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let (_d, fs) = store();
        fs.write(Path::new("tasks/task-001"), b"a").unwrap();
        fs.delete(Path::new("tasks/task-001")).unwrap();
        fs.delete(Path::new("tasks/task-001")).unwrap();
    }

    #[test]
    fn exclusive_lock_blocks_second_exclusive_until_timeout() {
        let (_d, fs) = store();
        let path = Path::new("objectives/obj-001").to_path_buf();
        let fs2 = fs.clone();
        let handle = std::thread::spawn(move || {
            fs2.with_lock(&path, LockMode::Exclusive, Duration::from_millis(200), || {
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            })
        });
        std::thread::sleep(Duration::from_millis(20));
        let err = fs
            .with_lock(
                Path::new("objectives/obj-001"),
                LockMode::Exclusive,
                Duration::from_millis(10),
                || Ok(()),
            )
            .unwrap_err();
        assert!(matches!(err, ZeusError::Timeout { .. }));
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn shared_locks_do_not_block_each_other() {
        let (_d, fs) = store();
        fs.with_lock(Path::new("vision"), LockMode::Shared, Duration::from_secs(1), || {
            fs.with_lock(Path::new("vision"), LockMode::Shared, Duration::from_secs(1), || Ok(()))
        })
        .unwrap();
    }

    #[test]
    fn copy_tree_preserves_contents() {
        let (_d, fs) = store();
        fs.write(Path::new("tasks/task-001"), b"a").unwrap();
        fs.write(Path::new("tasks/task-002"), b"b").unwrap();
        let n = fs.copy_tree(Path::new("tasks"), Path::new("snapshots/s1/tasks")).unwrap();
        assert_eq!(n, 2);
        assert_eq!(fs.read(Path::new("snapshots/s1/tasks/task-001")).unwrap(), b"a");
    }
}
