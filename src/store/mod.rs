//! `Store`: the single entry point every other component is built from —
//! one `FileStore`, the `Handlers` registry, the `ChangeBus`, the
//! `ApprovalQueue`, and the project `Config`, constructed once per process
//! (CLI invocation or dashboard) from a project root.

pub mod file;

use std::path::{Path, PathBuf};

use crate::approval_queue::ApprovalQueue;
use crate::bus::ChangeBus;
use crate::config::Config;
use crate::error::Result;
use crate::handlers::Handlers;
use file::FileStore;

/// Sentinel file marking a directory as a Zeus project root (`spec.md`
/// §6.1, §6.4).
pub const SENTINEL_FILE: &str = ".lock";

/// The directories `init` creates for every directory-per-record kind.
pub const INIT_DIRECTORIES: &[&str] = &[
    "objectives",
    "deliverables",
    "considerations",
    "decisions",
    "problems",
    "risks",
    "assumptions",
    "quality",
    "tasks",
    "approvals",
    "snapshots",
];

#[derive(Clone)]
pub struct Store {
    root: PathBuf,
    files: FileStore,
    bus: ChangeBus,
    pub handlers: Handlers,
    pub approvals: ApprovalQueue,
    pub config: Config,
}

impl Store {
    /// Opens a store at `root`. Does not require `init` to have run —
    /// `Config::load` falls back to defaults and `Handlers`/`FileStore`
    /// create directories lazily on first write.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let files = FileStore::new(&root)?;
        let config = Config::load(&root)?;
        let bus = ChangeBus::new(generation_token());
        let handlers = Handlers::new(files.clone(), bus.clone(), config.lock_timeout());
        let approvals = ApprovalQueue::new(files.clone(), handlers.clone(), bus.clone(), config.lock_timeout(), config.approval_mode);
        Ok(Self {
            root,
            files,
            bus,
            handlers,
            approvals,
            config,
        })
    }

    /// Creates the on-disk project layout: every kind directory, a default
    /// `config.toml`, and the sentinel file (`spec.md` §6.1, §6.2 `init`).
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in INIT_DIRECTORIES {
            std::fs::create_dir_all(root.join(dir)).map_err(|e| crate::error::ZeusError::io(root.join(dir), e))?;
        }
        std::fs::write(root.join(SENTINEL_FILE), b"").map_err(|e| crate::error::ZeusError::io(root.join(SENTINEL_FILE), e))?;
        let config = Config::default();
        config.save(&root)?;
        Self::open(root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    #[must_use]
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Walks up from `start` looking for [`SENTINEL_FILE`], per `spec.md`
    /// §6.4's "derived from the invocation directory" rule.
    #[must_use]
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            if d.join(SENTINEL_FILE).exists() {
                return Some(d.to_path_buf());
            }
            dir = d.parent();
        }
        None
    }
}

/// A process-generation token for `ChangeBus` resume semantics (`spec.md`
/// §5, §6.3): sequence numbers restart at zero across restarts, so
/// subscribers must be able to detect a restart via this token. Derived
/// from the current time at process start, not reused across runs.
fn generation_token() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_every_kind_directory() {
        let dir = TempDir::new().unwrap();
        let _store = Store::init(dir.path()).unwrap();
        for name in INIT_DIRECTORIES {
            assert!(dir.path().join(name).exists(), "missing {name}");
        }
        assert!(dir.path().join(SENTINEL_FILE).exists());
    }

    #[test]
    fn find_root_walks_up_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        Store::init(dir.path()).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(Store::find_root(&nested), Some(dir.path().to_path_buf()));
    }
}
