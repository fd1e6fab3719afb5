//! SnapshotManager (`spec.md` §4.6, C6): point-in-time copies of the whole
//! project tree under `snapshots/<rfc3339>-<label>/`, mirroring the live
//! layout so `restore` is a straight directory swap. A snapshot carries a
//! `manifest.toml` (file count, byte count, created-at, label), written
//! the same way `Config` writes its TOML, alongside the mirrored subtree.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZeusError};
use crate::store::file::{FileStore, LockMode};
use crate::store::INIT_DIRECTORIES;

const SNAPSHOTS_DIR: &str = "snapshots";
const MANIFEST_FILE: &str = "manifest.toml";
const VISION_FILE: &str = "vision";
const CONSTRAINTS_FILE: &str = "constraints";

/// The directories and shared files copied into (and restored from) every
/// snapshot — every `init`-created path except `snapshots` and `approvals`
/// itself (a snapshot is a picture of committed planning state, not of the
/// in-flight approval queue).
fn snapshot_members() -> Vec<&'static str> {
    INIT_DIRECTORIES
        .iter()
        .copied()
        .filter(|d| *d != SNAPSHOTS_DIR && *d != "approvals")
        .chain([VISION_FILE, CONSTRAINTS_FILE])
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub label: String,
    pub created_at: String,
    pub file_count: u64,
    pub byte_count: u64,
}

/// One snapshot directory's identity, parsed back out of its name:
/// `<rfc3339-timestamp>-<label>`.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub name: String,
    pub timestamp: String,
    pub label: String,
    pub manifest: Manifest,
}

#[derive(Clone)]
pub struct SnapshotManager {
    store: FileStore,
    timeout: Duration,
}

impl SnapshotManager {
    #[must_use]
    pub fn new(store: FileStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Copies every live member (directories and shared files) into a new
    /// `snapshots/<timestamp>-<label>` directory, under an exclusive lock
    /// on every member so the snapshot is a consistent point-in-time copy.
    pub fn create(&self, label: &str) -> Result<SnapshotInfo> {
        let members = snapshot_members();
        let lock_paths: Vec<PathBuf> = members.iter().map(PathBuf::from).collect();
        self.store.with_locks(lock_paths, LockMode::Shared, self.timeout, || {
            let timestamp = Timestamp::now().to_string();
            let name = format!("{timestamp}-{label}");
            let snapshot_dir = PathBuf::from(SNAPSHOTS_DIR).join(&name);

            let mut byte_count = 0u64;
            let mut file_count = 0u64;
            for member in &members {
                let from = Path::new(member);
                let to = snapshot_dir.join(member);
                let copied = self.store.copy_tree(from, &to)?;
                file_count += copied;
                byte_count += self.tree_bytes(&to)?;
            }

            let manifest = Manifest {
                label: label.to_string(),
                created_at: timestamp.clone(),
                file_count,
                byte_count,
            };
            let manifest_text = toml::to_string_pretty(&manifest).map_err(|e| ZeusError::Codec {
                path: snapshot_dir.join(MANIFEST_FILE),
                message: format!("failed to serialize {MANIFEST_FILE}: {e}"),
            })?;
            self.store.write(&snapshot_dir.join(MANIFEST_FILE), manifest_text.as_bytes())?;

            Ok(SnapshotInfo {
                name,
                timestamp,
                label: label.to_string(),
                manifest,
            })
        })
    }

    /// Lists every existing snapshot, oldest first (names sort
    /// lexicographically by their rfc3339 prefix).
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        self.store.with_lock(Path::new(SNAPSHOTS_DIR), LockMode::Shared, self.timeout, || {
            let mut names = self.store.list(Path::new(SNAPSHOTS_DIR))?;
            names.sort();
            names.iter().map(|name| self.read_info(name)).collect()
        })
    }

    fn read_info(&self, name: &str) -> Result<SnapshotInfo> {
        let manifest_path = PathBuf::from(SNAPSHOTS_DIR).join(name).join(MANIFEST_FILE);
        let text = self.store.read_to_string(&manifest_path)?;
        let manifest: Manifest = toml::from_str(&text).map_err(|e| ZeusError::Codec {
            path: manifest_path,
            message: format!("invalid {MANIFEST_FILE}: {e}"),
        })?;
        // The rfc3339 timestamp prefix itself contains hyphens
        // (`2026-07-27T12:34:56Z`), and so can the label (`pre-restore`), so
        // neither end of the name can be split on blindly — the manifest's
        // own `label` is authoritative; strip it off the name as a suffix
        // to recover the timestamp.
        let label = manifest.label.clone();
        let timestamp = name.strip_suffix(&format!("-{label}")).map_or_else(|| name.to_string(), str::to_string);
        Ok(SnapshotInfo {
            name: name.to_string(),
            timestamp,
            label,
            manifest,
        })
    }

    /// Restores the project to the state captured by the snapshot whose
    /// timestamp prefix is `timestamp`, after first taking an automatic
    /// safety snapshot of current state (`spec.md` §4.6 reversibility).
    pub fn restore(&self, timestamp: &str) -> Result<SnapshotInfo> {
        let target_name = self
            .list()?
            .into_iter()
            .find(|s| s.timestamp == timestamp)
            .ok_or_else(|| ZeusError::Codec {
                path: PathBuf::from(SNAPSHOTS_DIR),
                message: format!("no snapshot with timestamp `{timestamp}`"),
            })?
            .name;

        self.create("pre-restore")?;

        let members = snapshot_members();
        let lock_paths: Vec<PathBuf> = members.iter().map(PathBuf::from).collect();
        self.store.with_locks(lock_paths, LockMode::Exclusive, self.timeout, || {
            let snapshot_dir = PathBuf::from(SNAPSHOTS_DIR).join(&target_name);
            for member in &members {
                let from = snapshot_dir.join(member);
                let to = Path::new(member);
                self.store.delete(to)?;
                self.store.copy_tree(&from, to)?;
            }
            Ok(())
        })?;
        self.read_info(&target_name)
    }

    fn tree_bytes(&self, logical: &Path) -> Result<u64> {
        let path = self.store.root().join(logical);
        if path.is_file() {
            return Ok(std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0));
        }
        let mut total = 0u64;
        for entry in ignore::WalkBuilder::new(&path).hidden(true).build().flatten() {
            if entry.file_type().is_some_and(|t| t.is_file()) {
                total += std::fs::metadata(entry.path()).map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_list_round_trips_manifest() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.write(Path::new(VISION_FILE), b"schema: 1\nkind: vision\nid: vision\ntitle: Be ambitious\n").unwrap();
        let manager = SnapshotManager::new(store, Duration::from_secs(1));
        let created = manager.create("before-launch").unwrap();
        assert_eq!(created.label, "before-launch");

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label, "before-launch");
        assert!(listed[0].manifest.file_count >= 1);
    }

    #[test]
    fn restore_brings_back_deleted_state() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.write(Path::new(VISION_FILE), b"schema: 1\nkind: vision\nid: vision\ntitle: Original\n").unwrap();
        let manager = SnapshotManager::new(store.clone(), Duration::from_secs(1));
        let snapshot = manager.create("checkpoint").unwrap();

        store.write(Path::new(VISION_FILE), b"schema: 1\nkind: vision\nid: vision\ntitle: Changed\n").unwrap();
        manager.restore(&snapshot.timestamp).unwrap();

        let text = store.read_to_string(Path::new(VISION_FILE)).unwrap();
        assert!(text.contains("Original"));
    }
}
