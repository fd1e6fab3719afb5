//! ConstraintHandler (`spec.md` §3.1, §4.4): every Constraint lives in the
//! single shared file `constraints`; operations wrap a read-modify-write of
//! that file under its own exclusive lock. Records are separated by a
//! blank line within the file.

use std::path::Path;
use std::time::Duration;

use jiff::Timestamp;

use crate::bus::{ChangeBus, Operation};
use crate::codec::{check_schema_version, Record};
use crate::error::{Result, ZeusError};
use crate::id;
use crate::model::{Constraint, Entity, Kind, PeerResolver};
use crate::store::file::{FileStore, LockMode};

const PATH: &str = "constraints";

#[derive(Clone)]
pub struct ConstraintHandler {
    store: FileStore,
    bus: ChangeBus,
    timeout: Duration,
}

impl ConstraintHandler {
    #[must_use]
    pub fn new(store: FileStore, bus: ChangeBus, timeout: Duration) -> Self {
        Self { store, bus, timeout }
    }

    fn load_all(&self) -> Result<Vec<Constraint>> {
        if !self.store.exists(Path::new(PATH)) {
            return Ok(Vec::new());
        }
        let text = self.store.read_to_string(Path::new(PATH))?;
        text.split("\n\n")
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let record = Record::from_text(chunk, Path::new(PATH))?;
                check_schema_version(&record, Path::new(PATH))?;
                Constraint::from_record(&record, Path::new(PATH))
            })
            .collect()
    }

    fn save_all(&self, constraints: &[Constraint]) -> Result<()> {
        let text = constraints
            .iter()
            .map(|c| c.to_record().to_text())
            .collect::<Vec<_>>()
            .join("\n");
        self.store.write(Path::new(PATH), text.as_bytes())
    }

    pub fn add(&self, title: String, resolver: &dyn PeerResolver) -> Result<Constraint> {
        self.store.with_lock(Path::new(PATH), LockMode::Exclusive, self.timeout, || {
            let mut constraints = self.load_all()?;
            let new_id = id::next_id_from_ids(constraints.iter().map(|c| c.envelope.id.as_str()), Kind::Constraint.id_prefix());
            let now = Timestamp::now();
            let constraint = Constraint::new(new_id.clone(), title, now);
            constraint.validate(resolver)?;
            constraints.push(constraint.clone());
            self.save_all(&constraints)?;
            self.bus.publish(Kind::Constraint, new_id, Operation::Add, now);
            Ok(constraint)
        })
    }

    pub fn get(&self, constraint_id: &str) -> Result<Constraint> {
        self.store.with_lock(Path::new(PATH), LockMode::Shared, self.timeout, || {
            self.load_all()?
                .into_iter()
                .find(|c| c.envelope.id == constraint_id)
                .ok_or_else(|| ZeusError::NotFound {
                    kind: Kind::Constraint,
                    id: constraint_id.to_string(),
                })
        })
    }

    pub fn list(&self) -> Result<Vec<Constraint>> {
        self.store.with_lock(Path::new(PATH), LockMode::Shared, self.timeout, || self.load_all())
    }

    pub fn update(&self, constraint_id: &str, patch: &Record, resolver: &dyn PeerResolver) -> Result<Constraint> {
        self.store.with_lock(Path::new(PATH), LockMode::Exclusive, self.timeout, || {
            let mut constraints = self.load_all()?;
            let slot = constraints
                .iter_mut()
                .find(|c| c.envelope.id == constraint_id)
                .ok_or_else(|| ZeusError::NotFound {
                    kind: Kind::Constraint,
                    id: constraint_id.to_string(),
                })?;
            slot.apply_patch(patch)?;
            slot.validate(resolver)?;
            slot.envelope.updated_at = Timestamp::now();
            let updated = slot.clone();
            self.save_all(&constraints)?;
            self.bus
                .publish(Kind::Constraint, constraint_id.to_string(), Operation::Update, updated.envelope.updated_at);
            Ok(updated)
        })
    }

    /// Wired per `spec.md` §9(a): gated by the same inbound-reference check
    /// as every other kind, though no CLI command currently exposes it.
    pub fn delete(&self, constraint_id: &str, inbound_refs: impl FnOnce() -> Result<Vec<(Kind, String)>>) -> Result<()> {
        self.store.with_lock(Path::new(PATH), LockMode::Exclusive, self.timeout, || {
            let mut constraints = self.load_all()?;
            let index = constraints
                .iter()
                .position(|c| c.envelope.id == constraint_id)
                .ok_or_else(|| ZeusError::NotFound {
                    kind: Kind::Constraint,
                    id: constraint_id.to_string(),
                })?;
            let refs = inbound_refs()?;
            if !refs.is_empty() {
                let names = refs.iter().map(|(k, i)| format!("{k} {i}")).collect::<Vec<_>>().join(", ");
                return Err(ZeusError::Conflict {
                    message: format!("constraint {constraint_id} is still referenced by {names}"),
                });
            }
            constraints.remove(index);
            self.save_all(&constraints)?;
            self.bus
                .publish(Kind::Constraint, constraint_id.to_string(), Operation::Delete, Timestamp::now());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct AlwaysOk;
    impl PeerResolver for AlwaysOk {
        fn exists(&self, _: Kind, _: &str) -> Result<bool> {
            Ok(true)
        }
        fn kind_of(&self, _: &str) -> Result<Option<Kind>> {
            Ok(None)
        }
    }

    fn handler() -> (TempDir, ConstraintHandler) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, ConstraintHandler::new(store, ChangeBus::new(1), Duration::from_secs(1)))
    }

    #[test]
    fn add_then_list_round_trips_through_shared_file() {
        let (_d, h) = handler();
        h.add("No third-party telemetry".into(), &AlwaysOk).unwrap();
        h.add("Must run offline".into(), &AlwaysOk).unwrap();
        let all = h.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].envelope.id, "constr-001");
        assert_eq!(all[1].envelope.id, "constr-002");
    }

    #[test]
    fn update_preserves_sibling_records() {
        let (_d, h) = handler();
        h.add("First".into(), &AlwaysOk).unwrap();
        let second = h.add("Second".into(), &AlwaysOk).unwrap();
        let mut patch = Record::new();
        patch.set("title", "Second, revised");
        h.update(&second.envelope.id, &patch, &AlwaysOk).unwrap();
        let all = h.list().unwrap();
        assert_eq!(all[0].envelope.title, "First");
        assert_eq!(all[1].envelope.title, "Second, revised");
    }
}
