//! The generic handler (`spec.md` §4.4, C4) shared by the eight entity
//! kinds whose lifecycle is plain Add/Get/List/Update/Delete: Objective,
//! Deliverable, Consideration, Problem, Risk, Assumption, Quality, Task.
//! Vision, Constraint, and Decision have genuinely different lifecycles
//! (singleton, shared-file, append-only) and get their own small handlers
//! instead of being forced into this one.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use jiff::Timestamp;

use crate::bus::{ChangeBus, Operation};
use crate::codec::{check_schema_version, Record};
use crate::error::{Result, ZeusError};
use crate::id;
use crate::model::{Entity, Kind, PeerResolver};
use crate::store::file::{FileStore, LockMode};

#[derive(Clone)]
pub struct Handler<E: Entity> {
    store: FileStore,
    bus: ChangeBus,
    timeout: Duration,
    _marker: PhantomData<E>,
}

impl<E: Entity> Handler<E> {
    pub fn new(store: FileStore, bus: ChangeBus, timeout: Duration) -> Self {
        Self {
            store,
            bus,
            timeout,
            _marker: PhantomData,
        }
    }

    fn dir(&self) -> PathBuf {
        PathBuf::from(E::KIND.storage_name())
    }

    /// Mints an id under the directory's exclusive lock, constructs the
    /// entity via `build`, validates, writes, and publishes — all within
    /// the same lock so minting and writing are atomic.
    pub fn add(&self, build: impl FnOnce(String, Timestamp) -> E, resolver: &dyn PeerResolver) -> Result<E> {
        let dir = self.dir();
        self.store.with_lock(&dir, LockMode::Exclusive, self.timeout, || {
            let new_id = id::next_id(&self.store, &dir, E::KIND.id_prefix())?;
            let now = Timestamp::now();
            let entity = build(new_id.clone(), now);
            entity.validate(resolver)?;
            let path = dir.join(&new_id);
            self.store.write(&path, entity.to_record().to_text().as_bytes())?;
            self.bus.publish(E::KIND, new_id, Operation::Add, now);
            Ok(entity)
        })
    }

    pub fn get(&self, entity_id: &str) -> Result<E> {
        let dir = self.dir();
        let path = dir.join(entity_id);
        self.store.with_lock(&dir, LockMode::Shared, self.timeout, || self.read_at(&path))
    }

    fn read_at(&self, path: &std::path::Path) -> Result<E> {
        if !self.store.exists(path) {
            return Err(ZeusError::NotFound {
                kind: E::KIND,
                id: path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string(),
            });
        }
        let text = self.store.read_to_string(path)?;
        let record = Record::from_text(&text, path)?;
        check_schema_version(&record, path)?;
        E::from_record(&record, path)
    }

    /// Records in insertion order, approximated by lexicographic filename
    /// order — stable since ids are minted monotonically with a fixed
    /// zero-padding width per `spec.md` §4.3.
    pub fn list(&self) -> Result<Vec<E>> {
        let dir = self.dir();
        self.store.with_lock(&dir, LockMode::Shared, self.timeout, || {
            let names = self.store.list(&dir)?;
            names.iter().map(|name| self.read_at(&dir.join(name))).collect()
        })
    }

    /// Whole-record replace with merge: fields present in `patch`
    /// overwrite, fields absent preserve (`spec.md` §4.4).
    pub fn update(&self, entity_id: &str, patch: &Record, resolver: &dyn PeerResolver) -> Result<E> {
        let dir = self.dir();
        let path = dir.join(entity_id);
        self.store.with_lock(&dir, LockMode::Exclusive, self.timeout, || {
            let mut entity = self.read_at(&path)?;
            entity.apply_patch(patch)?;
            entity.validate(resolver)?;
            let now = Timestamp::now();
            entity.envelope_mut().updated_at = now;
            self.store.write(&path, entity.to_record().to_text().as_bytes())?;
            self.bus.publish(E::KIND, entity_id.to_string(), Operation::Update, now);
            Ok(entity)
        })
    }

    /// Deletes the entity, rejecting the operation if `inbound_refs`
    /// reports any referrer still pointing at it (`spec.md` §3.2, §4.4).
    pub fn delete(&self, entity_id: &str, inbound_refs: impl FnOnce() -> Result<Vec<(Kind, String)>>) -> Result<()> {
        let dir = self.dir();
        let path = dir.join(entity_id);
        self.store.with_lock(&dir, LockMode::Exclusive, self.timeout, || {
            if !self.store.exists(&path) {
                return Err(ZeusError::NotFound {
                    kind: E::KIND,
                    id: entity_id.to_string(),
                });
            }
            let refs = inbound_refs()?;
            if !refs.is_empty() {
                let names = refs.iter().map(|(k, i)| format!("{k} {i}")).collect::<Vec<_>>().join(", ");
                return Err(ZeusError::Conflict {
                    message: format!("{} {entity_id} is still referenced by {names}", E::KIND),
                });
            }
            self.store.delete(&path)?;
            self.bus.publish(E::KIND, entity_id.to_string(), Operation::Delete, Timestamp::now());
            Ok(())
        })
    }

    pub fn list_references_from(&self, entity_id: &str) -> Result<Vec<(Kind, String)>> {
        Ok(self.get(entity_id)?.references())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Objective, ObjectiveStatus};
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

    fn handler() -> (TempDir, Handler<Objective>) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let bus = ChangeBus::new(1);
        (dir, Handler::new(store, bus, Duration::from_secs(1)))
    }

    #[test]
    fn add_mints_sequential_ids() {
        let (_d, h) = handler();
        let a = h.add(|id, now| Objective::new(id, "First".into(), now), &AlwaysOk).unwrap();
        let b = h.add(|id, now| Objective::new(id, "Second".into(), now), &AlwaysOk).unwrap();
        assert_eq!(a.envelope.id, "obj-001");
        assert_eq!(b.envelope.id, "obj-002");
    }

    #[test]
    fn update_merges_fields_and_bumps_updated_at() {
        let (_d, h) = handler();
        let created = h.add(|id, now| Objective::new(id, "First".into(), now), &AlwaysOk).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let mut patch = Record::new();
        patch.set("status", "active");
        let updated = h.update(&created.envelope.id, &patch, &AlwaysOk).unwrap();
        assert_eq!(updated.status, ObjectiveStatus::Active);
        assert!(updated.envelope.updated_at > created.envelope.updated_at);
    }

    #[test]
    fn delete_rejected_when_referenced() {
        let (_d, h) = handler();
        let created = h.add(|id, now| Objective::new(id, "First".into(), now), &AlwaysOk).unwrap();
        let id = created.envelope.id.clone();
        let err = h
            .delete(&id, || Ok(vec![(Kind::Deliverable, "del-001".into())]))
            .unwrap_err();
        assert!(matches!(err, ZeusError::Conflict { .. }));
    }

    #[test]
    fn delete_succeeds_with_no_referrers() {
        let (_d, h) = handler();
        let created = h.add(|id, now| Objective::new(id, "First".into(), now), &AlwaysOk).unwrap();
        h.delete(&created.envelope.id, || Ok(Vec::new())).unwrap();
        assert!(h.get(&created.envelope.id).is_err());
    }
}
