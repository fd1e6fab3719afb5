//! DecisionHandler (`spec.md` §3.2, §4.4, §9): append-only — Add is the
//! only operation. Freezes the resolved Consideration's back-reference
//! within the same exclusive-lock envelope that creates the Decision,
//! acquiring both directory locks in canonical (lexicographic) order:
//! `considerations` before `decisions`.

use std::path::PathBuf;
use std::time::Duration;

use jiff::Timestamp;

use crate::bus::{ChangeBus, Operation};
use crate::codec::{check_schema_version, Record};
use crate::error::{Result, ZeusError};
use crate::id;
use crate::model::{Consideration, Decision, Entity, Kind, PeerResolver};
use crate::store::file::{FileStore, LockMode};

#[derive(Clone)]
pub struct DecisionHandler {
    store: FileStore,
    bus: ChangeBus,
    timeout: Duration,
}

impl DecisionHandler {
    #[must_use]
    pub fn new(store: FileStore, bus: ChangeBus, timeout: Duration) -> Self {
        Self { store, bus, timeout }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        title: String,
        consideration_id: String,
        selected_option_id: String,
        selected_title: String,
        rationale: String,
        resolver: &dyn PeerResolver,
    ) -> Result<Decision> {
        let considerations_dir = PathBuf::from(Kind::Consideration.storage_name());
        let decisions_dir = PathBuf::from(Kind::Decision.storage_name());
        self.store.with_locks(
            vec![considerations_dir.clone(), decisions_dir.clone()],
            LockMode::Exclusive,
            self.timeout,
            || {
                let consideration_path = considerations_dir.join(&consideration_id);
                if !self.store.exists(&consideration_path) {
                    return Err(ZeusError::NotFound {
                        kind: Kind::Consideration,
                        id: consideration_id.clone(),
                    });
                }
                let text = self.store.read_to_string(&consideration_path)?;
                let record = Record::from_text(&text, &consideration_path)?;
                check_schema_version(&record, &consideration_path)?;
                let mut consideration = Consideration::from_record(&record, &consideration_path)?;

                let new_id = id::next_id(&self.store, &decisions_dir, Kind::Decision.id_prefix())?;
                let now = Timestamp::now();
                let decision = Decision::new(
                    new_id.clone(),
                    title,
                    consideration_id.clone(),
                    selected_option_id,
                    selected_title,
                    rationale,
                    now,
                );
                decision.validate(resolver)?;

                consideration.freeze_decision(new_id.clone())?;
                consideration.envelope.updated_at = now;
                self.store
                    .write(&consideration_path, consideration.to_record().to_text().as_bytes())?;

                let decision_path = decisions_dir.join(&new_id);
                self.store.write(&decision_path, decision.to_record().to_text().as_bytes())?;

                self.bus.publish(Kind::Decision, new_id.clone(), Operation::Add, now);
                self.bus.publish(Kind::Consideration, consideration_id, Operation::Update, now);
                Ok(decision)
            },
        )
    }

    pub fn get(&self, decision_id: &str) -> Result<Decision> {
        let dir = PathBuf::from(Kind::Decision.storage_name());
        let path = dir.join(decision_id);
        self.store.with_lock(&dir, LockMode::Shared, self.timeout, || {
            if !self.store.exists(&path) {
                return Err(ZeusError::NotFound {
                    kind: Kind::Decision,
                    id: decision_id.to_string(),
                });
            }
            let text = self.store.read_to_string(&path)?;
            let record = Record::from_text(&text, &path)?;
            check_schema_version(&record, &path)?;
            Decision::from_record(&record, &path)
        })
    }

    pub fn list(&self) -> Result<Vec<Decision>> {
        let dir = PathBuf::from(Kind::Decision.storage_name());
        self.store.with_lock(&dir, LockMode::Shared, self.timeout, || {
            let names = self.store.list(&dir)?;
            names
                .iter()
                .map(|name| {
                    let path = dir.join(name);
                    let text = self.store.read_to_string(&path)?;
                    let record = Record::from_text(&text, &path)?;
                    check_schema_version(&record, &path)?;
                    Decision::from_record(&record, &path)
                })
                .collect()
        })
    }

    /// Always fails: Decisions are append-only (`spec.md` §4.4).
    pub fn update(&self, decision_id: &str, _patch: &Record) -> Result<Decision> {
        Err(ZeusError::Immutable {
            kind: Kind::Decision,
            id: decision_id.to_string(),
        })
    }

    /// Always fails: Decisions are append-only (`spec.md` §4.4).
    pub fn delete(&self, decision_id: &str) -> Result<()> {
        Err(ZeusError::Immutable {
            kind: Kind::Decision,
            id: decision_id.to_string(),
        })
    }

    pub fn list_references_from(&self, decision_id: &str) -> Result<Vec<(Kind, String)>> {
        Ok(self.get(decision_id)?.references())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsiderationOption;
    use std::path::Path;
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

    fn seeded() -> (TempDir, FileStore, ChangeBus) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let bus = ChangeBus::new(1);
        let now = Timestamp::now();
        let consideration = Consideration::new(
            "con-001".into(),
            "Pick a database".into(),
            vec![ConsiderationOption {
                id: "opt-1".into(),
                title: "Postgres".into(),
                pros: vec!["mature".into()],
                cons: vec![],
            }],
            now,
        );
        store
            .write(Path::new("considerations/con-001"), consideration.to_record().to_text().as_bytes())
            .unwrap();
        (dir, store, bus)
    }

    #[test]
    fn add_freezes_consideration_back_reference() {
        let (_d, store, bus) = seeded();
        let handler = DecisionHandler::new(store.clone(), bus, Duration::from_secs(1));
        let decision = handler
            .add(
                "Pick Postgres".into(),
                "con-001".into(),
                "opt-1".into(),
                "Postgres".into(),
                "Best fit".into(),
                &AlwaysOk,
            )
            .unwrap();
        let text = store.read_to_string(Path::new("considerations/con-001")).unwrap();
        let record = Record::from_text(&text, Path::new("x")).unwrap();
        let consideration = Consideration::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(consideration.decision, Some(decision.envelope.id));
    }

    #[test]
    fn update_and_delete_always_fail() {
        let (_d, store, bus) = seeded();
        let handler = DecisionHandler::new(store, bus, Duration::from_secs(1));
        assert!(matches!(handler.update("dec-001", &Record::new()).unwrap_err(), ZeusError::Immutable { .. }));
        assert!(matches!(handler.delete("dec-001").unwrap_err(), ZeusError::Immutable { .. }));
    }
}
