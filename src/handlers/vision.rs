//! VisionHandler (`spec.md` §3.2, §4.4): Add collapses to "write or
//! overwrite"; the id is fixed.

use std::path::Path;
use std::time::Duration;

use jiff::Timestamp;

use crate::bus::{ChangeBus, Operation};
use crate::codec::{check_schema_version, Record};
use crate::error::{Result, ZeusError};
use crate::model::{Entity, Kind, PeerResolver, Vision};
use crate::store::file::{FileStore, LockMode};

const PATH: &str = "vision";

#[derive(Clone)]
pub struct VisionHandler {
    store: FileStore,
    bus: ChangeBus,
    timeout: Duration,
}

impl VisionHandler {
    #[must_use]
    pub fn new(store: FileStore, bus: ChangeBus, timeout: Duration) -> Self {
        Self { store, bus, timeout }
    }

    /// Writes or overwrites the singleton Vision record.
    pub fn set(&self, title: String, resolver: &dyn PeerResolver) -> Result<Vision> {
        self.store.with_lock(Path::new(PATH), LockMode::Exclusive, self.timeout, || {
            let now = Timestamp::now();
            let created_at = match self.read() {
                Ok(existing) => existing.envelope.created_at,
                Err(ZeusError::NotFound { .. }) => now,
                Err(e) => return Err(e),
            };
            let mut vision = Vision::new(title, created_at);
            vision.envelope.updated_at = now;
            vision.validate(resolver)?;
            self.store.write(Path::new(PATH), vision.to_record().to_text().as_bytes())?;
            self.bus.publish(Kind::Vision, vision.envelope.id.clone(), Operation::Add, now);
            Ok(vision)
        })
    }

    pub fn get(&self) -> Result<Vision> {
        self.store.with_lock(Path::new(PATH), LockMode::Shared, self.timeout, || self.read())
    }

    fn read(&self) -> Result<Vision> {
        if !self.store.exists(Path::new(PATH)) {
            return Err(ZeusError::NotFound {
                kind: Kind::Vision,
                id: "vision".into(),
            });
        }
        let text = self.store.read_to_string(Path::new(PATH))?;
        let record = Record::from_text(&text, Path::new(PATH))?;
        check_schema_version(&record, Path::new(PATH))?;
        Vision::from_record(&record, Path::new(PATH))
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

    #[test]
    fn second_set_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let handler = VisionHandler::new(store, ChangeBus::new(1), Duration::from_secs(1));
        let first = handler.set("Be ambitious".into(), &AlwaysOk).unwrap();
        let second = handler.set("Be very ambitious".into(), &AlwaysOk).unwrap();
        assert_eq!(first.envelope.id, second.envelope.id);
        assert_eq!(second.envelope.title, "Be very ambitious");
        assert_eq!(second.envelope.created_at, first.envelope.created_at);
    }
}
