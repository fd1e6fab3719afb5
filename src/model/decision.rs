//! Decision (`spec.md` §3.2, §9): immutable and append-only — once written,
//! never modified or deleted. Records the selected option, a rationale, and
//! a frozen back-pointer to the Consideration it resolves.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone)]
pub struct Decision {
    pub envelope: Envelope,
    pub consideration: String,
    pub selected_option_id: String,
    pub selected_title: String,
    pub rationale: String,
}

impl Entity for Decision {
    const KIND: Kind = Kind::Decision;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Decision, &self.envelope, "final");
        record.set("consideration", self.consideration.clone());
        record.set("selected_option_id", self.selected_option_id.clone());
        record.set("selected_title", self.selected_title.clone());
        record.set("rationale", self.rationale.clone());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let consideration = record.require("consideration", path)?;
        let selected_option_id = record.require("selected_option_id", path)?;
        let selected_title = record.require("selected_title", path)?;
        let rationale = record.require("rationale", path)?;
        Ok(Self {
            envelope,
            consideration,
            selected_option_id,
            selected_title,
            rationale,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Decision,
                message: "title must not be empty".into(),
            });
        }
        if self.consideration.is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Decision,
                message: "consideration is required".into(),
            });
        }
        if self.selected_option_id.is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Decision,
                message: "selected_option_id is required".into(),
            });
        }
        if self.rationale.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Decision,
                message: "rationale must not be empty".into(),
            });
        }
        check_reference(resolver, Kind::Consideration, &self.consideration)
    }

    fn references(&self) -> Vec<(Kind, String)> {
        vec![(Kind::Consideration, self.consideration.clone())]
    }

    /// Decisions are append-only: any patch is rejected (`spec.md` §3.2,
    /// §4.4 "Update: rejected on Decision").
    fn apply_patch(&mut self, _patch: &Record) -> Result<()> {
        Err(ZeusError::Immutable {
            kind: Kind::Decision,
            id: self.envelope.id.clone(),
        })
    }
}

impl Decision {
    #[must_use]
    pub fn new(
        id: String,
        title: String,
        consideration: String,
        selected_option_id: String,
        selected_title: String,
        rationale: String,
        now: Timestamp,
    ) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            consideration,
            selected_option_id,
            selected_title,
            rationale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPeers;
    impl PeerResolver for NoPeers {
        fn exists(&self, _: Kind, _: &str) -> Result<bool> {
            Ok(true)
        }
        fn kind_of(&self, _: &str) -> Result<Option<Kind>> {
            Ok(None)
        }
    }

    #[test]
    fn patch_is_always_rejected() {
        let now = Timestamp::now();
        let mut d = Decision::new(
            "dec-001".into(),
            "Pick Postgres".into(),
            "con-001".into(),
            "opt-1".into(),
            "Postgres".into(),
            "Best fit for our team".into(),
            now,
        );
        let err = d.apply_patch(&Record::new()).unwrap_err();
        assert!(matches!(err, ZeusError::Immutable { .. }));
    }

    #[test]
    fn round_trip_preserves_fields() {
        let now = Timestamp::now();
        let d = Decision::new(
            "dec-002".into(),
            "Pick Postgres".into(),
            "con-001".into(),
            "opt-1".into(),
            "Postgres".into(),
            "Best fit".into(),
            now,
        );
        let record = d.to_record();
        let back = Decision::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(back.consideration, "con-001");
        assert_eq!(back.selected_option_id, "opt-1");
        d.validate(&NoPeers).unwrap();
    }
}
