//! Constraint (`spec.md` §3.1, §4.4): many records, all living in the single
//! shared file `constraints`. No mandatory references.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStatus {
    Active,
    Retired,
}

impl StatusEnum for ConstraintStatus {
    const VARIANTS: &'static [Self] = &[Self::Active, Self::Retired];

    fn canonical(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Retired => "retired",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "active" => Self::Active,
            "retired" => Self::Retired,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub envelope: Envelope,
    pub status: ConstraintStatus,
}

impl Entity for Constraint {
    const KIND: Kind = Kind::Constraint;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Constraint, &self.envelope, self.status.canonical());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = ConstraintStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown constraint status `{status_raw}`"),
        })?;
        Ok(Self { envelope, status })
    }

    fn validate(&self, _resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Constraint,
                message: "title must not be empty".into(),
            });
        }
        Ok(())
    }

    fn references(&self) -> Vec<(Kind, String)> {
        Vec::new()
    }

    fn apply_patch(&mut self, patch: &Record) -> Result<()> {
        if let Some(title) = patch.get("title") {
            self.envelope.title = title.to_string();
        }
        if let Some(desc) = patch.get("description") {
            self.envelope.description = Some(desc.to_string());
        }
        if let Some(status_raw) = patch.get("status") {
            self.status = ConstraintStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Constraint,
                message: format!(
                    "unknown status `{status_raw}`, expected one of: {}",
                    ConstraintStatus::fixed_set()
                ),
            })?;
        }
        Ok(())
    }
}

impl Constraint {
    #[must_use]
    pub fn new(id: String, title: String, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: ConstraintStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let now = Timestamp::now();
        let c = Constraint::new("constr-001".into(), "No third-party telemetry".into(), now);
        let record = c.to_record();
        let back = Constraint::from_record(&record, Path::new("constraints")).unwrap();
        assert_eq!(back.envelope.id, "constr-001");
        assert_eq!(back.status, ConstraintStatus::Active);
    }
}
