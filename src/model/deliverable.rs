//! Deliverable (`spec.md` §3.1): one mandatory reference, an Objective.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverableStatus {
    Planned,
    InProgress,
    Delivered,
    Cancelled,
}

impl StatusEnum for DeliverableStatus {
    const VARIANTS: &'static [Self] = &[Self::Planned, Self::InProgress, Self::Delivered, Self::Cancelled];

    fn canonical(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "planned" => Self::Planned,
            "in_progress" => Self::InProgress,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    fn synonyms() -> &'static [(&'static str, &'static str)] {
        &[("active", "in_progress"), ("done", "delivered")]
    }
}

#[derive(Debug, Clone)]
pub struct Deliverable {
    pub envelope: Envelope,
    pub status: DeliverableStatus,
    pub objective: String,
}

impl Entity for Deliverable {
    const KIND: Kind = Kind::Deliverable;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Deliverable, &self.envelope, self.status.canonical());
        record.set("objective", self.objective.clone());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = DeliverableStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown deliverable status `{status_raw}`"),
        })?;
        let objective = record.require("objective", path)?;
        Ok(Self {
            envelope,
            status,
            objective,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Deliverable,
                message: "title must not be empty".into(),
            });
        }
        if self.objective.is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Deliverable,
                message: "objective is required".into(),
            });
        }
        check_reference(resolver, Kind::Objective, &self.objective)
    }

    fn references(&self) -> Vec<(Kind, String)> {
        vec![(Kind::Objective, self.objective.clone())]
    }

    fn apply_patch(&mut self, patch: &Record) -> Result<()> {
        if let Some(title) = patch.get("title") {
            self.envelope.title = title.to_string();
        }
        if let Some(desc) = patch.get("description") {
            self.envelope.description = Some(desc.to_string());
        }
        if let Some(status_raw) = patch.get("status") {
            self.status = DeliverableStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Deliverable,
                message: format!(
                    "unknown status `{status_raw}`, expected one of: {}",
                    DeliverableStatus::fixed_set()
                ),
            })?;
        }
        if let Some(objective) = patch.get("objective") {
            self.objective = objective.to_string();
        }
        Ok(())
    }
}

impl Deliverable {
    #[must_use]
    pub fn new(id: String, title: String, objective: String, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: DeliverableStatus::Planned,
            objective,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_objective() {
        let now = Timestamp::now();
        let del = Deliverable::new("del-001".into(), "Ship it".into(), "obj-001".into(), now);
        let record = del.to_record();
        let back = Deliverable::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(back.objective, "obj-001");
    }
}
