//! Objective (`spec.md` §3.1, §3.2): may reference a parent Objective; the
//! parent graph must be acyclic (checked by `IntegrityChecker`, not here —
//! a single Add/Update can't see the whole graph).

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, parse_timestamp, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveStatus {
    Proposed,
    Active,
    Blocked,
    Done,
    Cancelled,
}

impl StatusEnum for ObjectiveStatus {
    const VARIANTS: &'static [Self] = &[
        Self::Proposed,
        Self::Active,
        Self::Blocked,
        Self::Done,
        Self::Cancelled,
    ];

    fn canonical(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "proposed" => Self::Proposed,
            "active" => Self::Active,
            "blocked" => Self::Blocked,
            "done" => Self::Done,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    fn synonyms() -> &'static [(&'static str, &'static str)] {
        &[("in_progress", "active"), ("complete", "done")]
    }
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub envelope: Envelope,
    pub status: ObjectiveStatus,
    pub parent: Option<String>,
    pub wbs: Option<String>,
}

impl Entity for Objective {
    const KIND: Kind = Kind::Objective;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Objective, &self.envelope, self.status.canonical());
        if let Some(parent) = &self.parent {
            record.set("parent", parent.clone());
        }
        if let Some(wbs) = &self.wbs {
            record.set("wbs", wbs.clone());
        }
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = ObjectiveStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown objective status `{status_raw}`"),
        })?;
        let parent = record.get("parent").map(str::to_string).filter(|s| !s.is_empty());
        let wbs = record.get("wbs").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            parent,
            wbs,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Objective,
                message: "title must not be empty".into(),
            });
        }
        if let Some(parent) = &self.parent {
            if parent == &self.envelope.id {
                return Err(ZeusError::Conflict {
                    message: format!("objective {} cannot be its own parent", self.envelope.id),
                });
            }
            check_reference(resolver, Kind::Objective, parent)?;
        }
        Ok(())
    }

    fn references(&self) -> Vec<(Kind, String)> {
        self.parent
            .clone()
            .map(|p| vec![(Kind::Objective, p)])
            .unwrap_or_default()
    }

    fn apply_patch(&mut self, patch: &Record) -> Result<()> {
        if let Some(title) = patch.get("title") {
            self.envelope.title = title.to_string();
        }
        if let Some(desc) = patch.get("description") {
            self.envelope.description = Some(desc.to_string());
        }
        if let Some(status_raw) = patch.get("status") {
            self.status = ObjectiveStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Objective,
                message: format!(
                    "unknown status `{status_raw}`, expected one of: {}",
                    ObjectiveStatus::fixed_set()
                ),
            })?;
        }
        if let Some(parent) = patch.get("parent") {
            self.parent = if parent.is_empty() { None } else { Some(parent.to_string()) };
        }
        if let Some(wbs) = patch.get("wbs") {
            self.wbs = if wbs.is_empty() { None } else { Some(wbs.to_string()) };
        }
        Ok(())
    }
}

impl Objective {
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
            status: ObjectiveStatus::Proposed,
            parent: None,
            wbs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_parent() {
        let now = Timestamp::now();
        let mut obj = Objective::new("obj-002".into(), "Child".into(), now);
        obj.parent = Some("obj-001".into());
        let record = obj.to_record();
        let back = Objective::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(back.parent.as_deref(), Some("obj-001"));
    }

    #[test]
    fn status_synonym_folds_to_active() {
        assert_eq!(ObjectiveStatus::parse("IN_PROGRESS"), Some(ObjectiveStatus::Active));
    }

    #[test]
    fn timestamp_helper_round_trips() {
        let now = Timestamp::now();
        let rendered = now.to_string();
        assert_eq!(parse_timestamp(&rendered, Path::new("x")).unwrap(), now);
    }
}
