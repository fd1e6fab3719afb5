//! Assumption (`spec.md` §3.1): one mandatory reference, an Objective.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssumptionStatus {
    Holding,
    Confirmed,
    Invalidated,
}

impl StatusEnum for AssumptionStatus {
    const VARIANTS: &'static [Self] = &[Self::Holding, Self::Confirmed, Self::Invalidated];

    fn canonical(self) -> &'static str {
        match self {
            Self::Holding => "holding",
            Self::Confirmed => "confirmed",
            Self::Invalidated => "invalidated",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "holding" => Self::Holding,
            "confirmed" => Self::Confirmed,
            "invalidated" => Self::Invalidated,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Assumption {
    pub envelope: Envelope,
    pub status: AssumptionStatus,
    pub objective: String,
}

impl Entity for Assumption {
    const KIND: Kind = Kind::Assumption;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Assumption, &self.envelope, self.status.canonical());
        record.set("objective", self.objective.clone());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = AssumptionStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown assumption status `{status_raw}`"),
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
                kind: Kind::Assumption,
                message: "title must not be empty".into(),
            });
        }
        if self.objective.is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Assumption,
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
            self.status = AssumptionStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Assumption,
                message: format!(
                    "unknown status `{status_raw}`, expected one of: {}",
                    AssumptionStatus::fixed_set()
                ),
            })?;
        }
        if let Some(objective) = patch.get("objective") {
            self.objective = objective.to_string();
        }
        Ok(())
    }
}

impl Assumption {
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
            status: AssumptionStatus::Holding,
            objective,
        }
    }
}
