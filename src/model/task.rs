//! Task (`spec.md` §3.1): no mandatory references.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl StatusEnum for TaskStatus {
    const VARIANTS: &'static [Self] = &[Self::Todo, Self::InProgress, Self::Blocked, Self::Done, Self::Cancelled];

    fn canonical(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "todo" => Self::Todo,
            "in_progress" => Self::InProgress,
            "blocked" => Self::Blocked,
            "done" => Self::Done,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    fn synonyms() -> &'static [(&'static str, &'static str)] {
        &[("active", "in_progress"), ("complete", "done")]
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub envelope: Envelope,
    pub status: TaskStatus,
    pub objective: Option<String>,
    pub deliverable: Option<String>,
}

impl Entity for Task {
    const KIND: Kind = Kind::Task;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Task, &self.envelope, self.status.canonical());
        if let Some(o) = &self.objective {
            record.set("objective", o.clone());
        }
        if let Some(d) = &self.deliverable {
            record.set("deliverable", d.clone());
        }
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = TaskStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown task status `{status_raw}`"),
        })?;
        let objective = record.get("objective").map(str::to_string).filter(|s| !s.is_empty());
        let deliverable = record.get("deliverable").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            objective,
            deliverable,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Task,
                message: "title must not be empty".into(),
            });
        }
        if let Some(o) = &self.objective {
            check_reference(resolver, Kind::Objective, o)?;
        }
        if let Some(d) = &self.deliverable {
            check_reference(resolver, Kind::Deliverable, d)?;
        }
        Ok(())
    }

    fn references(&self) -> Vec<(Kind, String)> {
        let mut refs = Vec::new();
        if let Some(o) = &self.objective {
            refs.push((Kind::Objective, o.clone()));
        }
        if let Some(d) = &self.deliverable {
            refs.push((Kind::Deliverable, d.clone()));
        }
        refs
    }

    fn apply_patch(&mut self, patch: &Record) -> Result<()> {
        if let Some(title) = patch.get("title") {
            self.envelope.title = title.to_string();
        }
        if let Some(desc) = patch.get("description") {
            self.envelope.description = Some(desc.to_string());
        }
        if let Some(status_raw) = patch.get("status") {
            self.status = TaskStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Task,
                message: format!("unknown status `{status_raw}`, expected one of: {}", TaskStatus::fixed_set()),
            })?;
        }
        if let Some(o) = patch.get("objective") {
            self.objective = if o.is_empty() { None } else { Some(o.to_string()) };
        }
        if let Some(d) = patch.get("deliverable") {
            self.deliverable = if d.is_empty() { None } else { Some(d.to_string()) };
        }
        Ok(())
    }
}

impl Task {
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
            status: TaskStatus::Todo,
            objective: None,
            deliverable: None,
        }
    }
}
