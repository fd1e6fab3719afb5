//! Problem (`spec.md` §3.2): severity ∈ {critical, high, medium, low};
//! references an Objective or a Deliverable.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemStatus {
    Open,
    Mitigated,
    Resolved,
    Closed,
}

impl StatusEnum for ProblemStatus {
    const VARIANTS: &'static [Self] = &[Self::Open, Self::Mitigated, Self::Resolved, Self::Closed];

    fn canonical(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Mitigated => "mitigated",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "open" => Self::Open,
            "mitigated" => Self::Mitigated,
            "resolved" => Self::Resolved,
            "closed" => Self::Closed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl StatusEnum for ProblemSeverity {
    const VARIANTS: &'static [Self] = &[Self::Critical, Self::High, Self::Medium, Self::Low];

    fn canonical(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub envelope: Envelope,
    pub status: ProblemStatus,
    pub severity: ProblemSeverity,
    pub objective: Option<String>,
    pub deliverable: Option<String>,
}

impl Entity for Problem {
    const KIND: Kind = Kind::Problem;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Problem, &self.envelope, self.status.canonical());
        record.set("severity", self.severity.canonical());
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
        let status = ProblemStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown problem status `{status_raw}`"),
        })?;
        let severity_raw = record.require("severity", path)?;
        let severity = ProblemSeverity::parse(&severity_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown problem severity `{severity_raw}`"),
        })?;
        let objective = record.get("objective").map(str::to_string).filter(|s| !s.is_empty());
        let deliverable = record.get("deliverable").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            severity,
            objective,
            deliverable,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Problem,
                message: "title must not be empty".into(),
            });
        }
        if self.objective.is_none() && self.deliverable.is_none() {
            return Err(ZeusError::Validation {
                kind: Kind::Problem,
                message: "problem must reference an objective or a deliverable".into(),
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
            self.status = ProblemStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Problem,
                message: format!("unknown status `{status_raw}`, expected one of: {}", ProblemStatus::fixed_set()),
            })?;
        }
        if let Some(severity_raw) = patch.get("severity") {
            self.severity = ProblemSeverity::parse(severity_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Problem,
                message: format!(
                    "unknown severity `{severity_raw}`, expected one of: {}",
                    ProblemSeverity::fixed_set()
                ),
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

impl Problem {
    #[must_use]
    pub fn new(id: String, title: String, severity: ProblemSeverity, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: ProblemStatus::Open,
            severity,
            objective: None,
            deliverable: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_severity() {
        let now = Timestamp::now();
        let mut p = Problem::new("prob-001".into(), "Widget crashes".into(), ProblemSeverity::High, now);
        p.objective = Some("obj-001".into());
        let record = p.to_record();
        let back = Problem::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(back.severity, ProblemSeverity::High);
    }
}
