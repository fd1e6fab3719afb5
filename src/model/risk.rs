//! Risk (`spec.md` §3.2, §4.3): probability/impact drawn from a fixed
//! four-value scale; score is derived from the fixed 4×4 matrix and
//! recomputed on every write — a manually supplied score is rejected.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Likelihood {
    Low,
    Medium,
    High,
    Critical,
}

impl StatusEnum for Likelihood {
    const VARIANTS: &'static [Self] = &[Self::Low, Self::Medium, Self::High, Self::Critical];

    fn canonical(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskStatus {
    Open,
    Mitigated,
    Realized,
    Closed,
}

impl StatusEnum for RiskStatus {
    const VARIANTS: &'static [Self] = &[Self::Open, Self::Mitigated, Self::Realized, Self::Closed];

    fn canonical(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Mitigated => "mitigated",
            Self::Realized => "realized",
            Self::Closed => "closed",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "open" => Self::Open,
            "mitigated" => Self::Mitigated,
            "realized" => Self::Realized,
            "closed" => Self::Closed,
            _ => return None,
        })
    }
}

/// The fixed 4×4 probability × impact matrix (`spec.md` §4.3).
#[must_use]
pub fn derive_score(probability: Likelihood, impact: Likelihood) -> Likelihood {
    use Likelihood::{Critical, High, Low, Medium};
    match (probability, impact) {
        (Low, Low) | (Low, Medium) | (Medium, Low) => Low,
        (Low, High) | (Medium, Medium) | (High, Low) => Medium,
        (Low, Critical) | (Medium, High) | (High, Medium) | (Critical, Low) => High,
        (Medium, Critical) | (High, High) | (High, Critical) | (Critical, Medium) | (Critical, High) | (Critical, Critical) => Critical,
    }
}

#[derive(Debug, Clone)]
pub struct Risk {
    pub envelope: Envelope,
    pub status: RiskStatus,
    pub probability: Likelihood,
    pub impact: Likelihood,
    pub objective: Option<String>,
    pub deliverable: Option<String>,
}

impl Risk {
    #[must_use]
    pub fn score(&self) -> Likelihood {
        derive_score(self.probability, self.impact)
    }

    #[must_use]
    pub fn new(id: String, title: String, probability: Likelihood, impact: Likelihood, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: RiskStatus::Open,
            probability,
            impact,
            objective: None,
            deliverable: None,
        }
    }
}

impl Entity for Risk {
    const KIND: Kind = Kind::Risk;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Risk, &self.envelope, self.status.canonical());
        record.set("probability", self.probability.canonical());
        record.set("impact", self.impact.canonical());
        record.set("score", self.score().canonical());
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
        let status = RiskStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown risk status `{status_raw}`"),
        })?;
        let probability_raw = record.require("probability", path)?;
        let probability = Likelihood::parse(&probability_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown probability `{probability_raw}`"),
        })?;
        let impact_raw = record.require("impact", path)?;
        let impact = Likelihood::parse(&impact_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown impact `{impact_raw}`"),
        })?;
        // `score` is recomputed, never trusted from disk — see `validate`.
        let objective = record.get("objective").map(str::to_string).filter(|s| !s.is_empty());
        let deliverable = record.get("deliverable").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            probability,
            impact,
            objective,
            deliverable,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Risk,
                message: "title must not be empty".into(),
            });
        }
        if self.objective.is_none() && self.deliverable.is_none() {
            return Err(ZeusError::Validation {
                kind: Kind::Risk,
                message: "risk must reference an objective or a deliverable".into(),
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
            self.status = RiskStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Risk,
                message: format!("unknown status `{status_raw}`, expected one of: {}", RiskStatus::fixed_set()),
            })?;
        }
        if patch.get("score").is_some() {
            return Err(ZeusError::Validation {
                kind: Kind::Risk,
                message: "score is derived and cannot be set directly".into(),
            });
        }
        if let Some(p) = patch.get("probability") {
            self.probability = Likelihood::parse(p).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Risk,
                message: format!("unknown probability `{p}`, expected one of: {}", Likelihood::fixed_set()),
            })?;
        }
        if let Some(i) = patch.get("impact") {
            self.impact = Likelihood::parse(i).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Risk,
                message: format!("unknown impact `{i}`, expected one of: {}", Likelihood::fixed_set()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use Likelihood::{Critical, High, Low, Medium};

    #[test]
    fn matrix_matches_spec_table() {
        assert_eq!(derive_score(Medium, High), High);
        assert_eq!(derive_score(Critical, Low), High);
        assert_eq!(derive_score(Low, Low), Low);
        assert_eq!(derive_score(High, High), Critical);
        assert_eq!(derive_score(Critical, Critical), Critical);
    }

    #[test]
    fn score_field_is_rejected_on_patch() {
        let now = Timestamp::now();
        let mut risk = Risk::new("risk-001".into(), "R".into(), Low, Low, now);
        let mut patch = Record::new();
        patch.set("score", "critical");
        let err = risk.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, ZeusError::Validation { .. }));
    }

    #[test]
    fn score_recomputed_on_to_record() {
        let now = Timestamp::now();
        let risk = Risk::new("risk-002".into(), "R2".into(), Critical, Low, now);
        let record = risk.to_record();
        assert_eq!(record.get("score"), Some("high"));
    }
}
