//! Consideration (`spec.md` §3.1, §3.2, §9): holds a list of options, each
//! with a unique-within-the-Consideration identifier, title, and pro/con
//! lists. Carries the reverse edge to the Decision that resolves it — set
//! once by the write protocol that creates that Decision and frozen from
//! then on (`spec.md` §9, "back-references and mutual consistency").

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsiderationStatus {
    Open,
    Decided,
    Abandoned,
}

impl StatusEnum for ConsiderationStatus {
    const VARIANTS: &'static [Self] = &[Self::Open, Self::Decided, Self::Abandoned];

    fn canonical(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Decided => "decided",
            Self::Abandoned => "abandoned",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "open" => Self::Open,
            "decided" => Self::Decided,
            "abandoned" => Self::Abandoned,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsiderationOption {
    pub id: String,
    pub title: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

impl ConsiderationOption {
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.set("id", self.id.clone());
        record.set("title", self.title.clone());
        record.set_list("pros", self.pros.clone());
        record.set_list("cons", self.cons.clone());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        Ok(Self {
            id: record.require("id", path)?,
            title: record.require("title", path)?,
            pros: record.get_list("pros").unwrap_or_default().to_vec(),
            cons: record.get_list("cons").unwrap_or_default().to_vec(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Consideration {
    pub envelope: Envelope,
    pub status: ConsiderationStatus,
    pub options: Vec<ConsiderationOption>,
    pub objective: Option<String>,
    pub deliverable: Option<String>,
    /// The Decision that resolves this consideration, if any. Set once by
    /// `DecisionHandler::Add` and never changed afterward.
    pub decision: Option<String>,
}

impl Entity for Consideration {
    const KIND: Kind = Kind::Consideration;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Consideration, &self.envelope, self.status.canonical());
        record.set_block("options", self.options.iter().map(ConsiderationOption::to_record).collect());
        if let Some(o) = &self.objective {
            record.set("objective", o.clone());
        }
        if let Some(d) = &self.deliverable {
            record.set("deliverable", d.clone());
        }
        if let Some(dec) = &self.decision {
            record.set("decision", dec.clone());
        }
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = ConsiderationStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown consideration status `{status_raw}`"),
        })?;
        let options = record
            .get_block("options")
            .unwrap_or_default()
            .iter()
            .map(|o| ConsiderationOption::from_record(o, path))
            .collect::<Result<Vec<_>>>()?;
        let objective = record.get("objective").map(str::to_string).filter(|s| !s.is_empty());
        let deliverable = record.get("deliverable").map(str::to_string).filter(|s| !s.is_empty());
        let decision = record.get("decision").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            options,
            objective,
            deliverable,
            decision,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Consideration,
                message: "title must not be empty".into(),
            });
        }
        if self.objective.is_none() && self.deliverable.is_none() {
            return Err(ZeusError::Validation {
                kind: Kind::Consideration,
                message: "consideration must reference an objective or a deliverable".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                return Err(ZeusError::Validation {
                    kind: Kind::Consideration,
                    message: format!("duplicate option id `{}`", option.id),
                });
            }
        }
        if let Some(o) = &self.objective {
            check_reference(resolver, Kind::Objective, o)?;
        }
        if let Some(d) = &self.deliverable {
            check_reference(resolver, Kind::Deliverable, d)?;
        }
        if let Some(dec) = &self.decision {
            check_reference(resolver, Kind::Decision, dec)?;
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
        if let Some(dec) = &self.decision {
            refs.push((Kind::Decision, dec.clone()));
        }
        refs
    }

    fn apply_patch(&mut self, patch: &Record) -> Result<()> {
        if patch.get("decision").is_some() {
            return Err(ZeusError::Validation {
                kind: Kind::Consideration,
                message: "decision back-reference is set by decision creation, not by patch".into(),
            });
        }
        if let Some(title) = patch.get("title") {
            self.envelope.title = title.to_string();
        }
        if let Some(desc) = patch.get("description") {
            self.envelope.description = Some(desc.to_string());
        }
        if let Some(status_raw) = patch.get("status") {
            self.status = ConsiderationStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Consideration,
                message: format!(
                    "unknown status `{status_raw}`, expected one of: {}",
                    ConsiderationStatus::fixed_set()
                ),
            })?;
        }
        if let Some(blocks) = patch.get_block("options") {
            self.options = blocks
                .iter()
                .map(|b| ConsiderationOption::from_record(b, Path::new("<patch>")))
                .collect::<Result<Vec<_>>>()?;
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

impl Consideration {
    #[must_use]
    pub fn new(id: String, title: String, options: Vec<ConsiderationOption>, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: ConsiderationStatus::Open,
            options,
            objective: None,
            deliverable: None,
            decision: None,
        }
    }

    /// Freezes the back-reference to the Decision that resolves this
    /// consideration. Called once, by the same exclusive-lock envelope that
    /// creates the Decision (`spec.md` §9).
    ///
    /// # Errors
    /// Returns `Conflict` if a decision is already recorded.
    pub fn freeze_decision(&mut self, decision_id: String) -> Result<()> {
        if let Some(existing) = &self.decision {
            return Err(ZeusError::Conflict {
                message: format!("consideration {} already resolved by decision {existing}", self.envelope.id),
            });
        }
        self.decision = Some(decision_id);
        Ok(())
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
    fn rejects_duplicate_option_ids() {
        let now = Timestamp::now();
        let opts = vec![
            ConsiderationOption {
                id: "opt-1".into(),
                title: "A".into(),
                pros: vec![],
                cons: vec![],
            },
            ConsiderationOption {
                id: "opt-1".into(),
                title: "B".into(),
                pros: vec![],
                cons: vec![],
            },
        ];
        let mut c = Consideration::new("con-001".into(), "Pick a DB".into(), opts, now);
        c.objective = Some("obj-001".into());
        let err = c.validate(&NoPeers).unwrap_err();
        assert!(matches!(err, ZeusError::Validation { .. }));
    }

    #[test]
    fn freeze_decision_rejects_second_call() {
        let now = Timestamp::now();
        let mut c = Consideration::new("con-002".into(), "Pick a DB".into(), vec![], now);
        c.freeze_decision("dec-001".into()).unwrap();
        let err = c.freeze_decision("dec-002".into()).unwrap_err();
        assert!(matches!(err, ZeusError::Conflict { .. }));
    }

    #[test]
    fn patch_cannot_set_decision() {
        let now = Timestamp::now();
        let mut c = Consideration::new("con-003".into(), "Pick a DB".into(), vec![], now);
        let mut patch = Record::new();
        patch.set("decision", "dec-001");
        let err = c.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, ZeusError::Validation { .. }));
    }
}
