//! Quality (`spec.md` §3.2): must carry at least one metric (name, target
//! numeric, unit, current-status enum).

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, check_reference, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityStatus {
    Tracking,
    Met,
    Missed,
}

impl StatusEnum for QualityStatus {
    const VARIANTS: &'static [Self] = &[Self::Tracking, Self::Met, Self::Missed];

    fn canonical(self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Met => "met",
            Self::Missed => "missed",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "tracking" => Self::Tracking,
            "met" => Self::Met,
            "missed" => Self::Missed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub target: f64,
    pub unit: String,
    pub current_status: QualityStatus,
}

impl Metric {
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.set("name", self.name.clone());
        record.set("target", self.target.to_string());
        record.set("unit", self.unit.clone());
        record.set("current_status", self.current_status.canonical());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let name = record.require("name", path)?;
        let target_raw = record.require("target", path)?;
        let target: f64 = target_raw.parse().map_err(|_| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("metric target `{target_raw}` is not numeric"),
        })?;
        let unit = record.require("unit", path)?;
        let status_raw = record.require("current_status", path)?;
        let current_status = QualityStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown metric status `{status_raw}`"),
        })?;
        Ok(Self {
            name,
            target,
            unit,
            current_status,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Quality {
    pub envelope: Envelope,
    pub status: QualityStatus,
    pub metrics: Vec<Metric>,
    pub objective: Option<String>,
    pub deliverable: Option<String>,
}

impl Entity for Quality {
    const KIND: Kind = Kind::Quality;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Quality, &self.envelope, self.status.canonical());
        record.set_block("metrics", self.metrics.iter().map(Metric::to_record).collect());
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
        let status = QualityStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown quality status `{status_raw}`"),
        })?;
        let metrics = record
            .get_block("metrics")
            .unwrap_or_default()
            .iter()
            .map(|m| Metric::from_record(m, path))
            .collect::<Result<Vec<_>>>()?;
        let objective = record.get("objective").map(str::to_string).filter(|s| !s.is_empty());
        let deliverable = record.get("deliverable").map(str::to_string).filter(|s| !s.is_empty());
        Ok(Self {
            envelope,
            status,
            metrics,
            objective,
            deliverable,
        })
    }

    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Quality,
                message: "title must not be empty".into(),
            });
        }
        if self.metrics.is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Quality,
                message: "quality must carry at least one metric".into(),
            });
        }
        if self.objective.is_none() && self.deliverable.is_none() {
            return Err(ZeusError::Validation {
                kind: Kind::Quality,
                message: "quality must reference an objective or a deliverable".into(),
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
            self.status = QualityStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Quality,
                message: format!("unknown status `{status_raw}`, expected one of: {}", QualityStatus::fixed_set()),
            })?;
        }
        if let Some(blocks) = patch.get_block("metrics") {
            self.metrics = blocks
                .iter()
                .map(|b| Metric::from_record(b, Path::new("<patch>")))
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

impl Quality {
    #[must_use]
    pub fn new(id: String, title: String, metrics: Vec<Metric>, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id,
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: QualityStatus::Tracking,
            metrics,
            objective: None,
            deliverable: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_at_least_one_metric() {
        let now = Timestamp::now();
        let q = Quality::new("qual-001".into(), "Latency".into(), vec![], now);
        struct NoPeers;
        impl PeerResolver for NoPeers {
            fn exists(&self, _: Kind, _: &str) -> Result<bool> {
                Ok(true)
            }
            fn kind_of(&self, _: &str) -> Result<Option<Kind>> {
                Ok(None)
            }
        }
        let err = q.validate(&NoPeers).unwrap_err();
        assert!(matches!(err, ZeusError::Validation { .. }));
    }

    #[test]
    fn metric_round_trips() {
        let now = Timestamp::now();
        let metric = Metric {
            name: "p99".into(),
            target: 200.0,
            unit: "ms".into(),
            current_status: QualityStatus::Tracking,
        };
        let mut q = Quality::new("qual-002".into(), "Latency".into(), vec![metric], now);
        q.objective = Some("obj-001".into());
        let record = q.to_record();
        let back = Quality::from_record(&record, Path::new("x")).unwrap();
        assert_eq!(back.metrics.len(), 1);
        assert_eq!(back.metrics[0].name, "p99");
        assert!((back.metrics[0].target - 200.0).abs() < f64::EPSILON);
    }
}
