//! Vision (`spec.md` §3.1, §3.2): exactly one record, fixed id `vision`.
//! Add collapses to "write or overwrite" — handled by `VisionHandler`, not
//! here; this module only carries the record shape.

use std::path::Path;

use jiff::Timestamp;

use super::{Entity, Envelope, Kind, PeerResolver, StatusEnum, read_envelope, write_envelope};
use crate::codec::Record;
use crate::error::{Result, ZeusError};

/// The fixed identifier every Vision record carries.
pub const VISION_ID: &str = "vision";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionStatus {
    Draft,
    Active,
    Achieved,
}

impl StatusEnum for VisionStatus {
    const VARIANTS: &'static [Self] = &[Self::Draft, Self::Active, Self::Achieved];

    fn canonical(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Achieved => "achieved",
        }
    }

    fn parse_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "draft" => Self::Draft,
            "active" => Self::Active,
            "achieved" => Self::Achieved,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Vision {
    pub envelope: Envelope,
    pub status: VisionStatus,
}

impl Entity for Vision {
    const KIND: Kind = Kind::Vision;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        write_envelope(&mut record, Kind::Vision, &self.envelope, self.status.canonical());
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let envelope = read_envelope(record, path)?;
        let status_raw = record.require("status", path)?;
        let status = VisionStatus::parse(&status_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown vision status `{status_raw}`"),
        })?;
        Ok(Self { envelope, status })
    }

    fn validate(&self, _resolver: &dyn PeerResolver) -> Result<()> {
        if self.envelope.id != VISION_ID {
            return Err(ZeusError::Validation {
                kind: Kind::Vision,
                message: format!("vision id must be `{VISION_ID}`"),
            });
        }
        if self.envelope.title.trim().is_empty() {
            return Err(ZeusError::Validation {
                kind: Kind::Vision,
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
            self.status = VisionStatus::parse(status_raw).ok_or_else(|| ZeusError::Validation {
                kind: Kind::Vision,
                message: format!("unknown status `{status_raw}`, expected one of: {}", VisionStatus::fixed_set()),
            })?;
        }
        Ok(())
    }
}

impl Vision {
    #[must_use]
    pub fn new(title: String, now: Timestamp) -> Self {
        Self {
            envelope: Envelope {
                id: VISION_ID.to_string(),
                title,
                description: None,
                created_at: now,
                updated_at: now,
            },
            status: VisionStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_fixed_id() {
        let now = Timestamp::now();
        let mut v = Vision::new("Be the best".into(), now);
        v.envelope.id = "vision-2".into();
        struct NoPeers;
        impl PeerResolver for NoPeers {
            fn exists(&self, _: Kind, _: &str) -> Result<bool> {
                Ok(true)
            }
            fn kind_of(&self, _: &str) -> Result<Option<Kind>> {
                Ok(None)
            }
        }
        let err = v.validate(&NoPeers).unwrap_err();
        assert!(matches!(err, ZeusError::Validation { .. }));
    }

    #[test]
    fn round_trips() {
        let now = Timestamp::now();
        let v = Vision::new("Ship it".into(), now);
        let record = v.to_record();
        let back = Vision::from_record(&record, Path::new("vision")).unwrap();
        assert_eq!(back.envelope.id, VISION_ID);
        assert_eq!(back.status, VisionStatus::Draft);
    }
}
