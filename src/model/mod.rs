//! The entity model (`spec.md` §3): kinds, common envelope fields, and the
//! conversions between typed entities and the on-disk [`Record`](crate::codec::Record)
//! grammar.

mod assumption;
mod constraint;
mod consideration;
mod decision;
mod deliverable;
mod objective;
mod problem;
mod quality;
mod risk;
mod status;
mod task;
mod vision;

pub use assumption::{Assumption, AssumptionStatus};
pub use constraint::{Constraint, ConstraintStatus};
pub use consideration::{Consideration, ConsiderationOption, ConsiderationStatus};
pub use decision::Decision;
pub use deliverable::{Deliverable, DeliverableStatus};
pub use objective::{Objective, ObjectiveStatus};
pub use problem::{Problem, ProblemSeverity, ProblemStatus};
pub use quality::{Metric, Quality, QualityStatus};
pub use risk::{Likelihood, Risk, RiskStatus};
pub use status::StatusEnum;
pub use task::{Task, TaskStatus};
pub use vision::{Vision, VisionStatus};

use std::fmt;
use std::path::Path;

use jiff::Timestamp;

use crate::codec::Record;
use crate::error::Result;

/// The fixed set of entity kinds (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Vision,
    Objective,
    Deliverable,
    Consideration,
    Decision,
    Problem,
    Risk,
    Assumption,
    Constraint,
    Quality,
    Task,
    Approval,
}

impl Kind {
    /// All kinds, in a fixed order used for deterministic iteration (e.g.
    /// `IntegrityChecker`, `RollupEngine`).
    pub const ALL: [Kind; 12] = [
        Kind::Vision,
        Kind::Objective,
        Kind::Deliverable,
        Kind::Consideration,
        Kind::Decision,
        Kind::Problem,
        Kind::Risk,
        Kind::Assumption,
        Kind::Constraint,
        Kind::Quality,
        Kind::Task,
        Kind::Approval,
    ];

    /// The per-kind identifier prefix (`spec.md` §3.2).
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Kind::Vision => "vision",
            Kind::Objective => "obj-",
            Kind::Deliverable => "del-",
            Kind::Consideration => "con-",
            Kind::Decision => "dec-",
            Kind::Problem => "prob-",
            Kind::Risk => "risk-",
            Kind::Assumption => "assum-",
            Kind::Constraint => "constr-",
            Kind::Quality => "qual-",
            Kind::Task => "task-",
            Kind::Approval => "appr-",
        }
    }

    /// The directory (or, for singleton/shared-file kinds, the file) under
    /// the project root that stores this kind (`spec.md` §6.1).
    #[must_use]
    pub fn storage_name(self) -> &'static str {
        match self {
            Kind::Vision => "vision",
            Kind::Objective => "objectives",
            Kind::Deliverable => "deliverables",
            Kind::Consideration => "considerations",
            Kind::Decision => "decisions",
            Kind::Problem => "problems",
            Kind::Risk => "risks",
            Kind::Assumption => "assumptions",
            Kind::Constraint => "constraints",
            Kind::Quality => "quality",
            Kind::Task => "tasks",
            Kind::Approval => "approvals",
        }
    }

    /// Whether this kind stores one record per file under a directory
    /// (as opposed to a fixed single file).
    #[must_use]
    pub fn is_directory_per_record(self) -> bool {
        !matches!(self, Kind::Vision | Kind::Constraint)
    }

    /// The lowercase CLI name for this kind, e.g. `objective`.
    #[must_use]
    pub fn cli_name(self) -> &'static str {
        match self {
            Kind::Vision => "vision",
            Kind::Objective => "objective",
            Kind::Deliverable => "deliverable",
            Kind::Consideration => "consideration",
            Kind::Decision => "decision",
            Kind::Problem => "problem",
            Kind::Risk => "risk",
            Kind::Assumption => "assumption",
            Kind::Constraint => "constraint",
            Kind::Quality => "quality",
            Kind::Task => "task",
            Kind::Approval => "approval",
        }
    }

    /// Reverse of [`Kind::cli_name`], used when a kind tag is read back off
    /// disk (e.g. an Approval's target kind).
    #[must_use]
    pub fn from_cli_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.cli_name() == name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.cli_name();
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}{}", first.to_uppercase(), chars.as_str())
        } else {
            Ok(())
        }
    }
}

/// Fields every entity carries (`spec.md` §3.2), independent of kind.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Looks up whether a referenced identifier resolves, and to which kind —
/// implemented by the `Handlers` registry (C4) so entity-level validation
/// can check cross-entity references without owning the whole registry.
pub trait PeerResolver {
    /// Whether an entity of exactly `kind` with id `id` exists.
    fn exists(&self, kind: Kind, id: &str) -> Result<bool>;

    /// The kind of the entity with id `id`, if any entity (of any kind)
    /// has that id. Used to distinguish `NotFound` from `WrongKind`.
    fn kind_of(&self, id: &str) -> Result<Option<Kind>>;
}

/// Checks that a reference field (empty = no reference) resolves to an
/// entity of `expected` kind, per the referential invariant in `spec.md`
/// §3.2.
pub fn check_reference(
    resolver: &dyn PeerResolver,
    expected: Kind,
    id: &str,
) -> Result<()> {
    if id.is_empty() {
        return Ok(());
    }
    if resolver.exists(expected, id)? {
        return Ok(());
    }
    match resolver.kind_of(id)? {
        Some(actual) => Err(crate::error::ZeusError::WrongKind {
            id: id.to_string(),
            expected,
            actual,
        }),
        // A missing reference target is a validation failure of the
        // referring record, not a direct "no such entity" lookup
        // (`spec.md` §6.2 distinguishes "reference failure" from "not
        // found" and puts them in different exit-code buckets).
        None => Err(crate::error::ZeusError::Validation {
            kind: expected,
            message: format!("{expected} {id} not found"),
        }),
    }
}

/// The shared behavior every directory-per-record entity kind implements,
/// letting the generic `Handler<E>` (C4) provide Add/Get/List/Update/Delete
/// once instead of once per kind.
pub trait Entity: Sized {
    const KIND: Kind;

    fn envelope(&self) -> &Envelope;
    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Converts to the on-disk record, including the common envelope
    /// fields and this kind's own fields.
    fn to_record(&self) -> Record;

    /// Parses a record (already schema-checked) back into this entity.
    fn from_record(record: &Record, path: &Path) -> Result<Self>;

    /// Validates kind-specific invariants and resolves any reference
    /// fields through `resolver`, rejecting missing or wrong-kind targets.
    fn validate(&self, resolver: &dyn PeerResolver) -> Result<()>;

    /// Reference fields this entity carries, as `(kind, id)` pairs, empty
    /// references omitted. Used by `IntegrityChecker` and
    /// `ListReferencesFrom`.
    fn references(&self) -> Vec<(Kind, String)>;

    /// Applies a patch record: fields present in `patch` overwrite, fields
    /// absent are preserved (the "whole-record replace with merge"
    /// contract in `spec.md` §4.4).
    fn apply_patch(&mut self, patch: &Record) -> Result<()>;
}

/// Writes the common envelope fields (`spec.md` §3.2) plus `schema` and
/// `kind`, shared by every kind's `to_record`.
pub(crate) fn write_envelope(record: &mut Record, kind: Kind, env: &Envelope, status: &str) {
    record.set("schema", crate::codec::CURRENT_SCHEMA_VERSION.to_string());
    record.set("kind", kind.cli_name());
    record.set("id", env.id.clone());
    record.set("status", status);
    record.set("created_at", env.created_at.to_string());
    record.set("updated_at", env.updated_at.to_string());
    record.set("title", env.title.clone());
    if let Some(desc) = &env.description {
        record.set("description", desc.clone());
    }
}

/// Reads the common envelope fields, failing closed by naming the first
/// missing key (`spec.md` §4.2, §7).
pub(crate) fn read_envelope(record: &Record, path: &Path) -> Result<Envelope> {
    let id = record.require("id", path)?;
    let title = record.require("title", path)?;
    let created_at = parse_timestamp(&record.require("created_at", path)?, path)?;
    let updated_at = parse_timestamp(&record.require("updated_at", path)?, path)?;
    if updated_at < created_at {
        return Err(crate::error::ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("updated_at ({updated_at}) precedes created_at ({created_at})"),
        });
    }
    let description = record
        .get("description")
        .map(str::to_string)
        .filter(|s| !s.is_empty());
    Ok(Envelope {
        id,
        title,
        description,
        created_at,
        updated_at,
    })
}

pub(crate) fn parse_timestamp(raw: &str, path: &Path) -> Result<Timestamp> {
    raw.parse::<Timestamp>().map_err(|e| crate::error::ZeusError::Codec {
        path: path.to_path_buf(),
        message: format!("invalid timestamp `{raw}`: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_titlecase() {
        assert_eq!(Kind::Objective.to_string(), "Objective");
        assert_eq!(Kind::Deliverable.to_string(), "Deliverable");
    }

    #[test]
    fn all_covers_twelve_kinds() {
        assert_eq!(Kind::ALL.len(), 12);
    }

    #[test]
    fn read_envelope_rejects_updated_before_created() {
        let mut record = Record::new();
        record.set("id", "obj-001");
        record.set("title", "Title");
        record.set("created_at", "2026-07-27T12:00:00Z");
        record.set("updated_at", "2026-07-27T11:00:00Z");
        let err = read_envelope(&record, Path::new("objectives/obj-001")).unwrap_err();
        assert!(matches!(err, crate::error::ZeusError::Codec { .. }));
    }
}
