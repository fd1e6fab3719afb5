//! ApprovalQueue (`spec.md` §4.7, C7): the durable pending-mutation queue
//! used when a project is configured for manual approval.
//!
//! In `auto` mode, Add/Update/Delete execute directly — `apply_add`,
//! `apply_update`, `apply_delete` below are the only place that dispatch.
//! In `manual` mode the intended mutation is serialized into
//! `approvals/<id>` instead; `approve` later replays it through that same
//! dispatch, under the target kind's usual lock discipline, so approving a
//! request is indistinguishable from the mutation having run live. If a
//! replayed mutation's precondition no longer holds (the target was
//! deleted, a reference now dangles), the approval fails and is left
//! queued for the operator rather than silently dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::Timestamp;

use crate::bus::{ChangeBus, Operation};
use crate::codec::{check_schema_version, Record, CURRENT_SCHEMA_VERSION};
use crate::config::ApprovalMode;
use crate::error::{Result, ZeusError};
use crate::handlers::Handlers;
use crate::id;
use crate::model::{
    parse_timestamp, Assumption, Consideration, Deliverable, Entity, Kind, Likelihood, Objective,
    PeerResolver, Problem, ProblemSeverity, Quality, Risk, Task,
};
use crate::store::file::{FileStore, LockMode};

const DIR: &str = "approvals";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl MutationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "add" => Self::Add,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => return None,
        })
    }
}

/// A durable pending mutation (`spec.md` §4.7): which kind and operation it
/// targets, the intended field values, who asked for it, and when.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub id: String,
    pub target_kind: Kind,
    pub operation: MutationKind,
    pub target_id: Option<String>,
    pub requester: String,
    pub created_at: Timestamp,
    pub payload: Record,
}

impl PendingApproval {
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.set("schema", CURRENT_SCHEMA_VERSION.to_string());
        record.set("id", self.id.clone());
        record.set("target_kind", self.target_kind.cli_name());
        record.set("operation", self.operation.as_str());
        if let Some(target_id) = &self.target_id {
            record.set("target_id", target_id.clone());
        }
        record.set("requester", self.requester.clone());
        record.set("created_at", self.created_at.to_string());
        record.set_block("payload", vec![self.payload.clone()]);
        record
    }

    fn from_record(record: &Record, path: &Path) -> Result<Self> {
        let id = record.require("id", path)?;
        let target_kind_raw = record.require("target_kind", path)?;
        let target_kind = Kind::from_cli_name(&target_kind_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown target kind `{target_kind_raw}`"),
        })?;
        let operation_raw = record.require("operation", path)?;
        let operation = MutationKind::parse(&operation_raw).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("unknown approval operation `{operation_raw}`"),
        })?;
        let target_id = record.get("target_id").map(str::to_string).filter(|s| !s.is_empty());
        let requester = record.require("requester", path)?;
        let created_at = parse_timestamp(&record.require("created_at", path)?, path)?;
        let payload = record.get_block("payload").and_then(|blocks| blocks.first()).cloned().unwrap_or_default();
        Ok(Self {
            id,
            target_kind,
            operation,
            target_id,
            requester,
            created_at,
            payload,
        })
    }
}

/// The result of an Add/Update/Delete request: either it ran, or it is now
/// waiting in the queue.
#[derive(Debug, Clone)]
pub enum Outcome {
    Applied(Record),
    Pending(String),
}

#[derive(Clone)]
pub struct ApprovalQueue {
    store: FileStore,
    handlers: Handlers,
    bus: ChangeBus,
    timeout: Duration,
    mode: ApprovalMode,
}

impl ApprovalQueue {
    #[must_use]
    pub fn new(store: FileStore, handlers: Handlers, bus: ChangeBus, timeout: Duration, mode: ApprovalMode) -> Self {
        Self {
            store,
            handlers,
            bus,
            timeout,
            mode,
        }
    }

    pub fn add(&self, kind: Kind, payload: Record, requester: String) -> Result<Outcome> {
        match self.mode {
            ApprovalMode::Auto => Ok(Outcome::Applied(self.apply_add(kind, &payload)?)),
            ApprovalMode::Manual => Ok(Outcome::Pending(self.enqueue(kind, MutationKind::Add, None, payload, requester)?.id)),
        }
    }

    pub fn update(&self, kind: Kind, target_id: String, patch: Record, requester: String) -> Result<Outcome> {
        match self.mode {
            ApprovalMode::Auto => Ok(Outcome::Applied(self.apply_update(kind, &target_id, &patch)?)),
            ApprovalMode::Manual => Ok(Outcome::Pending(
                self.enqueue(kind, MutationKind::Update, Some(target_id), patch, requester)?.id,
            )),
        }
    }

    pub fn delete(&self, kind: Kind, target_id: String, requester: String) -> Result<Outcome> {
        match self.mode {
            ApprovalMode::Auto => {
                self.apply_delete(kind, &target_id)?;
                Ok(Outcome::Applied(Record::new()))
            }
            ApprovalMode::Manual => Ok(Outcome::Pending(
                self.enqueue(kind, MutationKind::Delete, Some(target_id), Record::new(), requester)?.id,
            )),
        }
    }

    fn enqueue(
        &self,
        kind: Kind,
        operation: MutationKind,
        target_id: Option<String>,
        payload: Record,
        requester: String,
    ) -> Result<PendingApproval> {
        self.store.with_lock(Path::new(DIR), LockMode::Exclusive, self.timeout, || {
            let new_id = id::next_id(&self.store, Path::new(DIR), Kind::Approval.id_prefix())?;
            let pending = PendingApproval {
                id: new_id.clone(),
                target_kind: kind,
                operation,
                target_id,
                requester,
                created_at: Timestamp::now(),
                payload,
            };
            self.store.write(&PathBuf::from(DIR).join(&new_id), pending.to_record().to_text().as_bytes())?;
            Ok(pending)
        })
    }

    pub fn list_pending(&self) -> Result<Vec<PendingApproval>> {
        self.store.with_lock(Path::new(DIR), LockMode::Shared, self.timeout, || {
            let names = self.store.list(Path::new(DIR))?;
            names.iter().map(|name| self.read_at(&PathBuf::from(DIR).join(name))).collect()
        })
    }

    pub fn get(&self, approval_id: &str) -> Result<PendingApproval> {
        self.store
            .with_lock(Path::new(DIR), LockMode::Shared, self.timeout, || self.read_at(&PathBuf::from(DIR).join(approval_id)))
    }

    fn read_at(&self, path: &Path) -> Result<PendingApproval> {
        if !self.store.exists(path) {
            let id = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
            return Err(ZeusError::NotFound { kind: Kind::Approval, id });
        }
        let text = self.store.read_to_string(path)?;
        let record = Record::from_text(&text, path)?;
        check_schema_version(&record, path)?;
        PendingApproval::from_record(&record, path)
    }

    /// Replays the pending mutation through the appropriate handler under
    /// the target kind's usual lock discipline, then removes the request
    /// and publishes an Approve event.
    pub fn approve(&self, approval_id: &str) -> Result<Record> {
        let pending = self.get(approval_id)?;
        let applied = match pending.operation {
            MutationKind::Add => self.apply_add(pending.target_kind, &pending.payload)?,
            MutationKind::Update => {
                let target_id = pending.target_id.clone().ok_or_else(|| ZeusError::Codec {
                    path: PathBuf::from(DIR).join(approval_id),
                    message: "update approval missing target_id".into(),
                })?;
                self.apply_update(pending.target_kind, &target_id, &pending.payload)?
            }
            MutationKind::Delete => {
                let target_id = pending.target_id.clone().ok_or_else(|| ZeusError::Codec {
                    path: PathBuf::from(DIR).join(approval_id),
                    message: "delete approval missing target_id".into(),
                })?;
                self.apply_delete(pending.target_kind, &target_id)?;
                Record::new()
            }
        };
        self.store
            .with_lock(Path::new(DIR), LockMode::Exclusive, self.timeout, || self.store.delete(&PathBuf::from(DIR).join(approval_id)))?;
        self.bus.publish(Kind::Approval, approval_id.to_string(), Operation::Approve, Timestamp::now());
        Ok(applied)
    }

    /// Removes the pending request without replaying it, and publishes a
    /// Reject event. `reason` is informational only — nothing downstream
    /// stores it once the request is gone.
    pub fn reject(&self, approval_id: &str, reason: &str) -> Result<()> {
        let _ = reason;
        self.store.with_lock(Path::new(DIR), LockMode::Exclusive, self.timeout, || {
            let path = PathBuf::from(DIR).join(approval_id);
            if !self.store.exists(&path) {
                return Err(ZeusError::NotFound {
                    kind: Kind::Approval,
                    id: approval_id.to_string(),
                });
            }
            self.store.delete(&path)
        })?;
        self.bus.publish(Kind::Approval, approval_id.to_string(), Operation::Reject, Timestamp::now());
        Ok(())
    }

    /// Dispatches a fresh-entity Add for `kind`. Every generic kind follows
    /// the same shape: a default-valued entity, then the merge contract
    /// `Entity::apply_patch` already implements for Update, reused here to
    /// fold the full payload onto the defaults before minting and writing.
    fn apply_add(&self, kind: Kind, payload: &Record) -> Result<Record> {
        let resolver: &dyn PeerResolver = &self.handlers;
        let path = Path::new("<approval payload>");
        Ok(match kind {
            Kind::Vision => {
                let title = payload.get("title").unwrap_or_default().to_string();
                self.handlers.vision.set(title, resolver)?.to_record()
            }
            Kind::Objective => {
                let mut entity = Objective::new(String::new(), String::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers
                    .objectives
                    .add(|id, now| stamp(entity, id, now), resolver)?
                    .to_record()
            }
            Kind::Deliverable => {
                let mut entity = Deliverable::new(String::new(), String::new(), String::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers
                    .deliverables
                    .add(|id, now| stamp(entity, id, now), resolver)?
                    .to_record()
            }
            Kind::Consideration => {
                let mut entity = Consideration::new(String::new(), String::new(), Vec::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers
                    .considerations
                    .add(|id, now| stamp(entity, id, now), resolver)?
                    .to_record()
            }
            Kind::Decision => {
                let title = payload.require("title", path)?;
                let consideration_id = payload.require("consideration", path)?;
                let selected_option_id = payload.require("selected_option_id", path)?;
                let selected_title = payload.require("selected_title", path)?;
                let rationale = payload.require("rationale", path)?;
                self.handlers
                    .decisions
                    .add(title, consideration_id, selected_option_id, selected_title, rationale, resolver)?
                    .to_record()
            }
            Kind::Problem => {
                let mut entity = Problem::new(String::new(), String::new(), ProblemSeverity::Low, Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers.problems.add(|id, now| stamp(entity, id, now), resolver)?.to_record()
            }
            Kind::Risk => {
                let mut entity = Risk::new(String::new(), String::new(), Likelihood::Low, Likelihood::Low, Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers.risks.add(|id, now| stamp(entity, id, now), resolver)?.to_record()
            }
            Kind::Assumption => {
                let mut entity = Assumption::new(String::new(), String::new(), String::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers.assumptions.add(|id, now| stamp(entity, id, now), resolver)?.to_record()
            }
            Kind::Constraint => {
                let title = payload.get("title").unwrap_or_default().to_string();
                let created = self.handlers.constraints.add(title, resolver)?;
                if payload.get("description").is_some() || payload.get("status").is_some() {
                    self.handlers.constraints.update(&created.envelope.id, payload, resolver)?.to_record()
                } else {
                    created.to_record()
                }
            }
            Kind::Quality => {
                let mut entity = Quality::new(String::new(), String::new(), Vec::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers.qualities.add(|id, now| stamp(entity, id, now), resolver)?.to_record()
            }
            Kind::Task => {
                let mut entity = Task::new(String::new(), String::new(), Timestamp::now());
                entity.apply_patch(payload)?;
                self.handlers.tasks.add(|id, now| stamp(entity, id, now), resolver)?.to_record()
            }
            Kind::Approval => {
                return Err(ZeusError::Validation {
                    kind: Kind::Approval,
                    message: "approval is not itself a mutation target".into(),
                });
            }
        })
    }

    fn apply_update(&self, kind: Kind, target_id: &str, patch: &Record) -> Result<Record> {
        let resolver: &dyn PeerResolver = &self.handlers;
        Ok(match kind {
            Kind::Vision => {
                return Err(ZeusError::Validation {
                    kind: Kind::Vision,
                    message: "vision has no separate update operation; add re-sets it in place".into(),
                });
            }
            Kind::Objective => self.handlers.objectives.update(target_id, patch, resolver)?.to_record(),
            Kind::Deliverable => self.handlers.deliverables.update(target_id, patch, resolver)?.to_record(),
            Kind::Consideration => self.handlers.considerations.update(target_id, patch, resolver)?.to_record(),
            Kind::Decision => self.handlers.decisions.update(target_id, patch)?.to_record(),
            Kind::Problem => self.handlers.problems.update(target_id, patch, resolver)?.to_record(),
            Kind::Risk => self.handlers.risks.update(target_id, patch, resolver)?.to_record(),
            Kind::Assumption => self.handlers.assumptions.update(target_id, patch, resolver)?.to_record(),
            Kind::Constraint => self.handlers.constraints.update(target_id, patch, resolver)?.to_record(),
            Kind::Quality => self.handlers.qualities.update(target_id, patch, resolver)?.to_record(),
            Kind::Task => self.handlers.tasks.update(target_id, patch, resolver)?.to_record(),
            Kind::Approval => {
                return Err(ZeusError::Validation {
                    kind: Kind::Approval,
                    message: "approval is not a mutation target".into(),
                });
            }
        })
    }

    fn apply_delete(&self, kind: Kind, target_id: &str) -> Result<()> {
        let owner = target_id.to_string();
        match kind {
            Kind::Vision => Err(ZeusError::Validation {
                kind: Kind::Vision,
                message: "vision cannot be deleted".into(),
            }),
            Kind::Objective => self.handlers.objectives.delete(target_id, || self.handlers.list_references_to(Kind::Objective, &owner)),
            Kind::Deliverable => self
                .handlers
                .deliverables
                .delete(target_id, || self.handlers.list_references_to(Kind::Deliverable, &owner)),
            Kind::Consideration => self
                .handlers
                .considerations
                .delete(target_id, || self.handlers.list_references_to(Kind::Consideration, &owner)),
            Kind::Decision => self.handlers.decisions.delete(target_id),
            Kind::Problem => self.handlers.problems.delete(target_id, || self.handlers.list_references_to(Kind::Problem, &owner)),
            Kind::Risk => self.handlers.risks.delete(target_id, || self.handlers.list_references_to(Kind::Risk, &owner)),
            Kind::Assumption => self
                .handlers
                .assumptions
                .delete(target_id, || self.handlers.list_references_to(Kind::Assumption, &owner)),
            Kind::Constraint => self
                .handlers
                .constraints
                .delete(target_id, || self.handlers.list_references_to(Kind::Constraint, &owner)),
            Kind::Quality => self.handlers.qualities.delete(target_id, || self.handlers.list_references_to(Kind::Quality, &owner)),
            Kind::Task => self.handlers.tasks.delete(target_id, || self.handlers.list_references_to(Kind::Task, &owner)),
            Kind::Approval => Err(ZeusError::Validation {
                kind: Kind::Approval,
                message: "approval is not a mutation target".into(),
            }),
        }
    }
}

/// Overwrites the placeholder envelope fields a freshly-built entity was
/// given before the real id/timestamps were minted under the lock.
fn stamp<E: Entity>(mut entity: E, id: String, now: Timestamp) -> E {
    let env = entity.envelope_mut();
    env.id = id;
    env.created_at = now;
    env.updated_at = now;
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue(mode: ApprovalMode) -> (TempDir, ApprovalQueue) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let bus = ChangeBus::new(1);
        let timeout = Duration::from_secs(1);
        let handlers = Handlers::new(store.clone(), bus.clone(), timeout);
        let queue = ApprovalQueue::new(store, handlers, bus, timeout, mode);
        (dir, queue)
    }

    fn objective_payload(title: &str) -> Record {
        let mut payload = Record::new();
        payload.set("title", title);
        payload
    }

    #[test]
    fn auto_mode_applies_immediately() {
        let (_d, q) = queue(ApprovalMode::Auto);
        let outcome = q.add(Kind::Objective, objective_payload("Ship v1"), "alice".into()).unwrap();
        let Outcome::Applied(record) = outcome else { panic!("expected applied") };
        assert_eq!(record.get("title"), Some("Ship v1"));
    }

    #[test]
    fn manual_mode_enqueues_and_approve_replays_it() {
        let (_d, q) = queue(ApprovalMode::Manual);
        let outcome = q.add(Kind::Objective, objective_payload("Ship v1"), "alice".into()).unwrap();
        let Outcome::Pending(approval_id) = outcome else { panic!("expected pending") };
        assert_eq!(q.list_pending().unwrap().len(), 1);
        let applied = q.approve(&approval_id).unwrap();
        assert_eq!(applied.get("title"), Some("Ship v1"));
        assert!(q.list_pending().unwrap().is_empty());
    }

    #[test]
    fn reject_removes_without_applying() {
        let (_d, q) = queue(ApprovalMode::Manual);
        let outcome = q.add(Kind::Objective, objective_payload("Ship v1"), "alice".into()).unwrap();
        let Outcome::Pending(approval_id) = outcome else { panic!("expected pending") };
        q.reject(&approval_id, "not now").unwrap();
        assert!(q.list_pending().unwrap().is_empty());
        assert!(q.get(&approval_id).is_err());
    }

    #[test]
    fn approve_leaves_request_queued_when_delete_is_still_referenced() {
        let (_d, q) = queue(ApprovalMode::Manual);
        let objective = {
            let Outcome::Pending(approval_id) = q.add(Kind::Objective, objective_payload("Parent"), "alice".into()).unwrap() else {
                panic!("expected pending")
            };
            q.approve(&approval_id).unwrap()
        };
        let objective_id = objective.get("id").unwrap().to_string();

        let mut deliverable_payload = Record::new();
        deliverable_payload.set("title", "Deliverable");
        deliverable_payload.set("objective", objective_id.clone());
        {
            let Outcome::Pending(approval_id) = q.add(Kind::Deliverable, deliverable_payload, "bob".into()).unwrap() else {
                panic!("expected pending")
            };
            q.approve(&approval_id).unwrap();
        }

        let Outcome::Pending(delete_approval_id) = q.delete(Kind::Objective, objective_id, "carol".into()).unwrap() else {
            panic!("expected pending")
        };
        let err = q.approve(&delete_approval_id).unwrap_err();
        assert!(matches!(err, ZeusError::Conflict { .. }));
        assert!(q.get(&delete_approval_id).is_ok(), "rejected mutation stays queued for the operator");
    }
}
