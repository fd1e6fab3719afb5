//! EntityHandlers (`spec.md` §4.4, C4): the per-kind handlers, collected
//! into one [`Handlers`] registry that also implements [`PeerResolver`] so
//! any entity's `validate` can check cross-entity references, and exposes
//! the whole-graph `list_references_to` aggregate IntegrityChecker and
//! Delete both need.

mod constraint;
mod decision;
mod generic;
mod vision;

pub use constraint::ConstraintHandler;
pub use decision::DecisionHandler;
pub use generic::Handler;
pub use vision::VisionHandler;

use std::time::Duration;

use crate::bus::ChangeBus;
use crate::error::Result;
use crate::id;
use crate::model::{Assumption, Consideration, Deliverable, Entity, Kind, Objective, PeerResolver, Problem, Quality, Risk, Task};
use crate::store::file::FileStore;

/// Every per-kind handler, constructed once per `Store`.
#[derive(Clone)]
pub struct Handlers {
    pub vision: VisionHandler,
    pub objectives: Handler<Objective>,
    pub deliverables: Handler<Deliverable>,
    pub considerations: Handler<Consideration>,
    pub decisions: DecisionHandler,
    pub problems: Handler<Problem>,
    pub risks: Handler<Risk>,
    pub assumptions: Handler<Assumption>,
    pub constraints: ConstraintHandler,
    pub qualities: Handler<Quality>,
    pub tasks: Handler<Task>,
}

impl Handlers {
    #[must_use]
    pub fn new(store: FileStore, bus: ChangeBus, timeout: Duration) -> Self {
        Self {
            vision: VisionHandler::new(store.clone(), bus.clone(), timeout),
            objectives: Handler::new(store.clone(), bus.clone(), timeout),
            deliverables: Handler::new(store.clone(), bus.clone(), timeout),
            considerations: Handler::new(store.clone(), bus.clone(), timeout),
            decisions: DecisionHandler::new(store.clone(), bus.clone(), timeout),
            problems: Handler::new(store.clone(), bus.clone(), timeout),
            risks: Handler::new(store.clone(), bus.clone(), timeout),
            assumptions: Handler::new(store.clone(), bus.clone(), timeout),
            constraints: ConstraintHandler::new(store.clone(), bus.clone(), timeout),
            qualities: Handler::new(store.clone(), bus.clone(), timeout),
            tasks: Handler::new(store, bus, timeout),
        }
    }

    /// Reference fields every entity in the store carries, grouped by
    /// `(kind, id)` of the referrer. Used by `list_references_to` and
    /// `IntegrityChecker`.
    fn all_references(&self) -> Result<Vec<(Kind, String, Vec<(Kind, String)>)>> {
        let mut out = Vec::new();
        if let Ok(vision) = self.vision.get() {
            out.push((Kind::Vision, vision.envelope.id.clone(), vision.references()));
        }
        for o in self.objectives.list()? {
            out.push((Kind::Objective, o.envelope.id.clone(), o.references()));
        }
        for d in self.deliverables.list()? {
            out.push((Kind::Deliverable, d.envelope.id.clone(), d.references()));
        }
        for c in self.considerations.list()? {
            out.push((Kind::Consideration, c.envelope.id.clone(), c.references()));
        }
        for d in self.decisions.list()? {
            out.push((Kind::Decision, d.envelope.id.clone(), d.references()));
        }
        for p in self.problems.list()? {
            out.push((Kind::Problem, p.envelope.id.clone(), p.references()));
        }
        for r in self.risks.list()? {
            out.push((Kind::Risk, r.envelope.id.clone(), r.references()));
        }
        for a in self.assumptions.list()? {
            out.push((Kind::Assumption, a.envelope.id.clone(), a.references()));
        }
        for c in self.constraints.list()? {
            out.push((Kind::Constraint, c.envelope.id.clone(), c.references()));
        }
        for q in self.qualities.list()? {
            out.push((Kind::Quality, q.envelope.id.clone(), q.references()));
        }
        for t in self.tasks.list()? {
            out.push((Kind::Task, t.envelope.id.clone(), t.references()));
        }
        Ok(out)
    }

    /// Every `(kind, id)` pair that refers to `(target_kind, target_id)`.
    pub fn list_references_to(&self, target_kind: Kind, target_id: &str) -> Result<Vec<(Kind, String)>> {
        Ok(self
            .all_references()?
            .into_iter()
            .filter_map(|(kind, id, refs)| refs.iter().any(|(k, i)| *k == target_kind && i == target_id).then_some((kind, id)))
            .collect())
    }
}

impl PeerResolver for Handlers {
    fn exists(&self, kind: Kind, target_id: &str) -> Result<bool> {
        Ok(match kind {
            Kind::Vision => target_id == "vision" && self.vision.get().is_ok(),
            Kind::Objective => self.objectives.get(target_id).is_ok(),
            Kind::Deliverable => self.deliverables.get(target_id).is_ok(),
            Kind::Consideration => self.considerations.get(target_id).is_ok(),
            Kind::Decision => self.decisions.get(target_id).is_ok(),
            Kind::Problem => self.problems.get(target_id).is_ok(),
            Kind::Risk => self.risks.get(target_id).is_ok(),
            Kind::Assumption => self.assumptions.get(target_id).is_ok(),
            Kind::Constraint => self.constraints.get(target_id).is_ok(),
            Kind::Quality => self.qualities.get(target_id).is_ok(),
            Kind::Task => self.tasks.get(target_id).is_ok(),
            Kind::Approval => false,
        })
    }

    fn kind_of(&self, target_id: &str) -> Result<Option<Kind>> {
        if target_id == "vision" {
            return Ok(self.exists(Kind::Vision, target_id)?.then_some(Kind::Vision));
        }
        for kind in Kind::ALL {
            if kind == Kind::Vision || kind == Kind::Approval {
                continue;
            }
            if id::is_valid(kind, target_id) && self.exists(kind, target_id)? {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn handlers() -> (TempDir, Handlers) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, Handlers::new(store, ChangeBus::new(1), Duration::from_secs(1)))
    }

    #[test]
    fn resolves_existing_objective_and_reports_wrong_kind() {
        let (_d, h) = handlers();
        let created = h.objectives.add(|id, now| Objective::new(id, "O".into(), now), &h).unwrap();
        assert!(h.exists(Kind::Objective, &created.envelope.id).unwrap());
        assert_eq!(h.kind_of(&created.envelope.id).unwrap(), Some(Kind::Objective));
    }

    #[test]
    fn list_references_to_finds_referrer() {
        let (_d, h) = handlers();
        let objective = h.objectives.add(|id, now| Objective::new(id, "O".into(), now), &h).unwrap();
        let parent_id = objective.envelope.id.clone();
        h.deliverables
            .add(|id, now| Deliverable::new(id, "D".into(), parent_id.clone(), now), &h)
            .unwrap();
        let refs = h.list_references_to(Kind::Objective, &objective.envelope.id).unwrap();
        assert_eq!(refs, vec![(Kind::Deliverable, "del-001".to_string())]);
    }
}
