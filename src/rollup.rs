//! RollupEngine (`spec.md` §2, C9): derives status/progress aggregates over
//! the entity graph, read-only, recomputed on demand for `status`, `report`,
//! and the dashboard's summary endpoint.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::handlers::Handlers;
use crate::model::{Kind, Likelihood, ProblemStatus, RiskStatus, StatusEnum};

/// Per-kind counts: total records and a breakdown by canonical status.
#[derive(Debug, Clone, Default)]
pub struct KindRollup {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
}

fn tally<'a>(statuses: impl Iterator<Item = &'a str>) -> KindRollup {
    let mut rollup = KindRollup::default();
    for s in statuses {
        rollup.total += 1;
        *rollup.by_status.entry(s.to_string()).or_insert(0) += 1;
    }
    rollup
}

/// Whole-project aggregate (`spec.md` §6.2's `status` command).
#[derive(Debug, Clone)]
pub struct Rollup {
    pub by_kind: BTreeMap<Kind, KindRollup>,
    pub open_problems: usize,
    pub critical_problems: usize,
    pub open_risks: usize,
    pub critical_risks: usize,
    pub pending_approvals: usize,
}

impl Rollup {
    /// A coarse health label driving `status`'s headline (`spec.md` §8
    /// scenario 1 expects the word `Health:` in the output).
    #[must_use]
    pub fn health(&self) -> &'static str {
        if self.critical_risks > 0 || self.critical_problems > 0 {
            "unhealthy"
        } else if self.open_problems > 0 || self.open_risks > 0 || self.pending_approvals > 0 {
            "attention"
        } else {
            "healthy"
        }
    }
}

/// Computes a fresh rollup from the current store state. `pending_approvals`
/// is passed in rather than read here, since it comes from `ApprovalQueue`
/// and `Rollup` is scoped to the entity graph `Handlers` owns.
pub fn compute(handlers: &Handlers, pending_approvals: usize) -> Result<Rollup> {
    let mut by_kind = BTreeMap::new();

    if let Ok(vision) = handlers.vision.get() {
        by_kind.insert(Kind::Vision, tally(std::iter::once(vision.status.canonical())));
    }

    let objectives = handlers.objectives.list()?;
    by_kind.insert(Kind::Objective, tally(objectives.iter().map(|o| o.status.canonical())));

    let deliverables = handlers.deliverables.list()?;
    by_kind.insert(Kind::Deliverable, tally(deliverables.iter().map(|d| d.status.canonical())));

    let considerations = handlers.considerations.list()?;
    by_kind.insert(Kind::Consideration, tally(considerations.iter().map(|c| c.status.canonical())));

    let decisions = handlers.decisions.list()?;
    by_kind.insert(Kind::Decision, KindRollup {
        total: decisions.len(),
        by_status: BTreeMap::new(),
    });

    let problems = handlers.problems.list()?;
    let open_problems = problems.iter().filter(|p| p.status == ProblemStatus::Open).count();
    let critical_problems = problems
        .iter()
        .filter(|p| p.status == ProblemStatus::Open && p.severity.canonical() == "critical")
        .count();
    by_kind.insert(Kind::Problem, tally(problems.iter().map(|p| p.status.canonical())));

    let risks = handlers.risks.list()?;
    let open_risks = risks.iter().filter(|r| r.status == RiskStatus::Open).count();
    let critical_risks = risks
        .iter()
        .filter(|r| r.status == RiskStatus::Open && r.score() == Likelihood::Critical)
        .count();
    by_kind.insert(Kind::Risk, tally(risks.iter().map(|r| r.status.canonical())));

    let assumptions = handlers.assumptions.list()?;
    by_kind.insert(Kind::Assumption, tally(assumptions.iter().map(|a| a.status.canonical())));

    let constraints = handlers.constraints.list()?;
    by_kind.insert(Kind::Constraint, tally(constraints.iter().map(|c| c.status.canonical())));

    let qualities = handlers.qualities.list()?;
    by_kind.insert(Kind::Quality, tally(qualities.iter().map(|q| q.status.canonical())));

    let tasks = handlers.tasks.list()?;
    by_kind.insert(Kind::Task, tally(tasks.iter().map(|t| t.status.canonical())));

    Ok(Rollup {
        by_kind,
        open_problems,
        critical_problems,
        open_risks,
        critical_risks,
        pending_approvals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeBus;
    use crate::model::{Objective, PeerResolver};
    use crate::store::file::FileStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct AlwaysOk;
    impl PeerResolver for AlwaysOk {
        fn exists(&self, _: Kind, _: &str) -> Result<bool> {
            Ok(true)
        }
        fn kind_of(&self, _: &str) -> Result<Option<Kind>> {
            Ok(None)
        }
    }

    #[test]
    fn counts_objectives_by_status() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let handlers = Handlers::new(store, ChangeBus::new(1), Duration::from_secs(1));
        handlers.objectives.add(|id, now| Objective::new(id, "Ship v1".into(), now), &AlwaysOk).unwrap();
        let rollup = compute(&handlers, 0).unwrap();
        let objectives = &rollup.by_kind[&Kind::Objective];
        assert_eq!(objectives.total, 1);
        assert_eq!(objectives.by_status.get("proposed"), Some(&1));
        assert_eq!(rollup.health(), "healthy");
    }
}
