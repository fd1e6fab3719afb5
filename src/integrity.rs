//! IntegrityChecker (`spec.md` §4.4, §4.5, §9, C5): whole-graph validation
//! run on demand by `doctor`, not on every write — a single Add/Update only
//! sees its own reference fields, never the whole graph, so cycle detection
//! in particular can only happen here.
//!
//! Read-only: findings are reported, nothing is repaired automatically.

use crate::error::Result;
use crate::handlers::Handlers;
use crate::model::{Entity, Kind, PeerResolver};

/// One integrity problem, with enough context to locate and describe it.
/// Ordered by `(kind, id)` so `doctor`'s output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Finding {
    /// A reference field names an id that does not exist at all.
    Dangling {
        kind: Kind,
        id: String,
        field_kind: Kind,
        target_id: String,
    },
    /// A reference field names an id that exists, but under a different
    /// kind than the field expects.
    WrongKind {
        kind: Kind,
        id: String,
        target_id: String,
        expected: Kind,
        actual: Kind,
    },
    /// The Objective parent graph contains a cycle. `path` lists the
    /// objective ids in cycle order, starting and ending at the same id.
    Cycle { path: Vec<String> },
    /// A Consideration and the Decision it points to (or that points back
    /// to it) disagree about the pairing (`spec.md` §9, "back-references
    /// and mutual consistency").
    BackReferenceMismatch {
        consideration_id: String,
        decision_id: String,
        consideration_points_to: Option<String>,
        decision_points_to: String,
    },
}

impl Finding {
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Finding::Dangling { .. } => "dangling reference",
            Finding::WrongKind { .. } => "wrong-kind reference",
            Finding::Cycle { .. } => "cycle",
            Finding::BackReferenceMismatch { .. } => "back-reference mismatch",
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::Dangling { kind, id, field_kind, target_id } => {
                write!(f, "{kind} {id} references missing {field_kind} {target_id}")
            }
            Finding::WrongKind { kind, id, target_id, expected, actual } => {
                write!(f, "{kind} {id} references {target_id} as a {expected} but it is a {actual}")
            }
            Finding::Cycle { path } => write!(f, "cycle in objective parent graph: {}", path.join(" -> ")),
            Finding::BackReferenceMismatch {
                consideration_id,
                decision_id,
                consideration_points_to,
                decision_points_to,
            } => {
                write!(
                    f,
                    "decision {decision_id} points to consideration {decision_points_to}, but consideration {consideration_id} points to decision {}",
                    consideration_points_to.as_deref().unwrap_or("<none>")
                )
            }
        }
    }
}

/// Runs every check over the current state of `handlers` and returns every
/// finding, sorted for deterministic output.
pub fn run(handlers: &Handlers) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    check_references(handlers, &mut findings)?;
    check_objective_cycles(handlers, &mut findings)?;
    check_decision_pairing(handlers, &mut findings)?;
    findings.sort();
    Ok(findings)
}

fn check_references(handlers: &Handlers, findings: &mut Vec<Finding>) -> Result<()> {
    let mut entries: Vec<(Kind, String, Vec<(Kind, String)>)> = Vec::new();
    if let Ok(vision) = handlers.vision.get() {
        entries.push((Kind::Vision, vision.envelope.id.clone(), vision.references()));
    }
    for o in handlers.objectives.list()? {
        entries.push((Kind::Objective, o.envelope.id.clone(), o.references()));
    }
    for d in handlers.deliverables.list()? {
        entries.push((Kind::Deliverable, d.envelope.id.clone(), d.references()));
    }
    for c in handlers.considerations.list()? {
        entries.push((Kind::Consideration, c.envelope.id.clone(), c.references()));
    }
    for d in handlers.decisions.list()? {
        entries.push((Kind::Decision, d.envelope.id.clone(), d.references()));
    }
    for p in handlers.problems.list()? {
        entries.push((Kind::Problem, p.envelope.id.clone(), p.references()));
    }
    for r in handlers.risks.list()? {
        entries.push((Kind::Risk, r.envelope.id.clone(), r.references()));
    }
    for a in handlers.assumptions.list()? {
        entries.push((Kind::Assumption, a.envelope.id.clone(), a.references()));
    }
    for c in handlers.constraints.list()? {
        entries.push((Kind::Constraint, c.envelope.id.clone(), c.references()));
    }
    for q in handlers.qualities.list()? {
        entries.push((Kind::Quality, q.envelope.id.clone(), q.references()));
    }
    for t in handlers.tasks.list()? {
        entries.push((Kind::Task, t.envelope.id.clone(), t.references()));
    }

    for (kind, id, refs) in entries {
        for (field_kind, target_id) in refs {
            if handlers.exists(field_kind, &target_id)? {
                continue;
            }
            match handlers.kind_of(&target_id)? {
                Some(actual) => findings.push(Finding::WrongKind {
                    kind,
                    id: id.clone(),
                    target_id,
                    expected: field_kind,
                    actual,
                }),
                None => findings.push(Finding::Dangling {
                    kind,
                    id: id.clone(),
                    field_kind,
                    target_id,
                }),
            }
        }
    }
    Ok(())
}

/// Checks that every Decision's `consideration` pointer and the
/// Consideration it names agree about the pairing between them
/// (`spec.md` §4.5 category 3, §9). A dangling `consideration` is already
/// reported by `check_references`; this only flags the case where the
/// target exists but disagrees about who resolves whom.
fn check_decision_pairing(handlers: &Handlers, findings: &mut Vec<Finding>) -> Result<()> {
    use std::collections::BTreeSet;

    let considerations = handlers.considerations.list()?;
    let decisions = handlers.decisions.list()?;
    let mut mismatches = BTreeSet::new();

    // A Decision's `consideration` pointer disagreeing with what that
    // Consideration thinks resolved it.
    for decision in &decisions {
        if let Some(consideration) = considerations.iter().find(|c| c.envelope.id == decision.consideration) {
            if consideration.decision.as_deref() != Some(decision.envelope.id.as_str()) {
                mismatches.insert((consideration.envelope.id.clone(), decision.envelope.id.clone()));
            }
        }
    }
    // The reverse: a Consideration's `decision` pointer disagreeing with
    // what that Decision thinks it resolves — catches the case where a
    // Consideration points at a Decision that itself points elsewhere.
    for consideration in &considerations {
        let Some(decision_id) = &consideration.decision else { continue };
        if let Some(decision) = decisions.iter().find(|d| &d.envelope.id == decision_id) {
            if decision.consideration != consideration.envelope.id {
                mismatches.insert((consideration.envelope.id.clone(), decision.envelope.id.clone()));
            }
        }
    }

    for (consideration_id, decision_id) in mismatches {
        let consideration_points_to = considerations.iter().find(|c| c.envelope.id == consideration_id).and_then(|c| c.decision.clone());
        let decision_points_to = decisions
            .iter()
            .find(|d| d.envelope.id == decision_id)
            .map_or_else(String::new, |d| d.consideration.clone());
        findings.push(Finding::BackReferenceMismatch {
            consideration_id,
            decision_id,
            consideration_points_to,
            decision_points_to,
        });
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color DFS over the Objective parent graph (`spec.md` §4.4, §9).
fn check_objective_cycles(handlers: &Handlers, findings: &mut Vec<Finding>) -> Result<()> {
    use std::collections::HashMap;

    let objectives = handlers.objectives.list()?;
    let parent: HashMap<String, Option<String>> = objectives.iter().map(|o| (o.envelope.id.clone(), o.parent.clone())).collect();
    let mut color: HashMap<String, Color> = objectives.iter().map(|o| (o.envelope.id.clone(), Color::White)).collect();
    let mut ids: Vec<String> = objectives.iter().map(|o| o.envelope.id.clone()).collect();
    ids.sort();

    for start in ids {
        if color.get(&start) != Some(&Color::White) {
            continue;
        }
        let mut stack = Vec::new();
        let mut node = start;
        loop {
            match color.get(&node).copied() {
                Some(Color::White) => {
                    color.insert(node.clone(), Color::Gray);
                    stack.push(node.clone());
                    match parent.get(&node).and_then(Clone::clone) {
                        Some(next) if parent.contains_key(&next) => {
                            node = next;
                        }
                        _ => break,
                    }
                }
                Some(Color::Gray) => {
                    let cycle_start = stack.iter().position(|id| *id == node).unwrap_or(0);
                    let mut path = stack[cycle_start..].to_vec();
                    path.push(node.clone());
                    findings.push(Finding::Cycle { path });
                    break;
                }
                _ => break,
            }
        }
        for id in stack {
            color.insert(id, Color::Black);
        }
    }
    Ok(())
}
