//! Black-box scenarios exercising `Store` end to end, over a fresh
//! `tempfile::TempDir` project root each time.

use std::path::Path;

use tempfile::TempDir;
use zeus::approval_queue::Outcome;
use zeus::codec::Record;
use zeus::error::ZeusError;
use zeus::integrity::Finding;
use zeus::model::Kind;
use zeus::snapshot::SnapshotManager;
use zeus::store::{INIT_DIRECTORIES, Store};

fn applied(outcome: Outcome) -> Record {
    match outcome {
        Outcome::Applied(record) => record,
        Outcome::Pending(id) => panic!("expected immediate apply, got pending approval {id}"),
    }
}

/// Scenario 1: `init` lays out every directory; `status` reports a health
/// line.
#[test]
fn basic_flow_inits_layout_and_reports_health() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    for name in INIT_DIRECTORIES {
        assert!(dir.path().join(name).is_dir(), "missing directory {name}");
    }

    let rollup = zeus::rollup::compute(&store.handlers, 0).unwrap();
    assert_eq!(rollup.health(), "healthy");
}

/// Scenario 2: adding a Deliverable against a nonexistent Objective is
/// rejected as a validation/reference failure (exit code 1, not 2), and
/// nothing is written.
#[test]
fn reference_gate_rejects_dangling_objective() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut payload = Record::new();
    payload.set("title", "X");
    payload.set("objective", "obj-999");

    let err = store.approvals.add(Kind::Deliverable, payload, "tester".into()).unwrap_err();
    assert!(matches!(err, ZeusError::Validation { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("not found"));

    let entries = std::fs::read_dir(dir.path().join("deliverables")).unwrap().count();
    assert_eq!(entries, 0);
}

/// Scenario 3: a Decision, once created, cannot be updated or deleted.
#[test]
fn decision_is_immutable_after_creation() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut objective = Record::new();
    objective.set("title", "O");
    let obj = applied(store.approvals.add(Kind::Objective, objective, "tester".into()).unwrap());
    let obj_id = obj.get("id").unwrap().to_string();
    assert_eq!(obj_id, "obj-001");

    let mut consideration = Record::new();
    consideration.set("title", "C");
    consideration.set("objective", obj_id);
    let con = applied(store.approvals.add(Kind::Consideration, consideration, "tester".into()).unwrap());
    let con_id = con.get("id").unwrap().to_string();
    assert_eq!(con_id, "con-001");

    let mut decision = Record::new();
    decision.set("title", "D");
    decision.set("consideration", con_id);
    decision.set("selected_option_id", "opt-1");
    decision.set("selected_title", "A");
    decision.set("rationale", "r");
    let dec = applied(store.approvals.add(Kind::Decision, decision, "tester".into()).unwrap());
    let dec_id = dec.get("id").unwrap().to_string();
    assert_eq!(dec_id, "dec-001");

    let mut patch = Record::new();
    patch.set("title", "D2");
    let err = store.approvals.update(Kind::Decision, dec_id.clone(), patch, "tester".into()).unwrap_err();
    assert!(matches!(err, ZeusError::Immutable { .. }));

    let err = store.approvals.delete(Kind::Decision, dec_id, "tester".into()).unwrap_err();
    assert!(matches!(err, ZeusError::Immutable { .. }));
}

/// Scenario 4: risk score is derived from probability x impact, never set
/// directly.
#[test]
fn risk_score_is_derived_from_probability_and_impact() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut first = Record::new();
    first.set("title", "R");
    first.set("probability", "medium");
    first.set("impact", "high");
    let r1 = applied(store.approvals.add(Kind::Risk, first, "tester".into()).unwrap());
    assert_eq!(r1.get("score"), Some("high"));

    let mut second = Record::new();
    second.set("title", "R2");
    second.set("probability", "critical");
    second.set("impact", "low");
    let r2 = applied(store.approvals.add(Kind::Risk, second, "tester".into()).unwrap());
    assert_eq!(r2.get("score"), Some("high"));
}

/// Scenario 5: a cycle introduced behind the store's back (simulating an
/// external edit) is caught by `doctor`, not by any single Add/Update.
#[test]
fn doctor_detects_objective_parent_cycle() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut a = Record::new();
    a.set("title", "A");
    let a = applied(store.approvals.add(Kind::Objective, a, "tester".into()).unwrap());
    let a_id = a.get("id").unwrap().to_string();

    let mut b = Record::new();
    b.set("title", "B");
    b.set("parent", a_id.clone());
    let b = applied(store.approvals.add(Kind::Objective, b, "tester".into()).unwrap());
    let b_id = b.get("id").unwrap().to_string();

    // External edit: set A's parent to B, forming a cycle the single Add
    // that created A could never have seen.
    let path = dir.path().join("objectives").join(&a_id);
    let text = std::fs::read_to_string(&path).unwrap();
    let text = format!("{text}parent: {b_id}\n");
    std::fs::write(&path, text).unwrap();

    let findings = zeus::integrity::run(&store.handlers).unwrap();
    assert!(
        findings.iter().any(|f| matches!(f, Finding::Cycle { path } if path.contains(&a_id) && path.contains(&b_id))),
        "expected a cycle finding naming both {a_id} and {b_id}, got {findings:?}"
    );
}

/// Scenario 6: a restore brings back a snapshot's state and leaves a
/// `pre-restore` safety snapshot behind.
#[test]
fn snapshot_restore_round_trips_and_leaves_safety_copy() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut t1 = Record::new();
    t1.set("title", "T1");
    applied(store.approvals.add(Kind::Task, t1, "tester".into()).unwrap());

    let manager = SnapshotManager::new(store.files().clone(), store.config.lock_timeout());
    let snapshot = manager.create("s1").unwrap();

    let mut t2 = Record::new();
    t2.set("title", "T2");
    applied(store.approvals.add(Kind::Task, t2, "tester".into()).unwrap());

    manager.restore(&snapshot.timestamp).unwrap();

    let remaining: Vec<_> = std::fs::read_dir(dir.path().join("tasks"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(remaining.len(), 1);

    let snapshots: Vec<_> = manager.list().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().any(|s| s.label == "s1"));
    assert!(snapshots.iter().any(|s| s.label == "pre-restore"));
}

/// Deleting an entity still referenced elsewhere is rejected, not silently
/// allowed to dangle (`spec.md` §4.4's inbound-reference gate).
#[test]
fn delete_is_rejected_while_referenced() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut objective = Record::new();
    objective.set("title", "O");
    let obj = applied(store.approvals.add(Kind::Objective, objective, "tester".into()).unwrap());
    let obj_id = obj.get("id").unwrap().to_string();

    let mut deliverable = Record::new();
    deliverable.set("title", "D");
    deliverable.set("objective", obj_id.clone());
    applied(store.approvals.add(Kind::Deliverable, deliverable, "tester".into()).unwrap());

    let err = store.approvals.delete(Kind::Objective, obj_id, "tester".into()).unwrap_err();
    assert!(matches!(err, ZeusError::Conflict { .. }));
}

/// A record file is byte-identical after a load+save round trip when
/// nothing changed (`spec.md` §6.1's record-grammar stability guarantee).
#[test]
fn record_round_trips_byte_identical_when_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut objective = Record::new();
    objective.set("title", "Stable");
    applied(store.approvals.add(Kind::Objective, objective, "tester".into()).unwrap());

    let path = dir.path().join("objectives").join("obj-001");
    let before = std::fs::read_to_string(&path).unwrap();

    let fetched = store.handlers.objectives.get("obj-001").unwrap();
    let rewritten = zeus::model::Entity::to_record(&fetched).to_text();
    assert_eq!(before, rewritten);
}

/// `find_root` walks up from a nested directory to locate the sentinel
/// file `init` writes (`spec.md` §6.4).
#[test]
fn find_root_walks_up_to_sentinel() {
    let dir = TempDir::new().unwrap();
    Store::init(dir.path()).unwrap();
    let nested = dir.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    let found = Store::find_root(&nested).unwrap();
    assert_eq!(found, dir.path());
}

#[test]
fn find_root_returns_none_outside_any_project() {
    let dir = TempDir::new().unwrap();
    assert_eq!(Store::find_root(dir.path()), None);
}

/// Manual approval mode queues mutations instead of applying them, and
/// `approve` replays the queued request.
#[test]
fn manual_mode_queues_and_approve_replays() {
    let dir = TempDir::new().unwrap();
    Store::init(dir.path()).unwrap();

    // Flip to manual mode via config.toml directly, then reopen the store
    // so ApprovalQueue picks up the new mode.
    let toml_path = dir.path().join("config.toml");
    let mut contents = std::fs::read_to_string(&toml_path).unwrap_or_default();
    if !contents.contains("approval_mode") {
        contents.push_str("approval_mode = \"manual\"\n");
    } else {
        contents = contents.replace("approval_mode = \"auto\"", "approval_mode = \"manual\"");
    }
    std::fs::write(&toml_path, contents).unwrap();
    let store = Store::open(dir.path()).unwrap();

    let mut objective = Record::new();
    objective.set("title", "Queued");
    let outcome = store.approvals.add(Kind::Objective, objective, "tester".into()).unwrap();
    let approval_id = match outcome {
        Outcome::Pending(id) => id,
        Outcome::Applied(_) => panic!("expected manual mode to queue the request"),
    };

    assert_eq!(store.approvals.list_pending().unwrap().len(), 1);
    let applied_record = store.approvals.approve(&approval_id).unwrap();
    assert_eq!(applied_record.get("title"), Some("Queued"));
    assert_eq!(store.approvals.list_pending().unwrap().len(), 0);
    assert!(store.handlers.objectives.get("obj-001").is_ok());
}

/// A Consideration and the Decision naming it as resolved can independently
/// validate yet disagree about the pairing once one side is edited out from
/// under the store — `doctor` is the only place that can catch this.
#[test]
fn doctor_detects_decision_consideration_back_reference_mismatch() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();

    let mut objective = Record::new();
    objective.set("title", "O");
    let obj = applied(store.approvals.add(Kind::Objective, objective, "tester".into()).unwrap());
    let obj_id = obj.get("id").unwrap().to_string();

    let mut consideration = Record::new();
    consideration.set("title", "C");
    consideration.set("objective", obj_id);
    let con = applied(store.approvals.add(Kind::Consideration, consideration, "tester".into()).unwrap());
    let con_id = con.get("id").unwrap().to_string();

    let mut decision = Record::new();
    decision.set("title", "D");
    decision.set("consideration", con_id.clone());
    decision.set("selected_option_id", "opt-1");
    decision.set("selected_title", "A");
    decision.set("rationale", "r");
    let dec = applied(store.approvals.add(Kind::Decision, decision, "tester".into()).unwrap());
    let dec_id = dec.get("id").unwrap().to_string();

    // External edit: clear the consideration's back-pointer, as if it had
    // never been frozen by the decision that names it.
    let path = dir.path().join("considerations").join(&con_id);
    let text = std::fs::read_to_string(&path).unwrap();
    let text: String = text.lines().filter(|l| !l.starts_with("decision:")).map(|l| format!("{l}\n")).collect();
    std::fs::write(&path, text).unwrap();

    let findings = zeus::integrity::run(&store.handlers).unwrap();
    assert!(
        findings.iter().any(|f| matches!(
            f,
            Finding::BackReferenceMismatch { consideration_id, decision_id: d, .. }
            if consideration_id == &con_id && d == &dec_id
        )),
        "expected a back-reference mismatch naming {con_id} and {dec_id}, got {findings:?}"
    );
}

#[test]
fn unsafe_path_components_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = Store::init(dir.path()).unwrap();
    let err = store.files().read_to_string(Path::new("../escape")).unwrap_err();
    assert!(matches!(err, ZeusError::UnsafePath(_)));
}
