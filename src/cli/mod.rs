//! Command-line interface (`spec.md` §6.2): a `clap::Parser` with one
//! `Subcommand` per command family, the thinnest layer over `Store` that
//! can still exercise every operation end-to-end. Argument-parsing depth
//! and help rendering are explicitly out of scope; this module is kept
//! small on purpose.

mod format;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::approval_queue::Outcome;
use crate::codec::Record;
use crate::error::{Result, ZeusError};
use crate::integrity;
use crate::model::Kind;
use crate::rollup;
use crate::snapshot::SnapshotManager;
use crate::store::Store;

#[derive(Debug, Parser)]
#[command(name = "zeus", about = "A file-backed project-planning knowledge base")]
pub struct Cli {
    /// Project root; defaults to walking up from the current directory for
    /// the `.lock` sentinel (`spec.md` §6.4).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Who is making this request, recorded on queued approvals.
    #[arg(long, global = true, default_value = "cli")]
    requester: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the on-disk project layout in the current (or `--root`) directory.
    Init,
    /// Create an entity.
    Add {
        #[arg(value_enum)]
        kind: KindArg,
        title: String,
        #[command(flatten)]
        fields: EntityFields,
    },
    /// Patch an existing entity; only supplied flags change.
    Update {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
        #[command(flatten)]
        fields: EntityFields,
    },
    /// Delete an entity, rejected if anything still references it.
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Print one entity's record.
    Get {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Print every record of a kind, in insertion order.
    List {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Print the whole-project rollup and health.
    Status,
    /// Run the integrity checker and report findings.
    Doctor,
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    /// Approve a pending request, replaying it.
    Approve { id: String },
    /// Reject a pending request without applying it.
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// List every pending approval request.
    Pending,
    /// Print the reference graph.
    Graph {
        #[arg(long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
    /// Print a rollup + integrity report.
    Report {
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Serve the read-only dashboard (roll-ups, lists, and a push stream).
    Dashboard {
        #[arg(long, default_value = "127.0.0.1:4170")]
        addr: String,
    },
}

#[derive(Debug, Subcommand)]
enum SnapshotCommand {
    Create { label: String },
    List,
    Restore { timestamp: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_possible_value().unwrap().get_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Html,
    Markdown,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_possible_value().unwrap().get_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
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
}

impl KindArg {
    fn to_domain(self) -> Kind {
        match self {
            Self::Vision => Kind::Vision,
            Self::Objective => Kind::Objective,
            Self::Deliverable => Kind::Deliverable,
            Self::Consideration => Kind::Consideration,
            Self::Decision => Kind::Decision,
            Self::Problem => Kind::Problem,
            Self::Risk => Kind::Risk,
            Self::Assumption => Kind::Assumption,
            Self::Constraint => Kind::Constraint,
            Self::Quality => Kind::Quality,
            Self::Task => Kind::Task,
        }
    }
}

/// Every flag `add`/`update` accept; which ones matter depends on kind
/// (`spec.md` §6.2: "recognized per kind"). Unrecognized data for a kind is
/// simply absent from that kind's patch contract, since `Entity::apply_patch`
/// reads only the keys it knows about.
#[derive(Debug, Clone, clap::Args)]
pub struct EntityFields {
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    objective: Option<String>,
    #[arg(long)]
    deliverable: Option<String>,
    #[arg(long)]
    parent: Option<String>,
    #[arg(long)]
    wbs: Option<String>,
    #[arg(long)]
    probability: Option<String>,
    #[arg(long)]
    impact: Option<String>,
    #[arg(long)]
    severity: Option<String>,
    /// Repeatable, `name:target:unit` (current_status defaults to `tracking`).
    #[arg(long = "metric")]
    metrics: Vec<String>,
    /// Repeatable option title for a Consideration.
    #[arg(long = "option")]
    options: Vec<String>,
    /// Consideration id a Decision resolves.
    #[arg(long)]
    consideration: Option<String>,
    #[arg(long = "option-id")]
    option_id: Option<String>,
    #[arg(long = "option-title")]
    option_title: Option<String>,
    #[arg(long)]
    rationale: Option<String>,
}

impl EntityFields {
    /// Builds the patch/payload record `ApprovalQueue` expects, carrying
    /// only the fields actually supplied.
    fn into_record(self, title: Option<&str>) -> Result<Record> {
        let mut record = Record::new();
        if let Some(title) = title {
            record.set("title", title);
        }
        if let Some(v) = self.description {
            record.set("description", v);
        }
        if let Some(v) = self.status {
            record.set("status", v);
        }
        if let Some(v) = self.objective {
            record.set("objective", v);
        }
        if let Some(v) = self.deliverable {
            record.set("deliverable", v);
        }
        if let Some(v) = self.parent {
            record.set("parent", v);
        }
        if let Some(v) = self.wbs {
            record.set("wbs", v);
        }
        if let Some(v) = self.probability {
            record.set("probability", v);
        }
        if let Some(v) = self.impact {
            record.set("impact", v);
        }
        if let Some(v) = self.severity {
            record.set("severity", v);
        }
        if let Some(v) = self.consideration {
            record.set("consideration", v);
        }
        if let Some(v) = self.option_id {
            record.set("selected_option_id", v);
        }
        if let Some(v) = self.option_title {
            record.set("selected_title", v);
        }
        if let Some(v) = self.rationale {
            record.set("rationale", v);
        }
        if !self.metrics.is_empty() {
            record.set_block("metrics", self.metrics.iter().map(|m| parse_metric(m)).collect::<Result<Vec<_>>>()?);
        }
        if !self.options.is_empty() {
            record.set_block(
                "options",
                self.options
                    .iter()
                    .enumerate()
                    .map(|(i, title)| {
                        let mut r = Record::new();
                        r.set("id", format!("opt-{}", i + 1));
                        r.set("title", title.clone());
                        r
                    })
                    .collect(),
            );
        }
        Ok(record)
    }
}

/// Parses `name:target:unit`, defaulting `current_status` to `tracking`
/// (`spec.md` §3.2's Quality metric shape).
fn parse_metric(raw: &str) -> Result<Record> {
    let parts: Vec<&str> = raw.splitn(3, ':').collect();
    let [name, target, unit] = parts[..] else {
        return Err(ZeusError::Validation {
            kind: Kind::Quality,
            message: format!("malformed --metric `{raw}`, expected name:target:unit"),
        });
    };
    target.parse::<f64>().map_err(|_| ZeusError::Validation {
        kind: Kind::Quality,
        message: format!("metric target `{target}` is not numeric"),
    })?;
    let mut record = Record::new();
    record.set("name", name);
    record.set("target", target);
    record.set("unit", unit);
    record.set("current_status", "tracking");
    Ok(record)
}

/// Parses `argv`. Split out from [`run`] so `main` can inspect the result
/// (root override, whether this is `init`) before deciding how to open the
/// store.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// The root a parsed invocation should operate on: `--root` if given,
/// otherwise the project root discovered by walking up from `start`
/// (`spec.md` §6.4), falling back to `start` itself for `init`.
#[must_use]
pub fn resolve_root(cli: &Cli, start: &std::path::Path) -> PathBuf {
    cli.root.clone().unwrap_or_else(|| Store::find_root(start).unwrap_or_else(|| start.to_path_buf()))
}

#[must_use]
pub fn is_init(cli: &Cli) -> bool {
    matches!(cli.command, Command::Init)
}

/// Dispatches a parsed invocation against an already-opened (or
/// just-initialized) `store`, returning the process exit code (0 on
/// success; non-zero exit codes other than `doctor`'s §6.2 integrity-report
/// code come from `ZeusError::exit_code` via `?`).
pub fn run(cli: &Cli, store: &Store) -> Result<i32> {
    match &cli.command {
        Command::Init => {
            println!("initialized project at {}", store.root().display());
            Ok(0)
        }
        Command::Add { kind, title, fields } => {
            let payload = fields.clone().into_record(Some(title))?;
            let outcome = store.approvals.add(kind.to_domain(), payload, cli.requester.clone())?;
            print_outcome(&outcome);
            Ok(0)
        }
        Command::Update { kind, id, fields } => {
            let patch = fields.clone().into_record(None)?;
            let outcome = store.approvals.update(kind.to_domain(), id.clone(), patch, cli.requester.clone())?;
            print_outcome(&outcome);
            Ok(0)
        }
        Command::Delete { kind, id } => {
            let outcome = store.approvals.delete(kind.to_domain(), id.clone(), cli.requester.clone())?;
            print_outcome(&outcome);
            Ok(0)
        }
        Command::Get { kind, id } => {
            let record = get_record(store, kind.to_domain(), id)?;
            print!("{}", record.to_text());
            Ok(0)
        }
        Command::List { kind } => {
            let rows = list_rows(store, kind.to_domain())?;
            print!("{}", format::format_list(kind.to_domain(), &rows));
            Ok(0)
        }
        Command::Status => {
            let rollup = rollup::compute(&store.handlers, store.approvals.list_pending()?.len())?;
            print!("{}", format::format_status(&rollup));
            Ok(0)
        }
        Command::Doctor => {
            let findings = integrity::run(&store.handlers)?;
            print!("{}", format::format_doctor(&findings));
            Ok(if findings.is_empty() { 0 } else { 4 })
        }
        Command::Snapshot(cmd) => cmd_snapshot(store, cmd),
        Command::Approve { id } => {
            let record = store.approvals.approve(id)?;
            print!("{}", record.to_text());
            Ok(0)
        }
        Command::Reject { id, reason } => {
            store.approvals.reject(id, reason)?;
            println!("rejected {id}");
            Ok(0)
        }
        Command::Pending => {
            let pending = store.approvals.list_pending()?;
            println!("{} pending", pending.len());
            for p in pending {
                println!("{}\t{}\t{}\t{}", p.id, p.target_kind, p.operation.as_str(), p.requester);
            }
            Ok(0)
        }
        Command::Graph { format: fmt } => {
            let (nodes, edges) = collect_graph(store)?;
            print!("{}", format::format_graph(&nodes, &edges, *fmt));
            Ok(0)
        }
        Command::Report { format: fmt } => {
            let rollup = rollup::compute(&store.handlers, store.approvals.list_pending()?.len())?;
            let findings = integrity::run(&store.handlers)?;
            print!("{}", format::format_report(&rollup, &findings, *fmt));
            Ok(0)
        }
        Command::Dashboard { addr } => {
            let dashboard = crate::dashboard::Dashboard::new(store.clone());
            dashboard.serve(addr)?;
            Ok(0)
        }
    }
}

fn cmd_snapshot(store: &Store, cmd: &SnapshotCommand) -> Result<i32> {
    let manager = SnapshotManager::new(store.files().clone(), store.config.lock_timeout());
    match cmd {
        SnapshotCommand::Create { label } => {
            let info = manager.create(label)?;
            println!("created {}", info.name);
        }
        SnapshotCommand::List => {
            for info in manager.list()? {
                println!("{}\t{}\t{} files\t{} bytes", info.timestamp, info.label, info.manifest.file_count, info.manifest.byte_count);
            }
        }
        SnapshotCommand::Restore { timestamp } => {
            let info = manager.restore(timestamp)?;
            println!("restored {}", info.name);
        }
    }
    Ok(0)
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Applied(record) => print!("{}", record.to_text()),
        Outcome::Pending(id) => println!("pending approval {id}"),
    }
}

fn get_record(store: &Store, kind: Kind, id: &str) -> Result<Record> {
    use crate::model::Entity;
    let h = &store.handlers;
    Ok(match kind {
        Kind::Vision => h.vision.get()?.to_record(),
        Kind::Objective => h.objectives.get(id)?.to_record(),
        Kind::Deliverable => h.deliverables.get(id)?.to_record(),
        Kind::Consideration => h.considerations.get(id)?.to_record(),
        Kind::Decision => h.decisions.get(id)?.to_record(),
        Kind::Problem => h.problems.get(id)?.to_record(),
        Kind::Risk => h.risks.get(id)?.to_record(),
        Kind::Assumption => h.assumptions.get(id)?.to_record(),
        Kind::Constraint => h.constraints.get(id)?.to_record(),
        Kind::Quality => h.qualities.get(id)?.to_record(),
        Kind::Task => h.tasks.get(id)?.to_record(),
        Kind::Approval => return Err(ZeusError::Validation { kind, message: "use `pending` to inspect approvals".into() }),
    })
}

fn list_rows(store: &Store, kind: Kind) -> Result<Vec<format::Row>> {
    use crate::model::StatusEnum;
    let h = &store.handlers;
    Ok(match kind {
        Kind::Vision => h.vision.get().map(|v| vec![(v.envelope.id, v.envelope.title, v.status.canonical().to_string())]).unwrap_or_default(),
        Kind::Objective => h.objectives.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Deliverable => h.deliverables.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Consideration => h.considerations.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Decision => h.decisions.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, String::new())).collect(),
        Kind::Problem => h.problems.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Risk => h.risks.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Assumption => h.assumptions.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Constraint => h.constraints.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Quality => h.qualities.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Task => h.tasks.list()?.into_iter().map(|e| (e.envelope.id, e.envelope.title, e.status.canonical().to_string())).collect(),
        Kind::Approval => store
            .approvals
            .list_pending()?
            .into_iter()
            .map(|p| (p.id, p.target_kind.to_string(), p.operation.as_str().to_string()))
            .collect(),
    })
}

#[allow(clippy::type_complexity)]
fn collect_graph(store: &Store) -> Result<(Vec<(Kind, String, String)>, Vec<((Kind, String), (Kind, String))>)> {
    use crate::model::{Entity, StatusEnum};
    let h = &store.handlers;
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    if let Ok(v) = h.vision.get() {
        nodes.push((Kind::Vision, v.envelope.id.clone(), v.envelope.title.clone()));
    }
    for o in h.objectives.list()? {
        nodes.push((Kind::Objective, o.envelope.id.clone(), o.envelope.title.clone()));
        for (tk, tid) in o.references() {
            edges.push(((Kind::Objective, o.envelope.id.clone()), (tk, tid)));
        }
    }
    for d in h.deliverables.list()? {
        nodes.push((Kind::Deliverable, d.envelope.id.clone(), d.envelope.title.clone()));
        for (tk, tid) in d.references() {
            edges.push(((Kind::Deliverable, d.envelope.id.clone()), (tk, tid)));
        }
    }
    for c in h.considerations.list()? {
        nodes.push((Kind::Consideration, c.envelope.id.clone(), c.envelope.title.clone()));
        for (tk, tid) in c.references() {
            edges.push(((Kind::Consideration, c.envelope.id.clone()), (tk, tid)));
        }
    }
    for d in h.decisions.list()? {
        nodes.push((Kind::Decision, d.envelope.id.clone(), d.envelope.title.clone()));
        for (tk, tid) in d.references() {
            edges.push(((Kind::Decision, d.envelope.id.clone()), (tk, tid)));
        }
    }
    for p in h.problems.list()? {
        nodes.push((Kind::Problem, p.envelope.id.clone(), p.envelope.title.clone()));
        for (tk, tid) in p.references() {
            edges.push(((Kind::Problem, p.envelope.id.clone()), (tk, tid)));
        }
    }
    for r in h.risks.list()? {
        nodes.push((Kind::Risk, r.envelope.id.clone(), r.envelope.title.clone()));
        for (tk, tid) in r.references() {
            edges.push(((Kind::Risk, r.envelope.id.clone()), (tk, tid)));
        }
    }
    for a in h.assumptions.list()? {
        nodes.push((Kind::Assumption, a.envelope.id.clone(), a.envelope.title.clone()));
        for (tk, tid) in a.references() {
            edges.push(((Kind::Assumption, a.envelope.id.clone()), (tk, tid)));
        }
    }
    for c in h.constraints.list()? {
        nodes.push((Kind::Constraint, c.envelope.id.clone(), c.envelope.title.clone()));
    }
    for q in h.qualities.list()? {
        nodes.push((Kind::Quality, q.envelope.id.clone(), q.envelope.title.clone()));
        for (tk, tid) in q.references() {
            edges.push(((Kind::Quality, q.envelope.id.clone()), (tk, tid)));
        }
    }
    for t in h.tasks.list()? {
        nodes.push((Kind::Task, t.envelope.id.clone(), t.envelope.title.clone()));
        for (tk, tid) in t.references() {
            edges.push(((Kind::Task, t.envelope.id.clone()), (tk, tid)));
        }
    }
    Ok((nodes, edges))
}
