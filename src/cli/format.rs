//! Plain-text/dot/mermaid/markdown/html rendering for `list`, `status`,
//! `doctor`, `graph`, and `report` (`spec.md` §6.2). Report templating
//! beyond plain text is out of scope by design — these are the thinnest
//! renderings that still make the other formats parseable.

use crate::integrity::Finding;
use crate::model::Kind;
use crate::rollup::Rollup;

use super::{GraphFormat, ReportFormat};

/// One row in a `list` or `graph` rendering: id, title, canonical status.
pub type Row = (String, String, String);

pub fn format_list(kind: Kind, rows: &[Row]) -> String {
    let mut out = format!("{} {}\n", rows.len(), if rows.len() == 1 { "item" } else { "items" });
    for (id, title, status) in rows {
        out.push_str(&format!("{id}\t{title}\t[{status}]\n"));
        let _ = kind;
    }
    out
}

pub fn format_status(rollup: &Rollup) -> String {
    let mut out = format!("Health: {}\n", rollup.health());
    out.push_str(&format!(
        "Problems: {} open ({} critical)\n",
        rollup.open_problems, rollup.critical_problems
    ));
    out.push_str(&format!("Risks: {} open ({} critical)\n", rollup.open_risks, rollup.critical_risks));
    out.push_str(&format!("Pending approvals: {}\n", rollup.pending_approvals));
    for (kind, kr) in &rollup.by_kind {
        out.push_str(&format!("{kind}: {} total", kr.total));
        if !kr.by_status.is_empty() {
            let parts: Vec<String> = kr.by_status.iter().map(|(s, n)| format!("{s}={n}")).collect();
            out.push_str(&format!(" ({})", parts.join(", ")));
        }
        out.push('\n');
    }
    out
}

pub fn format_doctor(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "0 findings\n".to_string();
    }
    let mut counts = std::collections::BTreeMap::new();
    for f in findings {
        *counts.entry(f.category()).or_insert(0usize) += 1;
    }
    let mut out = format!("{} findings\n", findings.len());
    for (category, n) in &counts {
        out.push_str(&format!("  {category}: {n}\n"));
    }
    for f in findings {
        out.push_str(&format!("- {f}\n"));
    }
    out
}

pub fn format_graph(nodes: &[(Kind, String, String)], edges: &[((Kind, String), (Kind, String))], format: GraphFormat) -> String {
    match format {
        GraphFormat::Text => {
            let mut out = String::new();
            for (kind, id, title) in nodes {
                out.push_str(&format!("{kind} {id}: {title}\n"));
            }
            for ((from_kind, from_id), (to_kind, to_id)) in edges {
                out.push_str(&format!("{from_kind} {from_id} -> {to_kind} {to_id}\n"));
            }
            out
        }
        GraphFormat::Dot => {
            let mut out = String::from("digraph zeus {\n");
            for (kind, id, title) in nodes {
                out.push_str(&format!("  \"{id}\" [label=\"{kind} {id}\\n{}\"];\n", escape_quotes(title)));
            }
            for ((_, from_id), (_, to_id)) in edges {
                out.push_str(&format!("  \"{from_id}\" -> \"{to_id}\";\n"));
            }
            out.push_str("}\n");
            out
        }
        GraphFormat::Mermaid => {
            let mut out = String::from("graph TD\n");
            for (kind, id, title) in nodes {
                out.push_str(&format!("  {id}[\"{kind} {id}: {}\"]\n", escape_brackets(title)));
            }
            for ((_, from_id), (_, to_id)) in edges {
                out.push_str(&format!("  {from_id} --> {to_id}\n"));
            }
            out
        }
    }
}

pub fn format_report(rollup: &Rollup, findings: &[Finding], format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => {
            let mut out = format_status(rollup);
            out.push('\n');
            out.push_str(&format_doctor(findings));
            out
        }
        ReportFormat::Markdown => {
            let mut out = format!("# Zeus report\n\n**Health:** {}\n\n## Rollup\n\n", rollup.health());
            for (kind, kr) in &rollup.by_kind {
                out.push_str(&format!("- **{kind}**: {} total\n", kr.total));
            }
            out.push_str(&format!("\n## Integrity\n\n{} findings\n", findings.len()));
            for f in findings {
                out.push_str(&format!("- {f}\n"));
            }
            out
        }
        ReportFormat::Html => {
            let mut out = format!("<h1>Zeus report</h1><p>Health: {}</p><ul>", rollup.health());
            for (kind, kr) in &rollup.by_kind {
                out.push_str(&format!("<li>{kind}: {} total</li>", kr.total));
            }
            out.push_str("</ul><h2>Integrity</h2><ul>");
            for f in findings {
                out.push_str(&format!("<li>{f}</li>"));
            }
            out.push_str("</ul>");
            out
        }
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "'")
}

fn escape_brackets(s: &str) -> String {
    s.replace(['[', ']'], "")
}
