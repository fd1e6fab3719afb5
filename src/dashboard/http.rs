//! Read-only HTTP surface over the store, plus the push stream
//! (`spec.md` §4.8, §6.3). Built on `tiny_http` rather than a full async
//! stack: the dashboard is a thin reflector with one push channel, not a
//! general web service.

use std::io::Read;

use serde_json::json;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::error::{Result, ZeusError};
use crate::integrity;
use crate::model::Kind;
use crate::rollup;
use crate::store::Store;

use super::protocol::{self, ResumeToken};

pub struct Dashboard {
    store: Store,
}

impl Dashboard {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Binds `addr` and serves requests until the process exits. Every
    /// handler here only reads through `Store`, so each request is
    /// answered on the thread `tiny_http` hands it to us on.
    pub fn serve(&self, addr: &str) -> Result<()> {
        let server = Server::http(addr).map_err(|e| ZeusError::Io {
            path: std::path::PathBuf::from(addr),
            source: std::io::Error::other(e.to_string()),
        })?;
        tracing::info!(%addr, "dashboard listening");
        for request in server.incoming_requests() {
            let method = request.method().clone();
            let url = request.url().to_string();
            let path = url.split('?').next().unwrap_or("/").to_string();
            let outcome = match (&method, path.as_str()) {
                (Method::Get, "/status") => self.respond_status(request),
                (Method::Get, "/doctor") => self.respond_doctor(request),
                (Method::Get, "/stream") => self.respond_stream(request, &url),
                (Method::Get, p) if p.starts_with("/list/") => self.respond_list(request, &p["/list/".len()..]),
                _ => request.respond(Response::empty(StatusCode(404))),
            };
            if let Err(err) = outcome {
                tracing::warn!(%err, "dashboard request failed");
            }
        }
        Ok(())
    }

    fn respond_status(&self, request: tiny_http::Request) -> std::io::Result<()> {
        let pending = self.store.approvals.list_pending().map(|p| p.len()).unwrap_or(0);
        let body = match rollup::compute(&self.store.handlers, pending) {
            Ok(r) => json!({
                "health": r.health(),
                "open_problems": r.open_problems,
                "critical_problems": r.critical_problems,
                "open_risks": r.open_risks,
                "critical_risks": r.critical_risks,
                "pending_approvals": r.pending_approvals,
                "by_kind": r.by_kind.iter().map(|(k, v)| (k.cli_name().to_string(), json!({"total": v.total, "by_status": v.by_status}))).collect::<serde_json::Map<_, _>>(),
            }),
            Err(e) => json!({"error": e.to_string()}),
        };
        respond_json(request, &body)
    }

    fn respond_doctor(&self, request: tiny_http::Request) -> std::io::Result<()> {
        let body = match integrity::run(&self.store.handlers) {
            Ok(findings) => json!({
                "findings": findings.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
            Err(e) => json!({"error": e.to_string()}),
        };
        respond_json(request, &body)
    }

    fn respond_list(&self, request: tiny_http::Request, kind_name: &str) -> std::io::Result<()> {
        let Some(kind) = Kind::from_cli_name(kind_name) else {
            return request.respond(Response::from_string("unknown kind").with_status_code(StatusCode(404)));
        };
        let body = match list_kind(&self.store, kind) {
            Ok(rows) => json!(rows.into_iter().map(|(id, title, status)| json!({"id": id, "title": title, "status": status})).collect::<Vec<_>>()),
            Err(e) => json!({"error": e.to_string()}),
        };
        respond_json(request, &body)
    }

    fn respond_stream(&self, request: tiny_http::Request, url: &str) -> std::io::Result<()> {
        let requested = url.split_once("since=").and_then(|(_, rest)| ResumeToken::parse(rest.split('&').next().unwrap_or(rest)));
        let bus = self.store.bus();
        let resynced = requested.is_none_or(|token| token.generation != bus.generation());
        if resynced {
            tracing::info!("dashboard stream client resyncing from seq 0");
        }
        let subscription = bus.subscribe();
        let reader = EventStream { subscription, buffer: Vec::new() };
        let header = Header::from_bytes(&b"Content-Type"[..], &b"application/octet-stream"[..]).expect("static header");
        request.respond(Response::new(StatusCode(200), vec![header], reader, None, None))
    }
}

fn list_kind(store: &Store, kind: Kind) -> Result<Vec<(String, String, String)>> {
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
        Kind::Approval => store.approvals.list_pending()?.into_iter().map(|p| (p.id, p.target_kind.to_string(), p.operation.as_str().to_string())).collect(),
    })
}

fn respond_json(request: tiny_http::Request, body: &serde_json::Value) -> std::io::Result<()> {
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).expect("static header");
    request.respond(Response::from_string(body.to_string()).with_header(header))
}

/// Adapts a bus [`Subscription`](crate::bus::Subscription) into a blocking
/// `Read`, so `tiny_http` can stream it as a chunked response body. Each
/// `recv` blocks this request's thread only, never the publisher.
struct EventStream {
    subscription: crate::bus::Subscription,
    buffer: Vec<u8>,
}

impl Read for EventStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.buffer.is_empty() {
            match self.subscription.recv() {
                Some(delivery) => self.buffer = protocol::encode_delivery(&delivery),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.drain(..n);
        Ok(n)
    }
}
