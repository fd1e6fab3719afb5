//! The error taxonomy shared by every component (`spec.md` §7).
//!
//! Every fallible operation in the store returns `ZeusError`. Handlers and
//! the `FileStore` attach entity/path context as errors propagate upward;
//! the CLI layer maps each variant to one of the fixed exit codes in
//! `spec.md` §6.2 via [`ZeusError::exit_code`].

use std::path::PathBuf;

use crate::model::Kind;

#[derive(Debug, thiserror::Error)]
pub enum ZeusError {
    /// Supplied input fails a field-level rule (missing required, bad enum,
    /// malformed id, manual risk score, etc).
    #[error("validation failed for {kind}: {message}")]
    Validation { kind: Kind, message: String },

    /// A referenced entity (or file) does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: Kind, id: String },

    /// A reference resolves to an id that exists, but under the wrong kind.
    #[error("{id} is not a {expected} (found {actual})")]
    WrongKind {
        id: String,
        expected: Kind,
        actual: Kind,
    },

    /// Attempted Update or Delete on a Decision.
    #[error("{kind} {id} is immutable")]
    Immutable { kind: Kind, id: String },

    /// Inbound references block a delete, or a cycle would be introduced.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Lock acquisition exceeded its deadline.
    #[error("timed out acquiring lock on {path}")]
    Timeout { path: String },

    /// Underlying filesystem error, with the logical path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An on-disk record declares a schema version newer than this
    /// implementation supports.
    #[error("record {path} has schema version {found}, newest supported is {supported}")]
    SchemaVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    /// Malformed record text (codec-level parse failure).
    #[error("malformed record at {path}: {message}")]
    Codec { path: PathBuf, message: String },

    /// Path normalization rejected the request (escapes root, null byte,
    /// control character, or parent-directory component).
    #[error("unsafe path: {0}")]
    UnsafePath(String),
}

impl ZeusError {
    /// Exit code mapping fixed by `spec.md` §6.2.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ZeusError::Validation { .. }
            | ZeusError::WrongKind { .. }
            | ZeusError::Codec { .. }
            | ZeusError::UnsafePath(_) => 1,
            ZeusError::NotFound { .. } => 2,
            ZeusError::Timeout { .. } => 3,
            ZeusError::Immutable { .. } | ZeusError::Conflict { .. } => 1,
            ZeusError::Io { .. } | ZeusError::SchemaVersion { .. } => 1,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ZeusError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ZeusError>;
