//! Error taxonomy for the `aide` server (spec.md §7).
//!
//! Every subsystem error folds into [`ServerError`], whose [`ServerError::code`]
//! is the machine-readable discriminant carried across the RPC boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level server error.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("code index error: {0}")]
    Index(#[from] IndexError),

    #[error("findings error: {0}")]
    Findings(#[from] FindingsError),

    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("subsystem unavailable: {0}")]
    Unavailable(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A missing record: `found = false` for Get-style RPCs, a `NotFound` error
/// for mutate-by-id RPCs (spec.md §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not found: {0}")]
pub struct NotFoundError(pub String);

/// KV-engine-specific errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("{collection} record not found: {key}")]
    RecordNotFound { collection: &'static str, key: String },

    #[error("database is locked by another process")]
    Locked,
}

/// Code-indexing errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to index file {path}: {reason}")]
    FileIndex { path: PathBuf, reason: String },

    #[error("no parser registered for {path}")]
    UnsupportedLanguage { path: PathBuf },

    #[error("parse failed for {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Findings-runner errors.
#[derive(Error, Debug)]
pub enum FindingsError {
    #[error("analyzer '{analyzer}' failed on {path}: {reason}")]
    AnalyzerFailed {
        analyzer: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Watcher errors. The watcher never propagates these to the process — they
/// are logged and dropped per-event (spec.md §7) — this type exists for the
/// error returned by the initial `watch()` registration call only.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

pub type Result<T> = std::result::Result<T, ServerError>;
pub type DbResult<T> = std::result::Result<T, DbError>;
pub type IndexResult<T> = std::result::Result<T, IndexError>;
pub type FindingsResult<T> = std::result::Result<T, FindingsError>;
pub type WatcherResult<T> = std::result::Result<T, WatcherError>;

impl ServerError {
    /// Machine-readable error code, the RPC error taxonomy discriminant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.code(),
            Self::NotFound(_) => "NOT_FOUND",
            Self::Index(_) => "INDEX_ERROR",
            Self::Findings(_) => "FINDINGS_ERROR",
            Self::Watcher(_) => "WATCHER_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether this error should be surfaced to an interactive caller (CLI
    /// output, MCP tool result) rather than treated as an internal fault.
    #[must_use]
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidArgument(_)
                | Self::AlreadyExists(_)
                | Self::PreconditionFailed(_)
                | Self::Unavailable(_)
        )
    }
}

impl DbError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::Locked => "DB_LOCKED",
        }
    }
}

impl From<ServerError> for rmcp::ErrorData {
    fn from(err: ServerError) -> Self {
        rmcp::ErrorData::internal_error(err.to_string(), None)
    }
}
