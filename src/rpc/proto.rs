//! Wire schema: one `Req`/`Resp` pair per RPC method (spec §4.6), framed by
//! `server.rs`/`client.rs` as 4-byte big-endian length + `serde_json`.

use crate::store::code::{FileInfo, Symbol};
use crate::store::decision::Decision;
use crate::store::findings::Finding;
use crate::store::memory::Memory;
use crate::store::message::Message;
use crate::store::state::StateEntry;
use crate::store::task::Task;
use crate::types::{Id, MemoryCategory, MessageId, Priority, Severity, TagSet, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frame envelope: `id` multiplexes concurrent in-flight calls on one
/// connection (spec §4.6 "single connection multiplexes concurrent calls").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub payload: T,
}

/// RPC error taxonomy (spec §4.6): a small fixed set, independent of the
/// richer internal `ServerError` (which `RpcError::from` maps into this).
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum RpcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<crate::error::DbError> for RpcError {
    fn from(err: crate::error::DbError) -> Self {
        crate::error::ServerError::from(err).into()
    }
}

impl From<crate::error::ServerError> for RpcError {
    fn from(err: crate::error::ServerError) -> Self {
        use crate::error::ServerError as E;
        match err {
            E::InvalidArgument(msg) => Self::InvalidArgument(msg),
            E::AlreadyExists(msg) => Self::AlreadyExists(msg),
            E::PreconditionFailed(msg) => Self::PreconditionFailed(msg),
            E::Cancelled => Self::Internal("operation cancelled".to_string()),
            E::DeadlineExceeded => Self::Internal("deadline exceeded".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Req {
    // --- Memory ---
    MemoryAdd {
        category: MemoryCategory,
        content: String,
        tags: TagSet,
        priority: Priority,
        plan: Option<String>,
        agent: Option<String>,
        namespace: Option<String>,
    },
    MemoryGet { id: Id },
    MemoryTouch { id: Id },
    MemoryList {
        category: Option<MemoryCategory>,
        plan: Option<String>,
        tags: Vec<String>,
        namespace: Option<String>,
        include_all: bool,
        limit: usize,
    },
    MemorySearch { query: String, limit: usize },
    MemoryDelete { id: Id },
    MemoryClear { category: Option<MemoryCategory> },
    MemoryExport,

    // --- Decision ---
    DecisionSet {
        topic: String,
        decision: String,
        rationale: Option<String>,
        details: Option<String>,
        references: Vec<String>,
        decided_by: Option<String>,
    },
    DecisionGet { topic: String },
    DecisionHistory { topic: String },
    DecisionDelete { topic: String },

    // --- State ---
    StateSet { key: String, value: String, agent: Option<String> },
    StateGet { key: String },
    StateList { agent: Option<String> },
    StateDelete { key: String },
    StateClearAgent { agent: String },
    StateClearAll,

    // --- Message ---
    MessageSend {
        from: String,
        to: String,
        content: String,
        msg_type: String,
        ttl_secs: Option<i64>,
    },
    MessageList { agent: String },
    MessageAck { id: MessageId, agent: String },
    MessagePrune,
    MessageClear { agent: String },

    // --- Task ---
    TaskCreate { title: String, description: String },
    TaskGet { id: Id },
    TaskList { status: Option<TaskStatus> },
    TaskClaim { id: Id, agent: String, worktree: Option<String> },
    TaskUpdate { id: Id, result: Option<String> },
    TaskComplete { id: Id, result: Option<String> },
    TaskDelete { id: Id },
    TaskClear,

    // --- Code ---
    CodeIndex { paths: Vec<String>, force: bool },
    CodeGet { path: String },
    CodeSearch { name: Option<String>, kind: Option<String>, language: Option<String>, limit: usize },
    CodeClear,

    // --- Findings ---
    FindingsRun { path: Option<String> },
    FindingsList { analyzer: Option<String>, severity: Option<Severity>, file_path: Option<String> },
    FindingsSearch { query: String, limit: usize },
    FindingsClear { analyzer: Option<String>, file_path: Option<String> },
    FindingsStatus,

    // --- Status / Health ---
    Status,
    HealthCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Resp {
    Ok,
    Bool(bool),
    Count(u64),

    Memory { memory: Memory },
    MemoryOpt { memory: Option<Memory>, found: bool },
    MemoryList { memories: Vec<Memory> },

    Decision { decision: Decision },
    DecisionOpt { decision: Option<Decision>, found: bool },
    DecisionList { decisions: Vec<Decision> },

    State { entry: StateEntry },
    StateOpt { entry: Option<StateEntry>, found: bool },
    StateList { entries: Vec<StateEntry> },

    Message { message: Message },
    MessageList { messages: Vec<Message> },

    Task { task: Task },
    TaskOpt { task: Option<Task>, found: bool },
    TaskList { tasks: Vec<Task> },
    TaskClaimed { task: Option<Task>, claimed: bool },

    IndexStats { files_indexed: u64, symbols_indexed: u64, files_skipped: u64 },
    Symbols { symbols: Vec<Symbol> },
    FileInfoOpt { info: Option<FileInfo>, found: bool },

    FindingsRun { files_scanned: u64, findings_by_analyzer: BTreeMap<String, u64> },
    FindingsList { findings: Vec<Finding> },
    FindingsStatus { analyzers: Vec<AnalyzerStatusView> },

    Status { status: StatusView },
    Health { ok: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerStatusView {
    pub name: String,
    pub state: String,
    pub scope: Option<String>,
    pub last_run_rfc3339: Option<String>,
    pub last_duration_ms: Option<u64>,
    pub findings_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    pub root: String,
    pub code_enabled: bool,
    pub findings_enabled: bool,
    pub watcher_enabled: bool,
    pub watcher_watched_roots: Vec<String>,
    pub watcher_directory_count: u64,
    pub watcher_debounce_ms: u64,
    pub watcher_pending_files: u64,
}
