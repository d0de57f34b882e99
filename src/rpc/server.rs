//! RPC server: Unix-domain socket listener, per-connection multiplexing,
//! and request dispatch onto the owning subsystems (spec §4.6).

use super::proto::{AnalyzerStatusView, Envelope, Req, Resp, RpcError, RpcResult, StatusView};
use crate::code::Indexer;
use crate::findings::Runner;
use crate::ignore::IgnoreMatcher;
use crate::security;
use crate::store::code::SymbolSearchFilter;
use crate::store::findings::FindingFilter;
use crate::store::memory::MemoryListFilter;
use crate::store::Stores;
use crate::watcher::Watcher;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Everything a connection handler needs to service a request. Cheap to
/// clone: every field is an `Arc` (or `Option<Arc<_>>`).
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub stores: Arc<Stores>,
    pub ignore: Arc<IgnoreMatcher>,
    pub indexer: Option<Arc<Indexer>>,
    pub runner: Option<Arc<Runner>>,
    pub watcher: Arc<AsyncMutex<Option<Watcher>>>,
}

/// Binds the Unix-domain socket at `socket_path`, removing any stale file
/// left from a prior run, and serves connections until the process exits.
/// Parent directory is created with mode 0700 per spec §4.6.
///
/// # Errors
///
/// Returns an error if the socket cannot be created or bound.
pub async fn serve(socket_path: &Path, state: AppState) -> std::io::Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
    }
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    info!("rpc listening on {}", socket_path.display());

    loop {
        let (stream, _addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                warn!("rpc connection closed: {err}");
            }
        });
    }
}

async fn handle_connection(stream: UnixStream, state: AppState) -> std::io::Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(writer));

    loop {
        let mut len_buf = [0u8; 4];
        if reader.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;

        let envelope: Envelope<Req> = match serde_json::from_slice(&body) {
            Ok(e) => e,
            Err(err) => {
                error!("malformed rpc frame: {err}");
                continue;
            }
        };

        let state = state.clone();
        let writer = writer.clone();
        tokio::spawn(async move {
            let id = envelope.id;
            let result = dispatch(envelope.payload, &state).await;
            let payload = match result {
                Ok(resp) => resp,
                Err(err) => {
                    warn!("rpc handler error: {err}");
                    return write_frame(&writer, id, Err::<Resp, _>(err)).await;
                }
            };
            write_frame(&writer, id, Ok(payload)).await
        });
    }
}

async fn write_frame(
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    id: u64,
    result: RpcResult<Resp>,
) {
    #[derive(serde::Serialize)]
    #[serde(tag = "status")]
    enum Wire {
        #[serde(rename = "ok")]
        Ok { id: u64, resp: Resp },
        #[serde(rename = "err")]
        Err { id: u64, error: RpcError },
    }

    let wire = match result {
        Ok(resp) => Wire::Ok { id, resp },
        Err(error) => Wire::Err { id, error },
    };
    let Ok(bytes) = serde_json::to_vec(&wire) else {
        return;
    };
    let len = (bytes.len() as u32).to_be_bytes();
    let mut guard = writer.lock().await;
    if guard.write_all(&len).await.is_err() {
        return;
    }
    let _ = guard.write_all(&bytes).await;
}

async fn dispatch(req: Req, state: &AppState) -> RpcResult<Resp> {
    let db = &state.stores.memory;

    match req {
        Req::MemoryAdd { category, content, tags, priority, plan, agent, namespace } => {
            let memory = db.memory_add(category, content, tags, priority, plan, agent, namespace)?;
            Ok(Resp::Memory { memory })
        }
        Req::MemoryGet { id } => {
            let memory = db.memory_get(id)?;
            let found = memory.is_some();
            Ok(Resp::MemoryOpt { memory, found })
        }
        Req::MemoryTouch { id } => Ok(Resp::Bool(db.memory_touch(id)?)),
        Req::MemoryList { category, plan, tags, namespace, include_all, limit } => {
            let filter = MemoryListFilter { category, plan, tags, namespace, include_all, limit };
            Ok(Resp::MemoryList { memories: db.memory_list(&filter)? })
        }
        Req::MemorySearch { query, limit } => {
            Ok(Resp::MemoryList { memories: db.memory_search(&query, limit)? })
        }
        Req::MemoryDelete { id } => Ok(Resp::Bool(db.memory_delete(id)?)),
        Req::MemoryClear { category } => Ok(Resp::Count(db.memory_clear(category)?)),
        Req::MemoryExport => Ok(Resp::MemoryList { memories: db.memory_export()? }),

        Req::DecisionSet { topic, decision, rationale, details, references, decided_by } => {
            let decision = db.decision_set(topic, decision, rationale, details, references, decided_by)?;
            Ok(Resp::Decision { decision })
        }
        Req::DecisionGet { topic } => {
            let decision = db.decision_get(&topic)?;
            let found = decision.is_some();
            Ok(Resp::DecisionOpt { decision, found })
        }
        Req::DecisionHistory { topic } => {
            Ok(Resp::DecisionList { decisions: db.decision_history(&topic)? })
        }
        Req::DecisionDelete { topic } => Ok(Resp::Count(db.decision_delete(&topic)?)),

        Req::StateSet { key, value, agent } => {
            let entry = db.state_set(&key, &value, agent.as_deref())?;
            Ok(Resp::State { entry })
        }
        Req::StateGet { key } => {
            let entry = db.state_get(&key)?;
            let found = entry.is_some();
            Ok(Resp::StateOpt { entry, found })
        }
        Req::StateList { agent } => Ok(Resp::StateList { entries: db.state_list(agent.as_deref())? }),
        Req::StateDelete { key } => Ok(Resp::Bool(db.state_delete(&key)?)),
        Req::StateClearAgent { agent } => Ok(Resp::Count(db.state_clear_agent(&agent)?)),
        Req::StateClearAll => Ok(Resp::Count(db.state_clear_all()?)),

        Req::MessageSend { from, to, content, msg_type, ttl_secs } => {
            let ttl = ttl_secs.map(chrono::Duration::seconds);
            let message = db.message_send(from, to, content, msg_type, ttl)?;
            Ok(Resp::Message { message })
        }
        Req::MessageList { agent } => Ok(Resp::MessageList { messages: db.message_list(&agent)? }),
        Req::MessageAck { id, agent } => Ok(Resp::Bool(db.message_ack(id, &agent)?)),
        Req::MessagePrune => Ok(Resp::Count(db.message_prune()?)),
        Req::MessageClear { agent } => Ok(Resp::Count(db.message_clear(&agent)?)),

        Req::TaskCreate { title, description } => {
            Ok(Resp::Task { task: db.task_create(title, description)? })
        }
        Req::TaskGet { id } => {
            let task = db.task_get(id)?;
            let found = task.is_some();
            Ok(Resp::TaskOpt { task, found })
        }
        Req::TaskList { status } => Ok(Resp::TaskList { tasks: db.task_list(status)? }),
        Req::TaskClaim { id, agent, worktree } => {
            let (task, claimed) = db.task_claim(id, &agent, worktree.as_deref())?;
            Ok(Resp::TaskClaimed { task, claimed })
        }
        Req::TaskUpdate { id, result } => Ok(Resp::Bool(db.task_update(id, result)?)),
        Req::TaskComplete { id, result } => Ok(Resp::Bool(db.task_complete(id, result)?)),
        Req::TaskDelete { id } => Ok(Resp::Bool(db.task_delete(id)?)),
        Req::TaskClear => Ok(Resp::Count(db.task_clear()?)),

        Req::CodeIndex { paths, force } => {
            let indexer = state
                .indexer
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("code store is disabled".to_string()))?;
            let roots: Vec<PathBuf> = if paths.is_empty() {
                vec![state.root.clone()]
            } else {
                paths
                    .iter()
                    .map(|p| {
                        security::validate_path(&state.root, p)
                            .map_err(|e| RpcError::InvalidArgument(e.to_string()))
                    })
                    .collect::<RpcResult<Vec<_>>>()?
            };
            let stats = indexer
                .index(&roots, force, None)
                .map_err(|e| RpcError::Internal(e.to_string()))?;
            Ok(Resp::IndexStats {
                files_indexed: stats.files_indexed,
                symbols_indexed: stats.symbols_indexed,
                files_skipped: stats.files_skipped,
            })
        }
        Req::CodeGet { path } => {
            let code_db = state
                .stores
                .code
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("code store is disabled".to_string()))?;
            let info = code_db.code_file_info(&path)?;
            let found = info.is_some();
            Ok(Resp::FileInfoOpt { info, found })
        }
        Req::CodeSearch { name, kind, language, limit } => {
            let code_db = state
                .stores
                .code
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("code store is disabled".to_string()))?;
            let filter = SymbolSearchFilter { kind, language, ..Default::default() };
            let symbols = code_db.code_search(name.as_deref().unwrap_or(""), &filter, limit)?;
            Ok(Resp::Symbols { symbols })
        }
        Req::CodeClear => {
            let code_db = state
                .stores
                .code
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("code store is disabled".to_string()))?;
            code_db.code_clear_all()?;
            Ok(Resp::Ok)
        }

        Req::FindingsRun { path } => {
            let runner = state
                .runner
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("findings store is disabled".to_string()))?;
            let scope = path
                .map(|p| {
                    security::validate_path(&state.root, &p)
                        .map_err(|e| RpcError::InvalidArgument(e.to_string()))
                })
                .transpose()?;
            let symbols_by_file = collect_symbols_by_file(state);
            let summary = runner
                .run(&state.root, scope.as_deref(), &symbols_by_file)
                .map_err(|e| RpcError::Internal(e.to_string()))?;
            Ok(Resp::FindingsRun {
                files_scanned: summary.files_scanned,
                findings_by_analyzer: summary.findings_by_analyzer,
            })
        }
        Req::FindingsList { analyzer, severity, file_path } => {
            let findings_db = state
                .stores
                .findings
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("findings store is disabled".to_string()))?;
            let filter = FindingFilter { analyzer, severity, file_path };
            Ok(Resp::FindingsList { findings: findings_db.findings_list(&filter)? })
        }
        Req::FindingsSearch { query, limit } => {
            let findings_db = state
                .stores
                .findings
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("findings store is disabled".to_string()))?;
            Ok(Resp::FindingsList { findings: findings_db.findings_search(&query, limit)? })
        }
        Req::FindingsClear { analyzer, file_path } => {
            let findings_db = state
                .stores
                .findings
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("findings store is disabled".to_string()))?;
            Ok(Resp::Count(findings_db.findings_clear(analyzer.as_deref(), file_path.as_deref())?))
        }
        Req::FindingsStatus => {
            let runner = state
                .runner
                .as_ref()
                .ok_or_else(|| RpcError::PreconditionFailed("findings store is disabled".to_string()))?;
            let analyzers = runner
                .status()
                .into_iter()
                .map(|(name, status)| AnalyzerStatusView {
                    name,
                    state: format!("{:?}", status.state),
                    scope: status.scope,
                    last_run_rfc3339: status.last_run.map(|t| t.to_string()),
                    last_duration_ms: status.last_duration_ms,
                    findings_count: status.findings_count,
                })
                .collect();
            Ok(Resp::FindingsStatus { analyzers })
        }

        Req::Status => Ok(Resp::Status { status: status_view(state).await }),
        Req::HealthCheck => Ok(Resp::Health { ok: true }),
    }
}

async fn status_view(state: &AppState) -> StatusView {
    let watcher_guard = state.watcher.lock().await;
    let watcher_stats = watcher_guard.as_ref().map(Watcher::stats);
    StatusView {
        root: state.root.to_string_lossy().to_string(),
        code_enabled: state.indexer.is_some(),
        findings_enabled: state.runner.is_some(),
        watcher_enabled: watcher_stats.as_ref().is_some_and(|s| s.enabled),
        watcher_watched_roots: watcher_stats
            .as_ref()
            .map(|s| s.watched_roots.iter().map(|p| p.to_string_lossy().to_string()).collect())
            .unwrap_or_default(),
        watcher_directory_count: watcher_stats.as_ref().map_or(0, |s| s.directory_count),
        watcher_debounce_ms: watcher_stats.as_ref().map_or(0, |s| s.debounce.as_millis() as u64),
        watcher_pending_files: watcher_stats.as_ref().map_or(0, |s| s.pending_files),
    }
}

/// Flattens the code store's symbol table into the per-file view the
/// findings runner needs for complexity/coupling. Empty when code indexing
/// is disabled, in which case those two analyzers simply find nothing.
fn collect_symbols_by_file(state: &AppState) -> HashMap<String, Vec<crate::store::code::Symbol>> {
    let mut by_file: HashMap<String, Vec<crate::store::code::Symbol>> = HashMap::new();
    let Some(code_db) = state.stores.code.as_ref() else {
        return by_file;
    };
    let Ok(infos) = code_db.code_all_file_infos() else {
        return by_file;
    };
    for info in infos {
        if let Ok(symbols) = code_db.code_symbols_for_file(&info.path) {
            by_file.insert(info.path, symbols);
        }
    }
    by_file
}
