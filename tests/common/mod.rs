//! Common test utilities for aide integration tests.
//!
//! Provides `TestServer` for spinning up a full daemon (in-memory stores,
//! code indexing and findings enabled, no watcher) on a temp socket.

#![allow(dead_code)]

use aide::code::Indexer;
use aide::config::FindingsConfig;
use aide::findings::Runner;
use aide::ignore::IgnoreMatcher;
use aide::rpc::server::{serve, AppState};
use aide::rpc::Client;
use aide::store::{Database, StoreKind, Stores};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex as AsyncMutex;

/// A complete test daemon: root directory, live socket, and a client wired
/// to it.
pub struct TestServer {
    pub dir: TempDir,
    pub client: Client,
}

impl TestServer {
    /// Starts a daemon with code indexing and findings enabled, all stores
    /// in-memory (single pooled connection — fine for functional tests, but
    /// not for exercising multi-connection races; see `start_file_backed`).
    pub async fn start() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let memory_db = Arc::new(Database::in_memory(StoreKind::Memory).expect("memory db"));
        let code_db = Arc::new(Database::in_memory(StoreKind::Code).expect("code db"));
        let findings_db = Arc::new(Database::in_memory(StoreKind::Findings).expect("findings db"));
        Self::start_with(dir, memory_db, code_db, findings_db).await
    }

    /// Starts a daemon with all stores backed by on-disk SQLite files under
    /// the temp root, pooled with the same `max_size(4)` as `Database::open`
    /// uses in production. Unlike `start`, concurrent RPCs here go through
    /// genuinely distinct pooled connections, so this is the variant that can
    /// actually exercise cross-connection transaction races (e.g. task
    /// claiming under contention).
    pub async fn start_file_backed() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let data_dir = dir.path().join(".aide").join("data");
        let memory_db =
            Arc::new(Database::open(&data_dir.join("memory.db"), StoreKind::Memory).expect("memory db"));
        let code_db = Arc::new(Database::open(&data_dir.join("code.db"), StoreKind::Code).expect("code db"));
        let findings_db =
            Arc::new(Database::open(&data_dir.join("findings.db"), StoreKind::Findings).expect("findings db"));
        Self::start_with(dir, memory_db, code_db, findings_db).await
    }

    async fn start_with(
        dir: TempDir,
        memory_db: Arc<Database>,
        code_db: Arc<Database>,
        findings_db: Arc<Database>,
    ) -> Self {
        let ignore = Arc::new(IgnoreMatcher::new(dir.path()).expect("failed to build ignore matcher"));

        let indexer = Arc::new(Indexer::new(code_db.clone(), ignore.clone()));
        let runner = Arc::new(Runner::new(&FindingsConfig::default(), findings_db.clone(), ignore.clone()));

        let stores = Arc::new(Stores {
            memory: memory_db,
            code: Some(code_db),
            findings: Some(findings_db),
        });

        let state = AppState {
            root: dir.path().to_path_buf(),
            stores,
            ignore,
            indexer: Some(indexer),
            runner: Some(runner),
            watcher: Arc::new(AsyncMutex::new(None)),
        };

        let socket_path = dir.path().join("aide.sock");
        let socket_for_task = socket_path.clone();
        tokio::spawn(async move {
            let _ = serve(&socket_for_task, state).await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = Client::new(socket_path);
        Self { dir, client }
    }

    /// Writes a file under the daemon's root, creating parent directories.
    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directories");
        }
        std::fs::write(&path, content).expect("failed to write test file");
    }
}
