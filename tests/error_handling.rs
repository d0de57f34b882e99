//! Sad-path and edge-case tests for the RPC surface.

mod common;

use aide::rpc::client::ClientError;
use aide::rpc::{Req, Resp, RpcError};
use aide::types::{Id, MessageId};
use common::TestServer;

#[tokio::test(flavor = "multi_thread")]
async fn memory_get_on_unknown_id_reports_not_found_without_erroring() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::MemoryGet { id: Id::new() }).await.unwrap();
    let Resp::MemoryOpt { found, memory } = resp else { panic!("expected MemoryOpt") };
    assert!(!found);
    assert!(memory.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn task_get_on_unknown_id_reports_not_found() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::TaskGet { id: Id::new() }).await.unwrap();
    let Resp::TaskOpt { found, task } = resp else { panic!("expected TaskOpt") };
    assert!(!found);
    assert!(task.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn task_claim_on_unknown_id_errors_not_found() {
    let server = TestServer::start().await;

    let err = server.client.call(Req::TaskClaim {
        id: Id::new(),
        agent: "agent-a".to_string(),
        worktree: None,
    }).await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc(RpcError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn decision_get_on_unknown_topic_reports_not_found() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::DecisionGet { topic: "nonexistent".to_string() }).await.unwrap();
    let Resp::DecisionOpt { found, decision } = resp else { panic!("expected DecisionOpt") };
    assert!(!found);
    assert!(decision.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn message_ack_on_unknown_id_returns_false() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::MessageAck { id: MessageId::new(1), agent: "nobody".to_string() }).await.unwrap();
    assert!(matches!(resp, Resp::Bool(false)));
}

#[tokio::test(flavor = "multi_thread")]
async fn code_get_on_unindexed_path_reports_not_found() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::CodeGet { path: "src/does_not_exist.rs".to_string() }).await.unwrap();
    let Resp::FileInfoOpt { found, info } = resp else { panic!("expected FileInfoOpt") };
    assert!(!found);
    assert!(info.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn code_operations_fail_with_precondition_when_store_disabled() {
    let dir = tempfile::TempDir::new().unwrap();
    let ignore = std::sync::Arc::new(aide::ignore::IgnoreMatcher::new(dir.path()).unwrap());
    let memory_db = std::sync::Arc::new(aide::store::Database::in_memory(aide::store::StoreKind::Memory).unwrap());
    let stores = std::sync::Arc::new(aide::store::Stores { memory: memory_db, code: None, findings: None });
    let state = aide::rpc::AppState {
        root: dir.path().to_path_buf(),
        stores,
        ignore,
        indexer: None,
        runner: None,
        watcher: std::sync::Arc::new(tokio::sync::Mutex::new(None)),
    };
    let socket_path = dir.path().join("aide.sock");
    let socket_for_task = socket_path.clone();
    tokio::spawn(async move {
        let _ = aide::rpc::serve(&socket_for_task, state).await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let client = aide::rpc::Client::new(socket_path);

    let err = client.call(Req::CodeIndex { paths: vec![], force: false }).await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc(RpcError::PreconditionFailed(_))));

    let err = client.call(Req::FindingsRun { path: None }).await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc(RpcError::PreconditionFailed(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_search_queries_return_empty_results_not_errors() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::MemorySearch { query: String::new(), limit: 10 }).await.unwrap();
    let Resp::MemoryList { memories } = resp else { panic!("expected MemoryList") };
    assert!(memories.is_empty());

    let resp = server.client.call(Req::FindingsSearch { query: String::new(), limit: 10 }).await.unwrap();
    let Resp::FindingsList { findings } = resp else { panic!("expected FindingsList") };
    assert!(findings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn code_search_on_empty_index_returns_no_symbols() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::CodeSearch {
        name: Some("anything".to_string()), kind: None, language: None, limit: 10,
    }).await.unwrap();
    let Resp::Symbols { symbols } = resp else { panic!("expected Symbols") };
    assert!(symbols.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn findings_run_on_empty_project_scans_zero_files() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::FindingsRun { path: None }).await.unwrap();
    let Resp::FindingsRun { files_scanned, findings_by_analyzer } = resp else { panic!("expected FindingsRun") };
    assert_eq!(files_scanned, 0);
    assert!(findings_by_analyzer.values().all(|&n| n == 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_call_against_a_missing_socket_fails_to_connect() {
    let dir = tempfile::TempDir::new().unwrap();
    let client = aide::rpc::Client::new(dir.path().join("no-such.sock"));
    let err = client.call(Req::HealthCheck).await.unwrap_err();
    assert!(matches!(err, ClientError::Connect(_)));
}
