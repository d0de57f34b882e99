//! Concurrency stress tests: many tasks hammering one daemon over the RPC
//! socket at once.

mod common;

use aide::rpc::{Req, Resp};
use aide::types::{MemoryCategory, Priority};
use common::TestServer;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_memory_adds_all_land() {
    let server = TestServer::start().await;
    let client = server.client.clone();

    let mut handles = Vec::new();
    for i in 0..50 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.call(Req::MemoryAdd {
                category: MemoryCategory::Learning,
                content: format!("note {i}"),
                tags: Default::default(),
                priority: Priority::ZERO,
                plan: None,
                agent: None,
                namespace: None,
            }).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let resp = server.client.call(Req::MemoryList {
        category: None, plan: None, tags: vec![], namespace: None, include_all: false, limit: 0,
    }).await.unwrap();
    let Resp::MemoryList { memories } = resp else { panic!("expected MemoryList") };
    assert_eq!(memories.len(), 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_task_claims_only_one_winner() {
    let server = TestServer::start().await;

    let resp = server.client.call(Req::TaskCreate {
        title: "contended task".to_string(),
        description: "only one agent should win the claim".to_string(),
    }).await.unwrap();
    let Resp::Task { task } = resp else { panic!("expected Task") };

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = server.client.clone();
        let id = task.id;
        handles.push(tokio::spawn(async move {
            client.call(Req::TaskClaim {
                id,
                agent: format!("agent-{i}"),
                worktree: None,
            }).await.unwrap()
        }));
    }

    let mut wins = 0;
    for h in handles {
        let resp = h.await.unwrap();
        let Resp::TaskClaimed { claimed, .. } = resp else { panic!("expected TaskClaimed") };
        if claimed {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "exactly one concurrent claim should succeed");
}

/// Same race as `concurrent_task_claims_only_one_winner`, but over a
/// file-backed pool with real distinct connections (`max_size(4)`), the
/// setting under which a `Deferred` transaction could lose to
/// `SQLITE_BUSY_SNAPSHOT` instead of failing cleanly.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_task_claims_only_one_winner_file_backed() {
    let server = TestServer::start_file_backed().await;

    let resp = server.client.call(Req::TaskCreate {
        title: "contended task".to_string(),
        description: "only one agent should win the claim".to_string(),
    }).await.unwrap();
    let Resp::Task { task } = resp else { panic!("expected Task") };

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = server.client.clone();
        let id = task.id;
        handles.push(tokio::spawn(async move {
            client.call(Req::TaskClaim {
                id,
                agent: format!("agent-{i}"),
                worktree: None,
            }).await.unwrap()
        }));
    }

    let mut wins = 0;
    for h in handles {
        let resp = h.await.unwrap();
        let Resp::TaskClaimed { claimed, .. } = resp else { panic!("expected TaskClaimed") };
        if claimed {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "exactly one concurrent claim should succeed under real multi-connection contention");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_reads_and_writes_on_state_store_dont_panic() {
    let server = TestServer::start().await;
    let client = Arc::new(server.client.clone());

    let mut handles = Vec::new();
    for i in 0..30 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("key-{}", i % 5);
            if i % 2 == 0 {
                client.call(Req::StateSet { key, value: format!("v{i}"), agent: None }).await.unwrap();
            } else {
                client.call(Req::StateGet { key }).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_code_index_calls_converge_on_same_stats() {
    let server = TestServer::start().await;
    for i in 0..5 {
        server.write_file(&format!("src/m{i}.rs"), "pub fn f() {}\n");
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = server.client.clone();
        handles.push(tokio::spawn(async move {
            client.call(Req::CodeIndex { paths: vec![], force: false }).await.unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let resp = server.client.call(Req::CodeSearch {
        name: None, kind: None, language: None, limit: 100,
    }).await.unwrap();
    let Resp::Symbols { symbols } = resp else { panic!("expected Symbols") };
    assert_eq!(symbols.len(), 5, "repeated concurrent indexing should not duplicate symbols");
}

#[tokio::test(flavor = "multi_thread")]
async fn high_concurrency_mixed_subsystem_stress() {
    let server = TestServer::start().await;

    let mut handles = Vec::new();
    for i in 0..100 {
        let client = server.client.clone();
        handles.push(tokio::spawn(async move {
            match i % 4 {
                0 => {
                    client.call(Req::MemoryAdd {
                        category: MemoryCategory::Discovery,
                        content: format!("discovery {i}"),
                        tags: Default::default(),
                        priority: Priority::ZERO,
                        plan: None,
                        agent: None,
                        namespace: None,
                    }).await.unwrap();
                }
                1 => {
                    client.call(Req::StateSet {
                        key: format!("k{i}"),
                        value: "v".to_string(),
                        agent: None,
                    }).await.unwrap();
                }
                2 => {
                    client.call(Req::TaskCreate {
                        title: format!("task {i}"),
                        description: "stress".to_string(),
                    }).await.unwrap();
                }
                _ => {
                    client.call(Req::HealthCheck).await.unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert!(server.client.ping().await.unwrap());
}
