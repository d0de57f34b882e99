//! Typed client stub library over the RPC socket (spec §4.6).
//!
//! Thread-safe: each call opens a short-lived connection, so a `Client` can
//! be shared freely (`Clone`) without internal locking of its own.

use super::proto::{Envelope, Req, Resp, RpcError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connect(#[from] std::io::Error),
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("malformed response: {0}")]
    Protocol(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(serde::Deserialize)]
#[serde(tag = "status")]
enum Wire {
    #[serde(rename = "ok")]
    Ok { id: u64, resp: Resp },
    #[serde(rename = "err")]
    Err { id: u64, error: RpcError },
}

/// Connects to the socket at `socket_path` for each call.
#[derive(Clone)]
pub struct Client {
    socket_path: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl Client {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends one request and waits for its matching response.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connect` if the socket cannot be reached,
    /// `ClientError::Protocol` on a malformed frame, or `ClientError::Rpc`
    /// if the handler returned an error.
    pub async fn call(&self, req: Req) -> Result<Resp, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope { id, payload: req };
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;

        stream.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
        stream.write_all(&bytes).await?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;

        let wire: Wire =
            serde_json::from_slice(&body).map_err(|e| ClientError::Protocol(e.to_string()))?;
        match wire {
            Wire::Ok { resp, .. } => Ok(resp),
            Wire::Err { error, .. } => Err(ClientError::Rpc(error)),
        }
    }

    /// Health check with a 1s connect timeout, per spec §4.6/§5.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Timeout` if no connection is established within
    /// one second, otherwise any error `call` would return.
    pub async fn ping(&self) -> Result<bool, ClientError> {
        let socket_path = self.socket_path.clone();
        let connect = UnixStream::connect(&socket_path);
        match tokio::time::timeout(Duration::from_secs(1), connect).await {
            Ok(Ok(_stream)) => {}
            Ok(Err(err)) => return Err(ClientError::Connect(err)),
            Err(_) => return Err(ClientError::Timeout(socket_path.display().to_string())),
        }
        match self.call(Req::HealthCheck).await? {
            Resp::Health { ok } => Ok(ok),
            other => Err(ClientError::Protocol(format!("unexpected response to HealthCheck: {other:?}"))),
        }
    }
}

/// Convenience: builds a `Client` for the socket under `root`.
#[must_use]
pub fn connect(root: &Path) -> Client {
    Client::new(crate::socket_path(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::server::{serve, AppState};
    use crate::store::Stores;
    use std::sync::Arc as StdArc;
    use tempfile::tempdir;
    use tokio::sync::Mutex as AsyncMutex;

    async fn spawn_test_server(dir: &Path) -> PathBuf {
        let ignore = StdArc::new(crate::ignore::IgnoreMatcher::new(dir).unwrap());
        let stores = StdArc::new(Stores {
            memory: StdArc::new(crate::store::Database::in_memory(crate::store::StoreKind::Memory).unwrap()),
            code: None,
            findings: None,
        });
        let state = AppState {
            root: dir.to_path_buf(),
            stores,
            ignore,
            indexer: None,
            runner: None,
            watcher: StdArc::new(AsyncMutex::new(None)),
        };
        let socket_path = dir.join("aide.sock");
        let socket_for_task = socket_path.clone();
        tokio::spawn(async move {
            let _ = serve(&socket_for_task, state).await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        socket_path
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_succeeds_against_a_live_server() {
        let dir = tempdir().unwrap();
        let socket_path = spawn_test_server(dir.path()).await;
        let client = Client::new(socket_path);
        assert!(client.ping().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_add_then_get_roundtrips_over_the_socket() {
        let dir = tempdir().unwrap();
        let socket_path = spawn_test_server(dir.path()).await;
        let client = Client::new(socket_path);

        let resp = client
            .call(Req::MemoryAdd {
                category: crate::types::MemoryCategory::Learning,
                content: "hello".to_string(),
                tags: Default::default(),
                priority: crate::types::Priority::ZERO,
                plan: None,
                agent: None,
                namespace: None,
            })
            .await
            .unwrap();
        let Resp::Memory { memory } = resp else { panic!("expected Memory resp") };

        let resp = client.call(Req::MemoryGet { id: memory.id }).await.unwrap();
        let Resp::MemoryOpt { found, memory: fetched } = resp else { panic!("expected MemoryOpt resp") };
        assert!(found);
        assert_eq!(fetched.unwrap().content, "hello");
    }
}
