//! aide: local-first coordination and knowledge substrate for AI coding agents.
//!
//! A single long-lived server process per project owns a small set of SQLite
//! collections (memories, decisions, shared state, messages, tasks, code
//! symbols, findings) plus a code indexer, a findings runner, and a debounced
//! file watcher. Clients — a thin CLI and a thin MCP adapter — talk to it
//! exclusively over a Unix-domain socket; nothing else touches the database
//! files directly.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐   ┌───────────────────┐
//! │    cli.rs (clap)  │   │  mcp.rs (rmcp)    │
//! └─────────┬─────────┘   └─────────┬─────────┘
//!           │       rpc::client::Client         │
//!           └─────────────┬─────────────────────┘
//!                         │ Unix-domain socket, length-prefixed JSON
//! ┌───────────────────────▼───────────────────────┐
//! │              rpc::server (dispatch)            │
//! └───┬──────────┬──────────┬──────────┬──────────┘
//!     │          │          │          │
//! ┌───▼───┐ ┌────▼───┐ ┌────▼────┐ ┌───▼────┐
//! │ store │ │  code  │ │findings │ │watcher │
//! │(SQLite│ │indexer │ │ runner  │ │(notify)│
//! │+FTS5) │ │        │ │         │ │        │
//! └───────┘ └────────┘ └─────────┘ └────────┘
//! ```

pub mod cli;
pub mod code;
pub mod config;
pub mod error;
pub mod findings;
pub mod fmt;
pub mod ignore;
pub mod mcp;
pub mod rpc;
pub mod security;
pub mod store;
pub mod types;
pub mod watcher;

pub use error::{Result, ServerError};
pub use types::{Id, MessageId, Priority, Timestamp};

use std::path::{Path, PathBuf};

/// Resolves `<root>/.aide`, the server's private directory for this project.
#[must_use]
pub fn aide_dir(root: &Path) -> PathBuf {
    root.join(".aide")
}

/// Path to the RPC listener's Unix-domain socket.
#[must_use]
pub fn socket_path(root: &Path) -> PathBuf {
    aide_dir(root).join("aide.sock")
}

/// Path to the debug log directory (populated only when `AIDE_DEBUG=1`).
#[must_use]
pub fn logs_dir(root: &Path) -> PathBuf {
    aide_dir(root).join("_logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_under_aide_dir() {
        let root = Path::new("/repo");
        assert_eq!(socket_path(root), Path::new("/repo/.aide/aide.sock"));
        assert_eq!(logs_dir(root), Path::new("/repo/.aide/_logs"));
    }
}
