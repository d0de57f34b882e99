//! Database layer: connection pooling, schema, and per-entity collections.

mod pragmas;
mod schema;

pub mod code;
pub mod decision;
pub mod findings;
pub mod memory;
pub mod message;
pub mod state;
pub mod task;

pub use pragmas::apply_pragmas;
pub use schema::{StoreKind, SCHEMA_VERSION};

use crate::error::{DbError, DbResult};
use fs2::FileExt;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Database handle with connection pooling.
///
/// Uses r2d2 because `rusqlite::Connection` is NOT Sync. The pool manages
/// thread-safe access to SQLite connections; SQLite's own single-writer
/// enforcement (WAL mode) makes write transactions serialize naturally.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    /// Held for the lifetime of the `Database` to satisfy the BoltDB-style
    /// single-writer startup guarantee (spec §5). `None` for in-memory
    /// databases used in tests.
    _lock: Option<File>,
}

impl Database {
    /// Opens or creates a database at the given path, taking an exclusive
    /// advisory lock on it first.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Locked` if another process holds the lock.
    /// Returns `DbError::Pool` if connection pool creation fails.
    /// Returns `DbError::Sqlite` if schema initialization fails.
    pub fn open(path: &Path, kind: StoreKind) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Migration(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let lock_file = File::create(path.with_extension("lock"))
            .map_err(|e| DbError::Migration(format!("failed to open lock file: {e}")))?;
        lock_file.try_lock_exclusive().map_err(|_| DbError::Locked)?;

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(4).min_idle(Some(1)).build(manager)?;

        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            schema::init_schema(&conn, kind)?;
        }

        Ok(Self {
            pool,
            _lock: Some(lock_file),
        })
    }

    /// Creates an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if connection pool creation fails.
    /// Returns `DbError::Sqlite` if schema initialization fails.
    pub fn in_memory(kind: StoreKind) -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            schema::init_schema(&conn, kind)?;
        }

        Ok(Self { pool, _lock: None })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available within the timeout.
    pub fn conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(DbError::from)
    }
}

/// The three logically separate databases the server owns, one per
/// subsystem, mirroring the on-disk layout under `<root>/.aide/`.
///
/// `code`/`findings` are `Arc`-shared with the `Indexer`/`Runner` that own
/// the same underlying file, so the process never opens either twice (the
/// exclusive startup lock in `Database::open` is not reentrant).
pub struct Stores {
    pub memory: Arc<Database>,
    pub code: Option<Arc<Database>>,
    pub findings: Option<Arc<Database>>,
}

impl Stores {
    /// Default on-disk layout relative to a project root:
    /// `.aide/memory/memory.db`, `.aide/memory/code/index.db`,
    /// `.aide/memory/findings/findings.db`.
    #[must_use]
    pub fn memory_db_path(root: &Path) -> PathBuf {
        root.join(".aide").join("memory").join("memory.db")
    }

    #[must_use]
    pub fn code_db_path(root: &Path) -> PathBuf {
        root.join(".aide")
            .join("memory")
            .join("code")
            .join("index.db")
    }

    #[must_use]
    pub fn findings_db_path(root: &Path) -> PathBuf {
        root.join(".aide")
            .join("memory")
            .join("findings")
            .join("findings.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory(StoreKind::Memory).unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_multiple_connections() {
        let db = Database::in_memory(StoreKind::Memory).unwrap();
        let conn1 = db.conn().unwrap();
        drop(conn1);
        let _conn2 = db.conn().unwrap();
    }
}
