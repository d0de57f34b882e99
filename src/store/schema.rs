//! Per-collection database schema definitions.
//!
//! Three logically separate databases share this module: the memory store
//! (memories, decisions, state, messages, tasks), the code index (symbols,
//! fileinfo), and the findings store (findings). Each gets its
//! own table set plus FTS5 virtual tables (content-synced via triggers) for
//! the collections that are searchable.

use crate::error::DbResult;
use rusqlite::Connection;

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// Which logical database a `Connection` belongs to, determining which
/// table set `init_schema` creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Code,
    Findings,
}

impl StoreKind {
    const fn tables(self) -> &'static [&'static str] {
        match self {
            Self::Memory => &[
                "memories",
                "memories_fts",
                "decisions",
                "state_entries",
                "messages",
                "tasks",
            ],
            Self::Code => &["symbols", "symbols_fts", "file_info"],
            Self::Findings => &["findings", "findings_fts"],
        }
    }
}

/// Initializes the schema for the given store kind.
///
/// Handles schema versioning: if an older schema version exists, drops all
/// tables for this store kind and recreates them.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if schema creation fails.
pub fn init_schema(conn: &Connection, kind: StoreKind) -> DbResult<()> {
    let existing_version: Option<u32> = conn
        .query_row(
            "SELECT CAST(value AS INTEGER) FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match existing_version {
        Some(v) if v >= SCHEMA_VERSION => return Ok(()),
        Some(_) => {
            let mut drop_batch = String::new();
            for table in kind.tables() {
                drop_batch.push_str(&format!("DROP TABLE IF EXISTS {table};\n"));
            }
            drop_batch.push_str("DROP TABLE IF EXISTS schema_info;\n");
            conn.execute_batch(&drop_batch)?;
        }
        None => {}
    }

    match kind {
        StoreKind::Memory => init_memory_schema(conn)?,
        StoreKind::Code => init_code_schema(conn)?,
        StoreKind::Findings => init_findings_schema(conn)?,
    }

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;
        INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', '1');
        ",
    )?;

    Ok(())
}

fn init_memory_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            content TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            priority REAL NOT NULL DEFAULT 0.0,
            plan TEXT,
            agent TEXT,
            namespace TEXT,
            access_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_accessed INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);
        CREATE INDEX IF NOT EXISTS idx_memories_namespace ON memories(namespace);

        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            id UNINDEXED,
            content,
            tags,
            plan,
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts(rowid, id, content, tags, plan)
            VALUES (new.rowid, new.id, new.content, new.tags, new.plan);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, id, content, tags, plan)
            VALUES ('delete', old.rowid, old.id, old.content, old.tags, old.plan);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, id, content, tags, plan)
            VALUES ('delete', old.rowid, old.id, old.content, old.tags, old.plan);
            INSERT INTO memories_fts(rowid, id, content, tags, plan)
            VALUES (new.rowid, new.id, new.content, new.tags, new.plan);
        END;

        CREATE TABLE IF NOT EXISTS decisions (
            topic TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            decision TEXT NOT NULL,
            rationale TEXT,
            details TEXT,
            refs TEXT NOT NULL DEFAULT '[]',
            decided_by TEXT,
            PRIMARY KEY (topic, created_at)
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_topic ON decisions(topic);

        CREATE TABLE IF NOT EXISTS state_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            agent TEXT,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_agent TEXT NOT NULL,
            to_agent TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            msg_type TEXT NOT NULL DEFAULT '',
            read_by TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_agent);
        CREATE INDEX IF NOT EXISTS idx_messages_expires ON messages(expires_at);

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending',
            claimed_by TEXT,
            claimed_at INTEGER,
            completed_at INTEGER,
            worktree TEXT,
            result TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        "#,
    )?;
    Ok(())
}

fn init_code_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS symbols (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            signature TEXT,
            doc_comment TEXT,
            file_path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            language TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);
        CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
        CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);

        CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
            id UNINDEXED,
            name,
            signature,
            doc_comment,
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS symbols_ai AFTER INSERT ON symbols BEGIN
            INSERT INTO symbols_fts(rowid, id, name, signature, doc_comment)
            VALUES (new.rowid, new.id, new.name, new.signature, new.doc_comment);
        END;
        CREATE TRIGGER IF NOT EXISTS symbols_ad AFTER DELETE ON symbols BEGIN
            INSERT INTO symbols_fts(symbols_fts, rowid, id, name, signature, doc_comment)
            VALUES ('delete', old.rowid, old.id, old.name, old.signature, old.doc_comment);
        END;
        CREATE TRIGGER IF NOT EXISTS symbols_au AFTER UPDATE ON symbols BEGIN
            INSERT INTO symbols_fts(symbols_fts, rowid, id, name, signature, doc_comment)
            VALUES ('delete', old.rowid, old.id, old.name, old.signature, old.doc_comment);
            INSERT INTO symbols_fts(rowid, id, name, signature, doc_comment)
            VALUES (new.rowid, new.id, new.name, new.signature, new.doc_comment);
        END;

        CREATE TABLE IF NOT EXISTS file_info (
            path TEXT PRIMARY KEY,
            language TEXT NOT NULL,
            mod_time INTEGER NOT NULL,
            hash INTEGER NOT NULL,
            symbol_ids TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )?;
    Ok(())
}

fn init_findings_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS findings (
            id TEXT PRIMARY KEY,
            analyzer TEXT NOT NULL,
            severity TEXT NOT NULL,
            category TEXT NOT NULL,
            file_path TEXT NOT NULL,
            line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            title TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_findings_analyzer_file ON findings(analyzer, file_path);
        CREATE INDEX IF NOT EXISTS idx_findings_severity ON findings(severity);

        CREATE VIRTUAL TABLE IF NOT EXISTS findings_fts USING fts5(
            id UNINDEXED,
            title,
            detail,
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS findings_ai AFTER INSERT ON findings BEGIN
            INSERT INTO findings_fts(rowid, id, title, detail)
            VALUES (new.rowid, new.id, new.title, new.detail);
        END;
        CREATE TRIGGER IF NOT EXISTS findings_ad AFTER DELETE ON findings BEGIN
            INSERT INTO findings_fts(findings_fts, rowid, id, title, detail)
            VALUES ('delete', old.rowid, old.id, old.title, old.detail);
        END;
        CREATE TRIGGER IF NOT EXISTS findings_au AFTER UPDATE ON findings BEGIN
            INSERT INTO findings_fts(findings_fts, rowid, id, title, detail)
            VALUES ('delete', old.rowid, old.id, old.title, old.detail);
            INSERT INTO findings_fts(rowid, id, title, detail)
            VALUES (new.rowid, new.id, new.title, new.detail);
        END;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::pragmas::apply_pragmas;

    #[test]
    fn test_memory_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn, StoreKind::Memory).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"memories".to_string()));
        assert!(tables.contains(&"tasks".to_string()));
        assert!(tables.contains(&"decisions".to_string()));
    }

    #[test]
    fn test_code_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn, StoreKind::Code).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"symbols".to_string()));
        assert!(tables.contains(&"file_info".to_string()));
    }

    #[test]
    fn test_findings_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn, StoreKind::Findings).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"findings".to_string()));
    }
}
