//! Symbol and FileInfo collections for the code index.

use crate::error::DbResult;
use crate::types::{Id, Timestamp};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: Id,
    pub name: String,
    pub kind: String,
    pub signature: Option<String>,
    pub doc_comment: Option<String>,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub language: String,
    pub mod_time: i64,
    pub hash: u64,
    pub symbol_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolSearchFilter {
    pub kind: Option<String>,
    pub language: Option<String>,
    pub file_path_contains: Option<String>,
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Symbol> {
    Ok(Symbol {
        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
        name: row.get("name")?,
        kind: row.get("kind")?,
        signature: row.get("signature")?,
        doc_comment: row.get("doc_comment")?,
        file_path: row.get("file_path")?,
        start_line: row.get::<_, i64>("start_line")? as u32,
        end_line: row.get::<_, i64>("end_line")? as u32,
        language: row.get("language")?,
        created_at: Timestamp::from_nanos(row.get("created_at")?),
    })
}

fn row_to_file_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileInfo> {
    let symbol_ids: String = row.get("symbol_ids")?;
    let ids: Vec<String> = serde_json::from_str(&symbol_ids).unwrap_or_default();
    Ok(FileInfo {
        path: row.get("path")?,
        language: row.get("language")?,
        mod_time: row.get("mod_time")?,
        hash: row.get::<_, i64>("hash")? as u64,
        symbol_ids: ids.into_iter().filter_map(|s| s.parse().ok()).collect(),
    })
}

impl Database {
    /// Clears all Symbols and the FileInfo for `path` in one transaction
    /// (spec §3 invariant: Symbol/FileInfo referential pairing).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the transaction fails.
    pub fn code_clear_file(&self, path: &str) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM symbols WHERE file_path = ?1", params![path])?;
        tx.execute("DELETE FROM file_info WHERE path = ?1", params![path])?;
        tx.commit()?;
        Ok(())
    }

    /// Replaces everything indexed for `path`: clears its prior Symbols and
    /// `FileInfo`, then inserts the new Symbols and writes the new `FileInfo`,
    /// all inside one transaction (spec §4.3 — clear and replace must be
    /// atomic per file, not two independently-committed steps).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the transaction fails.
    pub fn code_replace_file(
        &self,
        path: &str,
        language: &str,
        mod_time: i64,
        hash: u64,
        symbols: Vec<Symbol>,
    ) -> DbResult<Vec<Symbol>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM symbols WHERE file_path = ?1", params![path])?;
        tx.execute("DELETE FROM file_info WHERE path = ?1", params![path])?;

        for s in &symbols {
            tx.execute(
                r"
                INSERT INTO symbols
                    (id, name, kind, signature, doc_comment, file_path, start_line, end_line, language, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
                params![
                    s.id.as_str(),
                    s.name,
                    s.kind,
                    s.signature,
                    s.doc_comment,
                    s.file_path,
                    s.start_line,
                    s.end_line,
                    s.language,
                    s.created_at.as_nanos(),
                ],
            )?;
        }

        let symbol_ids: Vec<String> = symbols.iter().map(|s| s.id.as_str()).collect();
        tx.execute(
            r"
            INSERT INTO file_info (path, language, mod_time, hash, symbol_ids)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(path) DO UPDATE SET
                language = excluded.language, mod_time = excluded.mod_time,
                hash = excluded.hash, symbol_ids = excluded.symbol_ids
            ",
            params![path, language, mod_time, hash as i64, serde_json::to_string(&symbol_ids)?],
        )?;

        tx.commit()?;
        Ok(symbols)
    }

    /// Looks up `FileInfo` for `path`, the freshness oracle for the
    /// incremental indexer.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn code_file_info(&self, path: &str) -> DbResult<Option<FileInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM file_info WHERE path = ?1")?;
        let mut rows = stmt.query_map(params![path], row_to_file_info)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Lists symbols for a given file path.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn code_symbols_for_file(&self, path: &str) -> DbResult<Vec<Symbol>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM symbols WHERE file_path = ?1 ORDER BY start_line ASC")?;
        let rows = stmt
            .query_map(params![path], row_to_symbol)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full-text searches symbols, with optional kind/language/path filters.
    /// Results are FT-index relevance order, ties broken by name ascending.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn code_search(
        &self,
        query: &str,
        filter: &SymbolSearchFilter,
        limit: usize,
    ) -> DbResult<Vec<Symbol>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 { 20 } else { limit };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT s.* FROM symbols_fts
            JOIN symbols s ON s.id = symbols_fts.id
            WHERE symbols_fts MATCH ?1
            ORDER BY bm25(symbols_fts), s.name ASC
            LIMIT ?2
            ",
        )?;

        let rows = stmt
            .query_map(params![query, (limit * 4).max(limit) as i64], row_to_symbol)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut filtered: Vec<Symbol> = rows
            .into_iter()
            .filter(|s| filter.kind.as_deref().is_none_or(|k| s.kind == k))
            .filter(|s| filter.language.as_deref().is_none_or(|l| s.language == l))
            .filter(|s| {
                filter
                    .file_path_contains
                    .as_deref()
                    .is_none_or(|p| s.file_path.contains(p))
            })
            .collect();
        filtered.truncate(limit);
        Ok(filtered)
    }

    /// Removes all symbols and file_info records (full clear).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn code_clear_all(&self) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM symbols", [])?;
        tx.execute("DELETE FROM file_info", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Returns every indexed file path with its stored `modTime`, used by
    /// the incremental indexer to detect stale/removed files.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn code_all_file_infos(&self) -> DbResult<Vec<FileInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM file_info")?;
        let rows = stmt
            .query_map([], row_to_file_info)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;

    fn db() -> Database {
        Database::in_memory(StoreKind::Code).unwrap()
    }

    fn sample_symbol(file: &str) -> Symbol {
        Symbol {
            id: Id::new(),
            name: "foo".into(),
            kind: "function".into(),
            signature: Some("fn foo()".into()),
            doc_comment: None,
            file_path: file.into(),
            start_line: 1,
            end_line: 3,
            language: "rust".into(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn upsert_then_file_info_pairing_holds() {
        let db = db();
        let sym = sample_symbol("src/lib.rs");
        db.code_replace_file("src/lib.rs", "rust", 1000, 42, vec![sym.clone()])
            .unwrap();

        let info = db.code_file_info("src/lib.rs").unwrap().unwrap();
        assert!(info.symbol_ids.contains(&sym.id));

        let symbols = db.code_symbols_for_file("src/lib.rs").unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].id, sym.id);
    }

    #[test]
    fn clear_file_removes_symbols_and_file_info_together() {
        let db = db();
        let sym = sample_symbol("src/lib.rs");
        db.code_replace_file("src/lib.rs", "rust", 1000, 42, vec![sym])
            .unwrap();

        db.code_clear_file("src/lib.rs").unwrap();

        assert!(db.code_file_info("src/lib.rs").unwrap().is_none());
        assert!(db.code_symbols_for_file("src/lib.rs").unwrap().is_empty());
    }

    #[test]
    fn search_respects_kind_filter() {
        let db = db();
        let mut sym = sample_symbol("a.rs");
        sym.kind = "function".into();
        db.code_replace_file("a.rs", "rust", 1, 1, vec![sym]).unwrap();

        let mut class_sym = sample_symbol("b.rs");
        class_sym.name = "Foo".into();
        class_sym.kind = "class".into();
        db.code_replace_file("b.rs", "rust", 1, 1, vec![class_sym]).unwrap();

        let filter = SymbolSearchFilter {
            kind: Some("class".into()),
            ..Default::default()
        };
        let results = db.code_search("foo", &filter, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, "class");
    }
}
