//! Finding collection: diagnostics produced by the findings analyzers.

use crate::error::DbResult;
use crate::types::{Id, Severity, Timestamp};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Id,
    pub analyzer: String,
    pub severity: Severity,
    pub category: String,
    pub file_path: String,
    pub line: u32,
    pub end_line: u32,
    pub title: String,
    pub detail: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct FindingFilter {
    pub analyzer: Option<String>,
    pub severity: Option<Severity>,
    pub file_path: Option<String>,
}

fn row_to_finding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Finding> {
    let severity: String = row.get("severity")?;
    let metadata: String = row.get("metadata")?;
    Ok(Finding {
        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
        analyzer: row.get("analyzer")?,
        severity: severity.parse().unwrap_or(Severity::Info),
        category: row.get("category")?,
        file_path: row.get("file_path")?,
        line: row.get::<_, i64>("line")? as u32,
        end_line: row.get::<_, i64>("end_line")? as u32,
        title: row.get("title")?,
        detail: row.get("detail")?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: Timestamp::from_nanos(row.get("created_at")?),
    })
}

impl Database {
    /// Clears findings for `(analyzer, file_path)` then inserts the new
    /// batch in one transaction, making re-running an analyzer on a file
    /// idempotent (spec §4.4).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the transaction fails.
    pub fn findings_replace_for_file(
        &self,
        analyzer: &str,
        file_path: &str,
        findings: Vec<Finding>,
    ) -> DbResult<Vec<Finding>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM findings WHERE analyzer = ?1 AND file_path = ?2",
            params![analyzer, file_path],
        )?;

        for f in &findings {
            tx.execute(
                r"
                INSERT INTO findings
                    (id, analyzer, severity, category, file_path, line, end_line, title, detail, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
                params![
                    f.id.as_str(),
                    f.analyzer,
                    f.severity.as_str(),
                    f.category,
                    f.file_path,
                    f.line,
                    f.end_line,
                    f.title,
                    f.detail,
                    serde_json::to_string(&f.metadata)?,
                    f.created_at.as_nanos(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(findings)
    }

    /// Lists findings matching the given filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn findings_list(&self, filter: &FindingFilter) -> DbResult<Vec<Finding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM findings ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map([], row_to_finding)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter(|f| filter.analyzer.as_deref().is_none_or(|a| f.analyzer == a))
            .filter(|f| filter.severity.is_none_or(|s| f.severity == s))
            .filter(|f| filter.file_path.as_deref().is_none_or(|p| f.file_path == p))
            .collect())
    }

    /// Full-text searches findings by title/detail.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn findings_search(&self, query: &str, limit: usize) -> DbResult<Vec<Finding>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 { 20 } else { limit };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT f.* FROM findings_fts
            JOIN findings f ON f.id = findings_fts.id
            WHERE findings_fts MATCH ?1
            ORDER BY bm25(findings_fts)
            LIMIT ?2
            ",
        )?;
        let rows = stmt
            .query_map(params![query, limit as i64], row_to_finding)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Clears findings, optionally scoped to an analyzer or a file path.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn findings_clear(&self, analyzer: Option<&str>, file_path: Option<&str>) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = match (analyzer, file_path) {
            (Some(a), Some(p)) => conn.execute(
                "DELETE FROM findings WHERE analyzer = ?1 AND file_path = ?2",
                params![a, p],
            )?,
            (Some(a), None) => conn.execute("DELETE FROM findings WHERE analyzer = ?1", params![a])?,
            (None, Some(p)) => conn.execute("DELETE FROM findings WHERE file_path = ?1", params![p])?,
            (None, None) => conn.execute("DELETE FROM findings", [])?,
        };
        Ok(rows as u64)
    }

    /// Per-severity counts, for the Stats/Status RPC.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn findings_stats(&self) -> DbResult<BTreeMap<String, u64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT severity, COUNT(*) FROM findings GROUP BY severity")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;

    fn db() -> Database {
        Database::in_memory(StoreKind::Findings).unwrap()
    }

    fn sample(file: &str, severity: Severity) -> Finding {
        Finding {
            id: Id::new(),
            analyzer: "complexity".into(),
            severity,
            category: "complexity".into(),
            file_path: file.into(),
            line: 10,
            end_line: 20,
            title: "complex function".into(),
            detail: "cyclomatic complexity 15".into(),
            metadata: BTreeMap::new(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn rerun_is_idempotent() {
        let db = db();
        db.findings_replace_for_file("complexity", "a.rs", vec![sample("a.rs", Severity::Warning)])
            .unwrap();
        db.findings_replace_for_file("complexity", "a.rs", vec![sample("a.rs", Severity::Critical)])
            .unwrap();

        let all = db.findings_list(&FindingFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].severity, Severity::Critical);
    }

    #[test]
    fn clear_scoped_to_analyzer_and_file() {
        let db = db();
        db.findings_replace_for_file("complexity", "a.rs", vec![sample("a.rs", Severity::Warning)])
            .unwrap();
        db.findings_replace_for_file("secrets", "a.rs", vec![sample("a.rs", Severity::Critical)])
            .unwrap();

        let cleared = db.findings_clear(Some("complexity"), None).unwrap();
        assert_eq!(cleared, 1);

        let remaining = db.findings_list(&FindingFilter::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].analyzer, "secrets");
    }
}
