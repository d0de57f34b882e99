//! Decision collection: append-only history per topic.

use crate::error::DbResult;
use crate::types::Timestamp;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub topic: String,
    pub created_at: Timestamp,
    pub decision: String,
    pub rationale: Option<String>,
    pub details: Option<String>,
    pub references: Vec<String>,
    pub decided_by: Option<String>,
}

fn row_to_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<Decision> {
    let refs: String = row.get("refs")?;
    Ok(Decision {
        topic: row.get("topic")?,
        created_at: Timestamp::from_nanos(row.get("created_at")?),
        decision: row.get("decision")?,
        rationale: row.get("rationale")?,
        details: row.get("details")?,
        references: serde_json::from_str(&refs).unwrap_or_default(),
        decided_by: row.get("decided_by")?,
    })
}

impl Database {
    /// Appends a new decision record for `topic` (always an insert, never
    /// an update: decision history is append-only, spec §4.2).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the insert fails.
    pub fn decision_set(
        &self,
        topic: String,
        decision: String,
        rationale: Option<String>,
        details: Option<String>,
        references: Vec<String>,
        decided_by: Option<String>,
    ) -> DbResult<Decision> {
        let record = Decision {
            topic,
            created_at: Timestamp::now(),
            decision,
            rationale,
            details,
            references,
            decided_by,
        };

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO decisions (topic, created_at, decision, rationale, details, refs, decided_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                record.topic,
                record.created_at.as_nanos(),
                record.decision,
                record.rationale,
                record.details,
                serde_json::to_string(&record.references)?,
                record.decided_by,
            ],
        )?;

        Ok(record)
    }

    /// Returns the most recent decision for `topic` (largest `createdAt`).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn decision_get(&self, topic: &str) -> DbResult<Option<Decision>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM decisions WHERE topic = ?1 ORDER BY created_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![topic], row_to_decision)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Returns all decisions for `topic`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn decision_history(&self, topic: &str) -> DbResult<Vec<Decision>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM decisions WHERE topic = ?1 ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map(params![topic], row_to_decision)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Removes all decision records for `topic`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn decision_delete(&self, topic: &str) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM decisions WHERE topic = ?1", params![topic])?;
        Ok(rows as u64)
    }
}
