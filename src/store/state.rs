//! State collection: direct and agent-scoped key/value entries.

use crate::error::DbResult;
use crate::types::Timestamp;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: String,
    pub value: String,
    pub agent: Option<String>,
    pub updated_at: Timestamp,
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<StateEntry> {
    Ok(StateEntry {
        key: row.get("key")?,
        value: row.get("value")?,
        agent: row.get("agent")?,
        updated_at: Timestamp::from_nanos(row.get("updated_at")?),
    })
}

/// Builds the composite key `agent:<agentId>:<key>` used for agent-scoped
/// state entries (spec §4.2).
#[must_use]
pub fn agent_scoped_key(agent: &str, key: &str) -> String {
    format!("agent:{agent}:{key}")
}

impl Database {
    /// Sets (overwrites) a state entry.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the upsert fails.
    pub fn state_set(&self, key: &str, value: &str, agent: Option<&str>) -> DbResult<StateEntry> {
        let entry = StateEntry {
            key: key.to_string(),
            value: value.to_string(),
            agent: agent.map(str::to_string),
            updated_at: Timestamp::now(),
        };

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO state_entries (key, value, agent, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value, agent = excluded.agent, updated_at = excluded.updated_at
            ",
            params![entry.key, entry.value, entry.agent, entry.updated_at.as_nanos()],
        )?;

        Ok(entry)
    }

    /// Gets a state entry by key.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn state_get(&self, key: &str) -> DbResult<Option<StateEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM state_entries WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], row_to_state)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Lists all state entries, optionally scoped by agent prefix.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn state_list(&self, agent: Option<&str>) -> DbResult<Vec<StateEntry>> {
        let conn = self.conn()?;
        let rows = if let Some(agent) = agent {
            let prefix = format!("agent:{agent}:%");
            let mut stmt =
                conn.prepare("SELECT * FROM state_entries WHERE key LIKE ?1 ORDER BY key")?;
            stmt.query_map(params![prefix], row_to_state)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare("SELECT * FROM state_entries ORDER BY key")?;
            stmt.query_map([], row_to_state)?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Deletes a state entry by key.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn state_delete(&self, key: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM state_entries WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Deletes all state entries for an agent.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn state_clear_agent(&self, agent: &str) -> DbResult<u64> {
        let conn = self.conn()?;
        let prefix = format!("agent:{agent}:%");
        let rows = conn.execute("DELETE FROM state_entries WHERE key LIKE ?1", params![prefix])?;
        Ok(rows as u64)
    }

    /// Deletes every state entry.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn state_clear_all(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM state_entries", [])?;
        Ok(rows as u64)
    }

    /// Deletes state entries whose `updatedAt` is older than `now - max_age`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn state_cleanup_stale(&self, max_age: chrono::Duration) -> DbResult<u64> {
        let cutoff = Timestamp::now()
            .checked_add(-max_age)
            .unwrap_or(Timestamp::from_nanos(0));
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM state_entries WHERE updated_at < ?1",
            params![cutoff.as_nanos()],
        )?;
        Ok(rows as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;

    fn db() -> Database {
        Database::in_memory(StoreKind::Memory).unwrap()
    }

    #[test]
    fn set_then_get() {
        let db = db();
        db.state_set("phase", "building", None).unwrap();
        let entry = db.state_get("phase").unwrap().unwrap();
        assert_eq!(entry.value, "building");
    }

    #[test]
    fn set_overwrites() {
        let db = db();
        db.state_set("phase", "building", None).unwrap();
        db.state_set("phase", "testing", None).unwrap();
        let entry = db.state_get("phase").unwrap().unwrap();
        assert_eq!(entry.value, "testing");
    }

    #[test]
    fn agent_scoped_key_round_trips() {
        let db = db();
        let key = agent_scoped_key("a1", "focus");
        db.state_set(&key, "indexing", Some("a1")).unwrap();

        let listed = db.state_list(Some("a1")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, key);
    }

    #[test]
    fn delete_by_key() {
        let db = db();
        db.state_set("k", "v", None).unwrap();
        assert!(db.state_delete("k").unwrap());
        assert!(db.state_get("k").unwrap().is_none());
    }
}
