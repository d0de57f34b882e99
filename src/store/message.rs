//! Message collection: broadcast/direct messages with TTL expiry.

use crate::error::DbResult;
use crate::types::{MessageId, Timestamp};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Database;

/// Default message time-to-live: one hour (spec §4.2).
pub const DEFAULT_TTL: chrono::Duration = chrono::Duration::hours(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub content: String,
    pub msg_type: String,
    pub read_by: BTreeSet<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let read_by: String = row.get("read_by")?;
    Ok(Message {
        id: MessageId::new(row.get("id")?),
        from: row.get("from_agent")?,
        to: row.get("to_agent")?,
        content: row.get("content")?,
        msg_type: row.get("msg_type")?,
        read_by: serde_json::from_str(&read_by).unwrap_or_default(),
        created_at: Timestamp::from_nanos(row.get("created_at")?),
        expires_at: Timestamp::from_nanos(row.get("expires_at")?),
    })
}

impl Database {
    /// Sends a message, setting `expiresAt = createdAt + ttl` (default one
    /// hour when `ttl` is `None`).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the insert fails.
    pub fn message_send(
        &self,
        from: String,
        to: String,
        content: String,
        msg_type: String,
        ttl: Option<chrono::Duration>,
    ) -> DbResult<Message> {
        let created_at = Timestamp::now();
        let expires_at = created_at
            .checked_add(ttl.unwrap_or(DEFAULT_TTL))
            .unwrap_or(created_at);

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO messages (from_agent, to_agent, content, msg_type, read_by, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?6)
            ",
            params![from, to, content, msg_type, created_at.as_nanos(), expires_at.as_nanos()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Message {
            id: MessageId::new(id),
            from,
            to,
            content,
            msg_type,
            read_by: BTreeSet::new(),
            created_at,
            expires_at,
        })
    }

    /// Opportunistically prunes expired messages, then returns every message
    /// addressed to `agent` (directly or by broadcast, `to` empty).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if a query fails.
    pub fn message_list(&self, agent: &str) -> DbResult<Vec<Message>> {
        self.message_prune()?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM messages WHERE to_agent = '' OR to_agent = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![agent], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Appends `agent` to a message's `readBy` set (idempotent).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the update fails.
    pub fn message_ack(&self, id: MessageId, agent: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let read_by: Option<String> = conn
            .query_row(
                "SELECT read_by FROM messages WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .ok();

        let Some(read_by) = read_by else {
            return Ok(false);
        };

        let mut set: BTreeSet<String> = serde_json::from_str(&read_by).unwrap_or_default();
        set.insert(agent.to_string());

        conn.execute(
            "UPDATE messages SET read_by = ?2 WHERE id = ?1",
            params![id.0, serde_json::to_string(&set)?],
        )?;
        Ok(true)
    }

    /// Removes all messages whose `expiresAt < now`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn message_prune(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM messages WHERE expires_at < ?1",
            params![Timestamp::now().as_nanos()],
        )?;
        Ok(rows as u64)
    }

    /// Removes all messages sent by or to `agent`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn message_clear(&self, agent: &str) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM messages WHERE from_agent = ?1 OR to_agent = ?1",
            params![agent],
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
    fn broadcast_visible_to_any_agent() {
        let db = db();
        db.message_send("a1".into(), String::new(), "hello all".into(), "info".into(), None)
            .unwrap();

        let inbox = db.message_list("a2").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "hello all");
    }

    #[test]
    fn direct_message_not_visible_to_others() {
        let db = db();
        db.message_send("a1".into(), "a2".into(), "psst".into(), "info".into(), None)
            .unwrap();

        assert!(db.message_list("a3").unwrap().is_empty());
        assert_eq!(db.message_list("a2").unwrap().len(), 1);
    }

    #[test]
    fn ack_is_idempotent() {
        let db = db();
        let msg = db
            .message_send("a1".into(), "a2".into(), "hi".into(), "info".into(), None)
            .unwrap();

        db.message_ack(msg.id, "a2").unwrap();
        db.message_ack(msg.id, "a2").unwrap();
        db.message_ack(msg.id, "a2").unwrap();

        let inbox = db.message_list("a2").unwrap();
        assert_eq!(inbox[0].read_by.iter().filter(|a| *a == "a2").count(), 1);
    }

    #[test]
    fn prune_removes_expired_only() {
        let db = db();
        db.message_send(
            "a1".into(),
            String::new(),
            "expired".into(),
            "info".into(),
            Some(chrono::Duration::nanoseconds(-1)),
        )
        .unwrap();
        db.message_send("a1".into(), String::new(), "fresh".into(), "info".into(), None)
            .unwrap();

        let pruned = db.message_prune().unwrap();
        assert_eq!(pruned, 1);

        let remaining = db.message_list("anyone").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "fresh");
    }
}
