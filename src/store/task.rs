//! Task collection: swarm coordination queue with atomic claim semantics.

use crate::error::DbResult;
use crate::types::{Id, TaskStatus, Timestamp};
use rusqlite::{params, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub worktree: Option<String>,
    pub result: Option<String>,
    pub created_at: Timestamp,
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let claimed_at: Option<i64> = row.get("claimed_at")?;
    let completed_at: Option<i64> = row.get("completed_at")?;

    Ok(Task {
        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
        title: row.get("title")?,
        description: row.get("description")?,
        status: status.parse().unwrap_or(TaskStatus::Pending),
        claimed_by: row.get("claimed_by")?,
        claimed_at: claimed_at.map(Timestamp::from_nanos),
        completed_at: completed_at.map(Timestamp::from_nanos),
        worktree: row.get("worktree")?,
        result: row.get("result")?,
        created_at: Timestamp::from_nanos(row.get("created_at")?),
    })
}

impl Database {
    /// Creates a new task in `pending` status.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the insert fails.
    pub fn task_create(&self, title: String, description: String) -> DbResult<Task> {
        let task = Task {
            id: Id::new(),
            title,
            description,
            status: TaskStatus::Pending,
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            worktree: None,
            result: None,
            created_at: Timestamp::now(),
        };

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO tasks (id, title, description, status, created_at)
            VALUES (?1, ?2, ?3, 'pending', ?4)
            ",
            params![task.id.as_str(), task.title, task.description, task.created_at.as_nanos()],
        )?;

        Ok(task)
    }

    /// Looks up a task by id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn task_get(&self, id: Id) -> DbResult<Option<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id.as_str()], row_to_task)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Lists tasks, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn task_list(&self, status: Option<TaskStatus>) -> DbResult<Vec<Task>> {
        let conn = self.conn()?;
        let rows = if let Some(status) = status {
            let mut stmt =
                conn.prepare("SELECT * FROM tasks WHERE status = ?1 ORDER BY created_at ASC")?;
            stmt.query_map(params![status.as_str()], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare("SELECT * FROM tasks ORDER BY created_at ASC")?;
            stmt.query_map([], row_to_task)?.collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Atomically claims a task: opens an immediate write transaction (the
    /// write lock is taken at `BEGIN`, not deferred to the first write), then
    /// re-reads the row and only transitions `pending -> claimed` if still
    /// pending. Returns `(task, true)` on success or `(None, false)` if the
    /// task was already claimed by the time this call's transaction ran.
    /// `Immediate` (rather than the default `Deferred`) matters under the
    /// file-backed pool: a deferred transaction that reads then writes can
    /// lose to `SQLITE_BUSY_SNAPSHOT` if another connection commits between
    /// the read and the write, which is not a retryable-by-`busy_timeout`
    /// failure and would surface as a generic `DbError::Sqlite` instead of
    /// the clean "already claimed" outcome (spec §8 invariant 1 / scenario
    /// E1). Taking the write lock upfront makes losers fail at `BEGIN`
    /// instead, which maps deterministically to `(None, false)`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the transaction fails, or
    /// `DbError::RecordNotFound` if the task id does not exist.
    pub fn task_claim(&self, id: Id, agent: &str, worktree: Option<&str>) -> DbResult<(Option<Task>, bool)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row("SELECT status FROM tasks WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .ok();

        let Some(status) = status else {
            return Err(crate::error::DbError::RecordNotFound {
                collection: "tasks",
                key: id.as_str(),
            });
        };

        if status != "pending" {
            tx.rollback()?;
            return Ok((None, false));
        }

        let claimed_at = Timestamp::now();
        tx.execute(
            r"
            UPDATE tasks SET status = 'claimed', claimed_by = ?2, claimed_at = ?3, worktree = ?4
            WHERE id = ?1
            ",
            params![id.as_str(), agent, claimed_at.as_nanos(), worktree],
        )?;
        tx.commit()?;

        Ok((self.task_get(id)?, true))
    }

    /// Updates a task's result/description without changing status.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the update fails.
    pub fn task_update(&self, id: Id, result: Option<String>) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("UPDATE tasks SET result = ?2 WHERE id = ?1", params![id.as_str(), result])?;
        Ok(rows > 0)
    }

    /// Marks a task `done`, setting `completedAt`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the update fails.
    pub fn task_complete(&self, id: Id, result: Option<String>) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            r"
            UPDATE tasks SET status = 'done', completed_at = ?2, result = ?3
            WHERE id = ?1
            ",
            params![id.as_str(), Timestamp::now().as_nanos(), result],
        )?;
        Ok(rows > 0)
    }

    /// Deletes a task by id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn task_delete(&self, id: Id) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    /// Deletes every task.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn task_clear(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM tasks", [])?;
        Ok(rows as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;
    use std::sync::Arc;
    use std::thread;

    fn db() -> Database {
        Database::in_memory(StoreKind::Memory).unwrap()
    }

    #[test]
    fn claim_pending_task_succeeds() {
        let db = db();
        let task = db.task_create("A".into(), String::new()).unwrap();

        let (claimed, success) = db.task_claim(task.id, "a1", None).unwrap();
        assert!(success);
        let claimed = claimed.unwrap();
        assert_eq!(claimed.status, TaskStatus::Claimed);
        assert_eq!(claimed.claimed_by.as_deref(), Some("a1"));
    }

    #[test]
    fn claim_already_claimed_fails() {
        let db = db();
        let task = db.task_create("A".into(), String::new()).unwrap();

        db.task_claim(task.id, "a1", None).unwrap();
        let (result, success) = db.task_claim(task.id, "a2", None).unwrap();
        assert!(!success);
        assert!(result.is_none());
    }

    #[test]
    fn concurrent_claims_exactly_one_winner() {
        // Note: in-memory SQLite pool has max_size=1 here so this exercises
        // serialization via the single shared connection; a file-backed
        // database under WAL serializes writers the same way.
        let db = Arc::new(db());
        let task = db.task_create("A".into(), String::new()).unwrap();

        let mut handles = Vec::new();
        for agent in ["a1", "a2", "a3"] {
            let db = Arc::clone(&db);
            let id = task.id;
            handles.push(thread::spawn(move || db.task_claim(id, agent, None)));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
        let successes = results.iter().filter(|(_, ok)| *ok).count();
        assert_eq!(successes, 1);

        let winner = results.iter().find(|(_, ok)| *ok).unwrap().0.clone().unwrap();
        assert!(["a1", "a2", "a3"].contains(&winner.claimed_by.unwrap().as_str()));
    }

    #[test]
    fn complete_sets_completed_at() {
        let db = db();
        let task = db.task_create("A".into(), String::new()).unwrap();
        db.task_claim(task.id, "a1", None).unwrap();
        db.task_complete(task.id, Some("done!".into())).unwrap();

        let fetched = db.task_get(task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Done);
        assert!(fetched.completed_at.is_some());
    }
}
