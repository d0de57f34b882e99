//! Memory collection: durable notes/learnings/decisions kept by agents.

use crate::error::{DbError, DbResult};
use crate::types::{Id, MemoryCategory, Priority, TagSet, Timestamp};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Database;

/// The default exclude-tag filter applied to List/Search unless the caller
/// opts into "all" (spec §4.2).
pub const DEFAULT_EXCLUDE_TAGS: &[&str] = &["forget"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Id,
    pub category: MemoryCategory,
    pub content: String,
    pub tags: TagSet,
    pub priority: Priority,
    pub plan: Option<String>,
    pub agent: Option<String>,
    pub namespace: Option<String>,
    pub access_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_accessed: Option<Timestamp>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryListFilter {
    pub category: Option<MemoryCategory>,
    pub plan: Option<String>,
    pub tags: Vec<String>,
    pub namespace: Option<String>,
    pub include_all: bool,
    pub limit: usize,
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let id: String = row.get("id")?;
    let category: String = row.get("category")?;
    let tags: String = row.get("tags")?;
    let last_accessed: Option<i64> = row.get("last_accessed")?;

    Ok(Memory {
        id: id.parse().unwrap_or_default(),
        category: category.parse().unwrap_or(MemoryCategory::Learning),
        content: row.get("content")?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        priority: Priority::new(row.get("priority")?),
        plan: row.get("plan")?,
        agent: row.get("agent")?,
        namespace: row.get("namespace")?,
        access_count: row.get::<_, i64>("access_count")? as u64,
        created_at: Timestamp::from_nanos(row.get("created_at")?),
        updated_at: Timestamp::from_nanos(row.get("updated_at")?),
        last_accessed: last_accessed.map(Timestamp::from_nanos),
    })
}

impl Database {
    /// Creates a new memory record.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the insert fails.
    pub fn memory_add(
        &self,
        category: MemoryCategory,
        content: String,
        tags: TagSet,
        priority: Priority,
        plan: Option<String>,
        agent: Option<String>,
        namespace: Option<String>,
    ) -> DbResult<Memory> {
        let now = Timestamp::now();
        let memory = Memory {
            id: Id::new(),
            category,
            content,
            tags,
            priority,
            plan,
            agent,
            namespace,
            access_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed: None,
        };

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO memories
                (id, category, content, tags, priority, plan, agent, namespace,
                 access_count, created_at, updated_at, last_accessed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9, NULL)
            ",
            params![
                memory.id.as_str(),
                memory.category.as_str(),
                memory.content,
                serde_json::to_string(&memory.tags)?,
                memory.priority.as_f64(),
                memory.plan,
                memory.agent,
                memory.namespace,
                now.as_nanos(),
            ],
        )?;

        Ok(memory)
    }

    /// Looks up a memory by id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn memory_get(&self, id: Id) -> DbResult<Option<Memory>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM memories WHERE id = ?1",
            params![id.as_str()],
            row_to_memory,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Updates `accessCount`/`lastAccessed` for a memory (search-hit or
    /// explicit Touch).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the update fails.
    pub fn memory_touch(&self, id: Id) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            r"
            UPDATE memories
            SET access_count = access_count + 1, last_accessed = ?2
            WHERE id = ?1
            ",
            params![id.as_str(), Timestamp::now().as_nanos()],
        )?;
        Ok(rows > 0)
    }

    /// Lists memories matching the given filter, applying the default
    /// exclude-tag filter unless `include_all` is set.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn memory_list(&self, filter: &MemoryListFilter) -> DbResult<Vec<Memory>> {
        let conn = self.conn()?;
        let mut sql = String::from("SELECT * FROM memories WHERE 1=1");
        if filter.category.is_some() {
            sql.push_str(" AND category = ?1");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(cat) = filter.category {
            stmt.query_map(params![cat.as_str()], row_to_memory)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([], row_to_memory)?
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(apply_list_filters(rows, filter))
    }

    /// Full-text searches memories by content/tags/plan.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn memory_search(&self, query: &str, limit: usize) -> DbResult<Vec<Memory>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 { 10 } else { limit };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT m.* FROM memories_fts
            JOIN memories m ON m.id = memories_fts.id
            WHERE memories_fts MATCH ?1
            ORDER BY bm25(memories_fts)
            LIMIT ?2
            ",
        )?;

        let results = stmt
            .query_map(params![query, limit as i64], row_to_memory)?
            .collect::<Result<Vec<_>, _>>()?;

        for m in &results {
            let _ = self.memory_touch(m.id);
        }

        let filter = MemoryListFilter {
            limit,
            ..Default::default()
        };
        Ok(apply_list_filters(results, &filter))
    }

    /// Deletes a memory by id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn memory_delete(&self, id: Id) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM memories WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    /// Clears memories, optionally scoped to a category; `None` clears all.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn memory_clear(&self, category: Option<MemoryCategory>) -> DbResult<u64> {
        let conn = self.conn()?;
        let rows = if let Some(cat) = category {
            conn.execute("DELETE FROM memories WHERE category = ?1", params![cat.as_str()])?
        } else {
            conn.execute("DELETE FROM memories", [])?
        };
        Ok(rows as u64)
    }

    /// Exports all memories (for the out-of-scope export renderer's data
    /// source — this crate only provides the raw records).
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn memory_export(&self) -> DbResult<Vec<Memory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM memories ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], row_to_memory)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn apply_list_filters(rows: Vec<Memory>, filter: &MemoryListFilter) -> Vec<Memory> {
    let exclude: BTreeSet<&str> = if filter.include_all {
        BTreeSet::new()
    } else {
        DEFAULT_EXCLUDE_TAGS.iter().copied().collect()
    };

    let mut out: Vec<Memory> = rows
        .into_iter()
        .filter(|m| exclude.is_empty() || !m.tags.iter().any(|t| exclude.contains(t.as_str())))
        .filter(|m| {
            filter.plan.as_ref().is_none_or(|p| m.plan.as_deref() == Some(p.as_str()))
        })
        .filter(|m| {
            filter
                .namespace
                .as_ref()
                .is_none_or(|ns| m.namespace.as_deref() == Some(ns.as_str()))
        })
        .filter(|m| filter.tags.iter().all(|t| m.tags.contains(t)))
        .collect();

    if filter.limit > 0 {
        out.truncate(filter.limit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;

    fn db() -> Database {
        Database::in_memory(StoreKind::Memory).unwrap()
    }

    #[test]
    fn add_and_get_roundtrip() {
        let db = db();
        let m = db
            .memory_add(
                MemoryCategory::Learning,
                "learned something".into(),
                TagSet::new(),
                Priority::new(0.5),
                None,
                None,
                None,
            )
            .unwrap();

        let fetched = db.memory_get(m.id).unwrap().unwrap();
        assert_eq!(fetched.content, "learned something");
        assert_eq!(fetched.category, MemoryCategory::Learning);
    }

    #[test]
    fn get_missing_returns_none() {
        let db = db();
        assert!(db.memory_get(Id::new()).unwrap().is_none());
    }

    #[test]
    fn default_filter_excludes_forget_tag() {
        let db = db();
        let mut forget_tags = TagSet::new();
        forget_tags.insert("forget".to_string());

        db.memory_add(
            MemoryCategory::Issue,
            "visible".into(),
            TagSet::new(),
            Priority::ZERO,
            None,
            None,
            None,
        )
        .unwrap();
        db.memory_add(
            MemoryCategory::Issue,
            "hidden".into(),
            forget_tags,
            Priority::ZERO,
            None,
            None,
            None,
        )
        .unwrap();

        let results = db.memory_list(&MemoryListFilter::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "visible");
    }

    #[test]
    fn clear_by_category() {
        let db = db();
        db.memory_add(
            MemoryCategory::Learning,
            "a".into(),
            TagSet::new(),
            Priority::ZERO,
            None,
            None,
            None,
        )
        .unwrap();
        db.memory_add(
            MemoryCategory::Blocker,
            "b".into(),
            TagSet::new(),
            Priority::ZERO,
            None,
            None,
            None,
        )
        .unwrap();

        let cleared = db.memory_clear(Some(MemoryCategory::Learning)).unwrap();
        assert_eq!(cleared, 1);

        let remaining = db
            .memory_list(&MemoryListFilter {
                include_all: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].category, MemoryCategory::Blocker);
    }

    #[test]
    fn empty_search_query_returns_no_results() {
        let db = db();
        db.memory_add(
            MemoryCategory::Learning,
            "findable content".into(),
            TagSet::new(),
            Priority::ZERO,
            None,
            None,
            None,
        )
        .unwrap();

        assert!(db.memory_search("", 10).unwrap().is_empty());
    }
}
