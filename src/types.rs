//! Type-safe newtypes and domain enums for `aide`.
//!
//! These newtypes provide compile-time safety and semantic clarity for core
//! domain concepts shared across the store, code indexer, and findings runner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use ulid::Ulid;

/// A 128-bit ULID-backed entity id, rendered as a 26-character string.
///
/// Used for memories, tasks, symbols, and findings — anything needing
/// lexicographically sortable, roughly time-ordered ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Ulid);

impl Id {
    /// Generates a new id from the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl From<Ulid> for Id {
    fn from(u: Ulid) -> Self {
        Self(u)
    }
}

/// Monotonic 64-bit message id, drawn from a SQLite `AUTOINCREMENT` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Priority in range [0.0, 1.0].
///
/// Stored as a `REAL` column clamped to bounds. No decay rule is implemented
/// (spec's Open Questions): this is a stored attribute only.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(f64);

impl Priority {
    pub const ZERO: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    /// Creates a new priority, saturating to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// Creates a priority from a value already known to be in bounds.
    ///
    /// # Safety
    /// Caller must ensure value is in `[0.0, 1.0]`.
    #[must_use]
    pub const fn new_unchecked(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A tag set, used by memories for filtering/search and by the default
/// exclude-tag post-query filter (`{"forget"}`).
pub type TagSet = BTreeSet<String>;

/// Memory category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Learning,
    Decision,
    Issue,
    Discovery,
    Blocker,
}

impl MemoryCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Decision => "decision",
            Self::Issue => "issue",
            Self::Discovery => "discovery",
            Self::Blocker => "blocker",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning" => Ok(Self::Learning),
            "decision" => Ok(Self::Decision),
            "issue" => Ok(Self::Issue),
            "discovery" => Ok(Self::Discovery),
            "blocker" => Ok(Self::Blocker),
            other => Err(format!("unknown memory category: {other}")),
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Done,
    Blocked,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "claimed" => Ok(Self::Claimed),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Finding severity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Absolute, nanosecond-precision UTC timestamp.
///
/// Stored as an `i64` nanoseconds-since-epoch SQLite `INTEGER` column;
/// exposed to callers as RFC3339 via `chrono`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn to_chrono(self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_nanos(self.0)
    }

    #[must_use]
    pub fn checked_add(self, duration: chrono::Duration) -> Option<Self> {
        let nanos = duration.num_nanoseconds()?;
        self.0.checked_add(nanos).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_chrono().to_rfc3339())
    }
}

// Compile-time assertions for thread safety. These ensure Send+Sync remain
// implemented and catch regressions.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<Id>();
    assert_send_sync::<MessageId>();
    assert_send_sync::<Priority>();
    assert_send_sync::<Timestamp>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_saturation() {
        assert_eq!(Priority::new(1.5).as_f64(), 1.0);
        assert_eq!(Priority::new(-0.5).as_f64(), 0.0);
        assert_eq!(Priority::new(0.5).as_f64(), 0.5);
    }

    #[test]
    fn id_roundtrip_via_string() {
        let id = Id::new();
        let s = id.as_str();
        let parsed: Id = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn memory_category_roundtrip() {
        for cat in [
            MemoryCategory::Learning,
            MemoryCategory::Decision,
            MemoryCategory::Issue,
            MemoryCategory::Discovery,
            MemoryCategory::Blocker,
        ] {
            let s = cat.to_string();
            let parsed: MemoryCategory = s.parse().unwrap();
            assert_eq!(cat, parsed);
        }
    }

    #[test]
    fn task_status_roundtrip() {
        for st in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::Done,
            TaskStatus::Blocked,
        ] {
            let s = st.to_string();
            let parsed: TaskStatus = s.parse().unwrap();
            assert_eq!(st, parsed);
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }
}
