use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Lifecycle of a tracked file. Only `Pending` may move, and only forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    #[default]
    Pending,
    Archived,
    Ignored,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::Archived => "ARCHIVED",
            FileStatus::Ignored => "IGNORED",
        }
    }

    /// Rewriting the current status is allowed; otherwise only PENDING → ARCHIVED | IGNORED.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        self == next || (self == FileStatus::Pending && next != FileStatus::Pending)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FileStatus::Pending),
            "ARCHIVED" => Ok(FileStatus::Archived),
            "IGNORED" => Ok(FileStatus::Ignored),
            other => Err(InventoryError::CorruptStatus(other.to_string())),
        }
    }
}

impl ToSql for FileStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FileStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: InventoryError| FromSqlError::Other(Box::new(e)))
    }
}

/// One discovered file. `locator` is its absolute path and the inventory key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub locator: String,
    pub name: String,
    pub size: u64,
    /// epoch milliseconds
    pub added_date: i64,
    pub mime_type: String,
    #[serde(default)]
    pub status: FileStatus,
}

impl TrackedFile {
    pub fn new(
        locator: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        added_date: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        TrackedFile {
            locator: locator.into(),
            name: name.into(),
            size,
            added_date,
            mime_type: mime_type.into(),
            status: FileStatus::Pending,
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.locator)
    }

    pub fn with_status(mut self, status: FileStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == FileStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_forward_only() {
        assert!(FileStatus::Pending.can_transition_to(FileStatus::Archived));
        assert!(FileStatus::Pending.can_transition_to(FileStatus::Ignored));
        assert!(!FileStatus::Archived.can_transition_to(FileStatus::Pending));
        assert!(!FileStatus::Ignored.can_transition_to(FileStatus::Pending));
        assert!(!FileStatus::Archived.can_transition_to(FileStatus::Ignored));
        assert!(!FileStatus::Ignored.can_transition_to(FileStatus::Archived));
    }

    #[test]
    fn same_status_is_not_a_transition() {
        assert!(FileStatus::Archived.can_transition_to(FileStatus::Archived));
        assert!(FileStatus::Pending.can_transition_to(FileStatus::Pending));
    }

    #[test]
    fn status_text_round_trips() {
        for status in [FileStatus::Pending, FileStatus::Archived, FileStatus::Ignored] {
            assert_eq!(status.as_str().parse::<FileStatus>().unwrap(), status);
        }
        assert!(matches!(
            "DELETED".parse::<FileStatus>(),
            Err(InventoryError::CorruptStatus(s)) if s == "DELETED"
        ));
    }

    #[test]
    fn new_records_start_pending() {
        let file = TrackedFile::new("/tmp/a.txt", "a.txt", 3, 0, "text/plain");
        assert!(file.is_pending());
        assert_eq!(file.path(), Path::new("/tmp/a.txt"));
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&FileStatus::Archived).unwrap();
        assert_eq!(json, "\"ARCHIVED\"");
    }
}
