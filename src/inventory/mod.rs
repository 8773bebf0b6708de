//! SQLite file inventory.
//!
//! One table, `file_inventory`, keyed by locator:
//! - locator, name, size, added_date, mime_type, status
//!
//! Supports:
//! - Bulk insert that ignores already tracked locators (first write wins)
//! - Pending list ordered oldest first, as a query or as a live feed
//! - Forward-only status updates (PENDING → ARCHIVED | IGNORED)

mod feed;
mod record;

pub use feed::PendingFeed;
pub use record::{FileStatus, TrackedFile};

use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::InventoryError;
use crate::platform;

const SELECT_COLUMNS: &str = "SELECT locator, name, size, added_date, mime_type, status FROM file_inventory";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub archived: usize,
    pub ignored: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.archived + self.ignored
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS file_inventory (
            locator TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            size INTEGER NOT NULL,
            added_date INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inventory_status_added ON file_inventory(status, added_date)",
        [],
    )?;

    Ok(())
}

/// Database handle. Open once per process and share by reference or `Arc`.
pub struct Inventory {
    conn: Mutex<Connection>,
    subscribers: Mutex<Vec<Sender<Vec<TrackedFile>>>>,
}

impl Inventory {
    pub fn open(path: &Path) -> Result<Self, InventoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| InventoryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %path.display(), "opened inventory");
        Self::with_connection(conn)
    }

    /// Opens `vaultkeep.db` under the platform data directory.
    pub fn open_default() -> Result<Self, InventoryError> {
        let data_dir = platform::data_dir().ok_or(InventoryError::DataDir)?;
        Self::open(&data_dir.join("vaultkeep.db"))
    }

    pub fn open_in_memory() -> Result<Self, InventoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, InventoryError> {
        init_schema(&conn)?;
        Ok(Inventory {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Sender<Vec<TrackedFile>>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks new files. Locators already present are left untouched.
    /// Returns how many records were actually added.
    pub fn insert_many(&self, files: &[TrackedFile]) -> Result<usize, InventoryError> {
        let inserted = {
            let mut conn = self.conn();
            let tx = conn.transaction()?;

            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO file_inventory (locator, name, size, added_date, mime_type, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            let mut inserted = 0;
            for file in files {
                inserted += stmt.execute(params![
                    file.locator,
                    file.name,
                    i64::try_from(file.size).unwrap_or(i64::MAX),
                    file.added_date,
                    file.mime_type,
                    file.status,
                ])?;
            }

            drop(stmt);
            tx.commit()?;
            inserted
        };

        debug!(offered = files.len(), inserted, "inventory insert");
        if inserted > 0 {
            self.publish();
        }
        Ok(inserted)
    }

    /// Replaces the record matching `file.locator`.
    ///
    /// Returns `Ok(false)` when nothing is tracked under that locator. A status
    /// change that would leave ARCHIVED or IGNORED is rejected.
    pub fn update(&self, file: &TrackedFile) -> Result<bool, InventoryError> {
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;

            let current: Option<FileStatus> = tx
                .query_row(
                    "SELECT status FROM file_inventory WHERE locator = ?1",
                    params![file.locator],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(current) = current else {
                debug!(locator = %file.locator, "update of untracked file ignored");
                return Ok(false);
            };

            if !current.can_transition_to(file.status) {
                return Err(InventoryError::InvalidTransition {
                    locator: file.locator.clone(),
                    from: current,
                    to: file.status,
                });
            }

            tx.execute(
                "UPDATE file_inventory
                 SET name = ?2, size = ?3, added_date = ?4, mime_type = ?5, status = ?6
                 WHERE locator = ?1",
                params![
                    file.locator,
                    file.name,
                    i64::try_from(file.size).unwrap_or(i64::MAX),
                    file.added_date,
                    file.mime_type,
                    file.status,
                ],
            )?;
            tx.commit()?;
        }

        self.publish();
        Ok(true)
    }

    pub fn set_status(&self, locator: &str, status: FileStatus) -> Result<bool, InventoryError> {
        match self.get(locator)? {
            Some(file) => self.update(&file.with_status(status)),
            None => Ok(false),
        }
    }

    pub fn get(&self, locator: &str) -> Result<Option<TrackedFile>, InventoryError> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!("{SELECT_COLUMNS} WHERE locator = ?1"))?;
        let file = stmt.query_row(params![locator], file_from_row).optional()?;
        Ok(file)
    }

    /// PENDING records, oldest first.
    pub fn list_pending(&self) -> Result<Vec<TrackedFile>, InventoryError> {
        self.list(Some(FileStatus::Pending))
    }

    /// All records, or those with one status, oldest first.
    pub fn list(&self, status: Option<FileStatus>) -> Result<Vec<TrackedFile>, InventoryError> {
        let conn = self.conn();

        let files = match status {
            Some(status) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "{SELECT_COLUMNS} WHERE status = ?1 ORDER BY added_date ASC, locator ASC"
                ))?;
                let rows = stmt.query_map(params![status], file_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "{SELECT_COLUMNS} ORDER BY added_date ASC, locator ASC"
                ))?;
                let rows = stmt.query_map([], file_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(files)
    }

    /// Stops tracking a locator. Used once the file itself is gone.
    pub fn remove(&self, locator: &str) -> Result<bool, InventoryError> {
        let removed = self
            .conn()
            .execute("DELETE FROM file_inventory WHERE locator = ?1", params![locator])?;

        if removed > 0 {
            debug!(%locator, "removed from inventory");
            self.publish();
        }
        Ok(removed > 0)
    }

    pub fn counts(&self) -> Result<StatusCounts, InventoryError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare_cached("SELECT status, COUNT(*) FROM file_inventory GROUP BY status")?;

        let mut counts = StatusCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, FileStatus>(0)?, row.get::<_, i64>(1)?.max(0) as usize))
        })?;

        for row in rows {
            let (status, count) = row?;
            match status {
                FileStatus::Pending => counts.pending = count,
                FileStatus::Archived => counts.archived = count,
                FileStatus::Ignored => counts.ignored = count,
            }
        }

        Ok(counts)
    }

    /// Live pending list. The current list is delivered immediately.
    pub fn subscribe(&self) -> Result<PendingFeed, InventoryError> {
        // held across the snapshot so a concurrent write cannot slip between
        // the snapshot and registration unseen
        let mut subscribers = self.subscribers();
        let (tx, rx) = mpsc::channel();
        // receiver is alive, send cannot fail
        let _ = tx.send(self.list_pending()?);
        subscribers.push(tx);
        Ok(PendingFeed::new(rx))
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn publish(&self) {
        let mut subscribers = self.subscribers();
        if subscribers.is_empty() {
            return;
        }

        match self.list_pending() {
            Ok(pending) => subscribers.retain(|tx| tx.send(pending.clone()).is_ok()),
            Err(e) => warn!("failed to refresh pending feed: {e}"),
        }
    }
}

fn file_from_row(row: &rusqlite::Row) -> rusqlite::Result<TrackedFile> {
    Ok(TrackedFile {
        locator: row.get(0)?,
        name: row.get(1)?,
        size: row.get::<_, i64>(2)?.max(0) as u64,
        added_date: row.get(3)?,
        mime_type: row.get(4)?,
        status: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn file(locator: &str, added: i64) -> TrackedFile {
        TrackedFile::new(locator, locator.trim_start_matches('/'), 10, added, "text/plain")
    }

    fn inventory() -> Inventory {
        Inventory::open_in_memory().unwrap()
    }

    fn locators(files: &[TrackedFile]) -> Vec<&str> {
        files.iter().map(|f| f.locator.as_str()).collect()
    }

    #[test]
    fn duplicate_insert_keeps_first_write() {
        let inv = inventory();
        assert_eq!(inv.insert_many(&[file("/a", 100)]).unwrap(), 1);

        let mut second = file("/a", 999);
        second.name = "renamed".into();
        second.size = 5;
        assert_eq!(inv.insert_many(&[second]).unwrap(), 0);

        let all = inv.list(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "a");
        assert_eq!(all[0].size, 10);
        assert_eq!(all[0].added_date, 100);
        assert_eq!(all[0].status, FileStatus::Pending);
    }

    #[test]
    fn duplicate_insert_does_not_reset_status() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 100)]).unwrap();
        inv.set_status("/a", FileStatus::Archived).unwrap();

        inv.insert_many(&[file("/a", 100)]).unwrap();
        assert_eq!(inv.get("/a").unwrap().unwrap().status, FileStatus::Archived);
    }

    #[test]
    fn duplicates_within_one_batch_collapse() {
        let inv = inventory();
        let inserted = inv.insert_many(&[file("/a", 1), file("/a", 2), file("/b", 3)]).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(inv.get("/a").unwrap().unwrap().added_date, 1);
    }

    #[test]
    fn pending_listed_oldest_first() {
        let inv = inventory();
        inv.insert_many(&[file("/mid", 500), file("/new", 900), file("/old", 100)]).unwrap();

        let pending = inv.list_pending().unwrap();
        assert_eq!(locators(&pending), vec!["/old", "/mid", "/new"]);
    }

    #[test]
    fn pending_excludes_other_statuses() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 1), file("/b", 2), file("/c", 3)]).unwrap();
        inv.set_status("/a", FileStatus::Archived).unwrap();
        inv.set_status("/c", FileStatus::Ignored).unwrap();

        assert_eq!(locators(&inv.list_pending().unwrap()), vec!["/b"]);
        assert_eq!(locators(&inv.list(Some(FileStatus::Ignored)).unwrap()), vec!["/c"]);
    }

    #[test]
    fn archived_and_ignored_never_return_to_pending() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 1), file("/b", 2)]).unwrap();
        inv.set_status("/a", FileStatus::Archived).unwrap();
        inv.set_status("/b", FileStatus::Ignored).unwrap();

        for (locator, from) in [("/a", FileStatus::Archived), ("/b", FileStatus::Ignored)] {
            let err = inv.set_status(locator, FileStatus::Pending).unwrap_err();
            assert!(matches!(
                err,
                InventoryError::InvalidTransition { from: f, to: FileStatus::Pending, .. } if f == from
            ));
            assert_eq!(inv.get(locator).unwrap().unwrap().status, from);
        }

        assert!(inv.set_status("/a", FileStatus::Ignored).is_err());
    }

    #[test]
    fn update_replaces_fields_in_place() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 1)]).unwrap();

        let mut changed = file("/a", 1).with_status(FileStatus::Archived);
        changed.size = 42;
        assert!(inv.update(&changed).unwrap());

        assert_eq!(inv.get("/a").unwrap().unwrap(), changed);
    }

    #[test]
    fn update_of_untracked_locator_is_noop() {
        let inv = inventory();
        assert!(!inv.update(&file("/ghost", 1)).unwrap());
        assert!(inv.list(None).unwrap().is_empty());
        assert!(!inv.set_status("/ghost", FileStatus::Ignored).unwrap());
    }

    #[test]
    fn remove_drops_record() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 1)]).unwrap();
        assert!(inv.remove("/a").unwrap());
        assert!(!inv.remove("/a").unwrap());
        assert!(inv.get("/a").unwrap().is_none());
    }

    #[test]
    fn counts_by_status() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 1), file("/b", 2), file("/c", 3)]).unwrap();
        inv.set_status("/a", FileStatus::Archived).unwrap();

        let counts = inv.counts().unwrap();
        assert_eq!(counts, StatusCounts { pending: 2, archived: 1, ignored: 0 });
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn feed_starts_with_snapshot_and_follows_writes() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 5)]).unwrap();

        let feed = inv.subscribe().unwrap();
        assert_eq!(locators(&feed.try_next().unwrap()), vec!["/a"]);
        assert!(feed.try_next().is_none());

        inv.insert_many(&[file("/b", 1)]).unwrap();
        assert_eq!(locators(&feed.try_next().unwrap()), vec!["/b", "/a"]);

        inv.set_status("/a", FileStatus::Ignored).unwrap();
        assert_eq!(locators(&feed.try_next().unwrap()), vec!["/b"]);
    }

    #[test]
    fn duplicate_only_insert_is_silent() {
        let inv = inventory();
        inv.insert_many(&[file("/a", 5)]).unwrap();
        let feed = inv.subscribe().unwrap();
        feed.try_next().unwrap();

        inv.insert_many(&[file("/a", 5)]).unwrap();
        assert!(feed.try_next().is_none());
    }

    #[test]
    fn dropped_feed_is_pruned_and_restartable() {
        let inv = inventory();
        let feed = inv.subscribe().unwrap();
        assert_eq!(inv.subscriber_count(), 1);
        feed.cancel();

        inv.insert_many(&[file("/a", 1)]).unwrap();
        assert_eq!(inv.subscriber_count(), 0);

        let restarted = inv.subscribe().unwrap();
        assert_eq!(locators(&restarted.latest().unwrap()), vec!["/a"]);
    }

    #[test]
    fn feed_consumed_on_another_thread() {
        let inv = Arc::new(inventory());
        let mut feed = inv.subscribe().unwrap();

        let reader = thread::spawn(move || {
            // initial empty snapshot, then the insert
            let first = feed.next().unwrap();
            let second = feed.next().unwrap();
            (first.len(), second.len())
        });

        inv.insert_many(&[file("/a", 1), file("/b", 2)]).unwrap();
        assert_eq!(reader.join().unwrap(), (0, 2));
    }

    #[test]
    fn concurrent_inserts_of_same_locator_keep_one_record() {
        let inv = Arc::new(inventory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let inv = Arc::clone(&inv);
                thread::spawn(move || inv.insert_many(&[file("/shared", i)]).unwrap())
            })
            .collect();

        let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(inserted, 1);
        assert_eq!(inv.list(None).unwrap().len(), 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.db");

        {
            let inv = Inventory::open(&path).unwrap();
            inv.insert_many(&[file("/a", 1)]).unwrap();
            inv.set_status("/a", FileStatus::Ignored).unwrap();
        }

        let inv = Inventory::open(&path).unwrap();
        assert_eq!(inv.get("/a").unwrap().unwrap().status, FileStatus::Ignored);
    }
}
