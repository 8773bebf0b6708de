//! Out-of-band "you have stale files" alerts.
//!
//! Alerts carry a fixed id; raising the same id again replaces the earlier
//! alert instead of adding another one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::util::whole_days;

pub const STALE_FILES_NOTIFICATION: &str = "stale-files";

pub trait Notifier {
    fn notify(&self, count: usize);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub count: usize,
    /// epoch milliseconds
    pub created_at: i64,
}

impl Notification {
    pub fn stale_files(count: usize, threshold: Duration, created_at: i64) -> Self {
        let days = whole_days(i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX));
        let noun = if count == 1 { "file hasn't" } else { "files haven't" };

        Notification {
            id: STALE_FILES_NOTIFICATION.to_string(),
            title: "Unused files found".to_string(),
            body: format!("{count} {noun} been touched in {days} days. Clean them up?"),
            count,
            created_at,
        }
    }
}

/// Writes the alert to the log and stderr; an identical repeat is dropped.
pub struct LogNotifier {
    threshold: Duration,
    shown: Mutex<HashMap<String, usize>>,
}

impl LogNotifier {
    pub fn new(threshold: Duration) -> Self {
        LogNotifier {
            threshold,
            shown: Mutex::new(HashMap::new()),
        }
    }

    /// Records `count` for `id`; false when it repeats the last shown count.
    fn should_emit(&self, id: &str, count: usize) -> bool {
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        if shown.get(id) == Some(&count) {
            return false;
        }
        shown.insert(id.to_string(), count);
        true
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, count: usize) {
        let notification =
            Notification::stale_files(count, self.threshold, crate::util::now_millis());

        if !self.should_emit(&notification.id, count) {
            return;
        }

        info!(id = %notification.id, count, "{}", notification.body);
        eprintln!("{}: {}", notification.title, notification.body);
    }
}

/// Keeps the current alert as `<dir>/<id>.json` for other tools to pick up.
pub struct FileNotifier {
    dir: PathBuf,
    threshold: Duration,
}

impl FileNotifier {
    pub fn new(dir: impl Into<PathBuf>, threshold: Duration) -> Self {
        FileNotifier {
            dir: dir.into(),
            threshold,
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn post(&self, notification: &Notification) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&notification.id);
        let json = serde_json::to_string_pretty(notification)?;
        write_replacing(&path, json.as_bytes())?;
        Ok(path)
    }

    pub fn current(&self) -> Option<Notification> {
        let text = fs::read_to_string(self.path_for(STALE_FILES_NOTIFICATION)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(self.path_for(STALE_FILES_NOTIFICATION)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Notifier for FileNotifier {
    fn notify(&self, count: usize) {
        let notification =
            Notification::stale_files(count, self.threshold, crate::util::now_millis());
        if let Err(e) = self.post(&notification) {
            warn!(dir = %self.dir.display(), "failed to write notification: {e}");
        }
    }
}

/// Readers see either the old alert or the new one, never half of each.
fn write_replacing(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sends every alert to each inner notifier.
pub struct Fanout(pub Vec<Box<dyn Notifier>>);

impl Notifier for Fanout {
    fn notify(&self, count: usize) {
        for notifier in &self.0 {
            notifier.notify(count);
        }
    }
}
