use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::inventory::TrackedFile;

/// Content type recorded when the extension tells us nothing.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    /// epoch milliseconds
    pub added_ms: i64,
    pub mime_type: String,
}

impl IndexEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64, added_ms: i64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let mime_type = guess_mime(&path);

        IndexEntry { path, name, size, added_ms, mime_type }
    }

    /// Timestamps from the future are clamped to `now_ms`.
    pub fn into_tracked(self, now_ms: i64) -> TrackedFile {
        TrackedFile::new(
            self.path.to_string_lossy().into_owned(),
            self.name,
            self.size,
            self.added_ms.min(now_ms),
            self.mime_type,
        )
    }
}

pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(UNKNOWN_MIME)
        .to_string()
}

pub struct IndexListing {
    pub entries: Vec<IndexEntry>,
    pub diagnostics: Vec<String>,
}

impl IndexListing {
    pub fn empty() -> Self {
        IndexListing {
            entries: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Source of candidate files.
///
/// `query` may pre-filter on `cutoff_ms` (files added strictly before it);
/// the scanner applies the cutoff again, so an index that returns everything
/// is still correct.
pub trait StorageIndex {
    fn name(&self) -> &'static str;
    fn available(&self) -> bool;
    fn query(&self, cutoff_ms: i64) -> Result<IndexListing, ScanError>;
}

/// Fixed set of entries, for embedding callers and tests.
pub struct StaticIndex {
    entries: Vec<IndexEntry>,
}

impl StaticIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        StaticIndex { entries }
    }
}

impl StorageIndex for StaticIndex {
    fn name(&self) -> &'static str {
        "static"
    }

    fn available(&self) -> bool {
        true
    }

    fn query(&self, _cutoff_ms: i64) -> Result<IndexListing, ScanError> {
        Ok(IndexListing {
            entries: self.entries.clone(),
            diagnostics: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_derives_name_and_mime() {
        let entry = IndexEntry::new("/photos/2019/beach.jpg", 10, 0);
        assert_eq!(entry.name, "beach.jpg");
        assert_eq!(entry.mime_type, "image/jpeg");
    }

    #[test]
    fn unknown_extension_gets_placeholder() {
        let entry = IndexEntry::new("/tmp/blob.zzqx", 10, 0);
        assert_eq!(entry.mime_type, UNKNOWN_MIME);
        assert_eq!(IndexEntry::new("/tmp/README", 1, 0).mime_type, UNKNOWN_MIME);
    }

    #[test]
    fn future_timestamp_clamped() {
        let tracked = IndexEntry::new("/tmp/a.txt", 1, 5_000).into_tracked(1_000);
        assert_eq!(tracked.added_date, 1_000);
        assert_eq!(tracked.locator, "/tmp/a.txt");
    }
}
