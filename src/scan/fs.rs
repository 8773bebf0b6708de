//! Filesystem-backed storage index.
//!
//! Walks each root with walkdir and reports regular files whose timestamp
//! (per `AgeBasis`) falls before the cutoff. Hidden entries, the vault and
//! the inventory's own directory are skipped.

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::{AgeBasis, Config};
use crate::error::ScanError;
use crate::util::system_time_millis;
use super::index::{IndexEntry, IndexListing, StorageIndex};

pub struct FsIndex {
    roots: Vec<PathBuf>,
    basis: AgeBasis,
    include_hidden: bool,
    follow_links: bool,
    excluded: Vec<PathBuf>,
    timeout: Option<Duration>,
}

impl FsIndex {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        FsIndex {
            roots,
            basis: AgeBasis::default(),
            include_hidden: false,
            follow_links: false,
            excluded: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut index = FsIndex::new(config.roots.clone())
            .basis(config.basis)
            .include_hidden(config.include_hidden)
            .follow_links(config.follow_links)
            .exclude(&config.vault_dir)
            .exclude(&config.notify_dir);

        if let Some(db_dir) = config.db_path.parent() {
            index = index.exclude(db_dir);
        }
        if let Some(timeout) = config.scan_timeout {
            index = index.timeout(timeout);
        }
        index
    }

    pub fn basis(mut self, basis: AgeBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Never report anything under `path`. `path` need not exist yet.
    pub fn exclude(mut self, path: &Path) -> Self {
        if !path.as_os_str().is_empty() {
            self.excluded.push(resolve_existing_prefix(path));
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|x| path.starts_with(x))
    }

    fn walk_root(
        &self,
        root: &Path,
        cutoff_ms: i64,
        deadline: Option<Instant>,
        listing: &mut IndexListing,
    ) -> WalkEnd {
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_entry(|e| self.keep(e));

        for entry in walker {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return WalkEnd::TimedOut;
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    listing.diagnostics.push(format!("skipped unreadable entry: {e}"));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            // locators are UTF-8; a lossy name could collide with another file
            if entry.path().to_str().is_none() {
                listing.diagnostics.push(format!(
                    "{}: path is not valid UTF-8, skipped",
                    entry.path().display()
                ));
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    listing
                        .diagnostics
                        .push(format!("failed to stat {}: {}", entry.path().display(), e));
                    continue;
                }
            };

            let Some(added_ms) = timestamp(&metadata, self.basis) else {
                listing.diagnostics.push(format!(
                    "{}: no usable timestamp, skipped",
                    entry.path().display()
                ));
                continue;
            };

            if added_ms < cutoff_ms {
                listing
                    .entries
                    .push(IndexEntry::new(entry.path(), metadata.len(), added_ms));
            }
        }

        WalkEnd::Complete
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        // the root itself is always walked, even when hidden (e.g. ~/.tmpXYZ)
        if entry.depth() == 0 {
            return true;
        }
        if !self.include_hidden && is_hidden(entry.file_name()) {
            return false;
        }
        !self.is_excluded(entry.path())
    }
}

enum WalkEnd {
    Complete,
    TimedOut,
}

impl StorageIndex for FsIndex {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn available(&self) -> bool {
        !self.roots.is_empty()
    }

    fn query(&self, cutoff_ms: i64) -> Result<IndexListing, ScanError> {
        let mut listing = IndexListing::empty();
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut walked = 0;

        for root in &self.roots {
            let root = match fs::canonicalize(root) {
                Ok(r) => r,
                Err(e) => {
                    listing
                        .diagnostics
                        .push(format!("skipping {}: {}", root.display(), e));
                    continue;
                }
            };

            if self.is_excluded(&root) {
                listing
                    .diagnostics
                    .push(format!("skipping {}: inside vaultkeep's own data", root.display()));
                continue;
            }

            walked += 1;
            debug!(root = %root.display(), "walking");

            if let WalkEnd::TimedOut = self.walk_root(&root, cutoff_ms, deadline, &mut listing) {
                let secs = self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                listing
                    .diagnostics
                    .push(format!("scan timed out after {secs:.1}s, results are partial"));
                break;
            }
        }

        if walked == 0 {
            return Err(ScanError::IndexUnavailable {
                reason: if listing.diagnostics.is_empty() {
                    "no roots configured".to_string()
                } else {
                    listing.diagnostics.join("; ")
                },
            });
        }

        Ok(listing)
    }
}

fn timestamp(metadata: &Metadata, basis: AgeBasis) -> Option<i64> {
    let time = match basis {
        AgeBasis::Added => metadata.created().or_else(|_| metadata.modified()),
        AgeBasis::Modified => metadata.modified(),
        AgeBasis::Accessed => metadata.accessed(),
    };
    time.ok().map(system_time_millis)
}

/// Canonicalises the longest existing ancestor of `path` and re-appends the
/// missing tail, so a directory created later still matches walked paths.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;

    loop {
        if let Ok(real) = fs::canonicalize(current) {
            return missing.iter().rev().fold(real, |acc, part| acc.join(part));
        }

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}
