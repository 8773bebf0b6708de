pub mod fs;
pub mod index;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, ScanError};
use crate::inventory::{Inventory, TrackedFile};
use crate::notify::Notifier;
use crate::util::{format_bytes, now_millis};
use index::StorageIndex;

/// Files untouched for longer than this become candidates.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(180 * 24 * 60 * 60);

#[derive(Debug, Serialize)]
pub struct ScanReport {
    /// candidates, oldest first
    pub files: Vec<TrackedFile>,
    pub diagnostics: Vec<String>,
    pub now_ms: i64,
    pub threshold_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_memory_bytes: Option<usize>,
}

impl ScanReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().fold(0u64, |acc, f| acc.saturating_add(f.size))
    }
}

pub struct Scanner<I: StorageIndex> {
    index: I,
}

impl<I: StorageIndex> Scanner<I> {
    pub fn new(index: I) -> Self {
        Scanner { index }
    }

    pub fn scan(&self, threshold: Duration) -> Result<ScanReport, ScanError> {
        self.scan_at(now_millis(), threshold)
    }

    /// Candidates are entries with `added < now_ms - threshold`. A file
    /// exactly at the boundary is not stale yet.
    pub fn scan_at(&self, now_ms: i64, threshold: Duration) -> Result<ScanReport, ScanError> {
        if !self.index.available() {
            return Err(ScanError::IndexUnavailable {
                reason: format!("{} index is not available", self.index.name()),
            });
        }

        let start = Instant::now();
        let threshold_ms = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
        let cutoff_ms = now_ms.saturating_sub(threshold_ms);

        let listing = self.index.query(cutoff_ms)?;

        let mut files: Vec<TrackedFile> = listing
            .entries
            .into_iter()
            .filter(|e| e.added_ms < cutoff_ms)
            .map(|e| e.into_tracked(now_ms))
            .collect();
        files.sort_by(|a, b| {
            a.added_date
                .cmp(&b.added_date)
                .then_with(|| a.locator.cmp(&b.locator))
        });

        let report = ScanReport {
            files,
            diagnostics: listing.diagnostics,
            now_ms,
            threshold_ms,
            duration_ms: Some(start.elapsed().as_millis()),
            peak_memory_bytes: memory_stats::memory_stats().map(|m| m.physical_mem),
        };

        info!(
            index = self.index.name(),
            candidates = report.files.len(),
            size = %format_bytes(report.total_bytes()),
            "scan complete"
        );
        Ok(report)
    }

    /// Lenient form: a failed scan is logged and looks like an empty one.
    pub fn scan_or_empty(&self, threshold: Duration) -> Vec<TrackedFile> {
        match self.scan(threshold) {
            Ok(report) => report.files,
            Err(e) => {
                warn!("scan failed, treating as empty: {e}");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub report: ScanReport,
    pub newly_tracked: usize,
    pub pending: usize,
}

/// Scan, record candidates as PENDING, and notify when anything is pending.
pub fn track<I: StorageIndex>(
    scanner: &Scanner<I>,
    inventory: &Inventory,
    notifier: Option<&dyn Notifier>,
    threshold: Duration,
) -> Result<TrackSummary, Error> {
    let report = scanner.scan(threshold)?;
    let newly_tracked = inventory.insert_many(&report.files)?;
    let pending = inventory.counts()?.pending;

    if pending > 0 {
        if let Some(notifier) = notifier {
            notifier.notify(pending);
        }
    }

    Ok(TrackSummary {
        report,
        newly_tracked,
        pending,
    })
}
