//! Deletion requests.
//!
//! vaultkeep never removes a file on its own judgement. A request names a
//! set of locators, capability is checked first, then a `Confirmer` decides
//! for the whole set. Only a granted request touches the filesystem.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::platform::{self, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionOutcome {
    Granted,
    Denied,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported,
}

#[derive(Debug, Serialize)]
pub struct DeletionReport {
    pub outcome: DeletionOutcome,
    pub deleted: Vec<String>,
    pub errors: Vec<String>,
    pub bytes_freed: u64,
}

impl DeletionReport {
    fn without_changes(outcome: DeletionOutcome) -> Self {
        DeletionReport {
            outcome,
            deleted: Vec::new(),
            errors: Vec::new(),
            bytes_freed: 0,
        }
    }

    pub fn was_deleted(&self, locator: &str) -> bool {
        self.deleted.iter().any(|d| d == locator)
    }
}

/// Stands in for the operating system's "allow this app to delete?" dialog.
pub trait Confirmer {
    fn confirm(&self, locators: &[String]) -> bool;
}

/// Fixed answer, used for `--yes` and in tests.
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn confirm(&self, _locators: &[String]) -> bool {
        self.0
    }
}

/// Lists the files on stderr and reads y/N from stdin.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, locators: &[String]) -> bool {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "\nvaultkeep wants to delete {} file(s):", locators.len());
        for locator in locators {
            let _ = writeln!(stderr, "  {locator}");
        }
        let _ = write!(stderr, "Allow? [y/N] ");
        let _ = stderr.flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub trait DeletionRequester {
    fn capability(&self) -> Capability;
    fn request_deletion(&self, locators: &[String]) -> DeletionReport;
}

pub struct FsDeletionRequester<C: Confirmer> {
    confirmer: C,
    platform: Platform,
    allow_delete: bool,
}

impl<C: Confirmer> FsDeletionRequester<C> {
    pub fn new(confirmer: C) -> Self {
        FsDeletionRequester {
            confirmer,
            platform: platform::detect(),
            allow_delete: true,
        }
    }

    pub fn from_config(config: &Config, confirmer: C) -> Self {
        FsDeletionRequester {
            confirmer,
            platform: config.platform,
            allow_delete: config.allow_delete,
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn allow_delete(mut self, allow: bool) -> Self {
        self.allow_delete = allow;
        self
    }
}

impl<C: Confirmer> DeletionRequester for FsDeletionRequester<C> {
    fn capability(&self) -> Capability {
        if self.allow_delete && platform::supports_deletion(self.platform) {
            Capability::Supported
        } else {
            Capability::Unsupported
        }
    }

    fn request_deletion(&self, locators: &[String]) -> DeletionReport {
        if self.capability() == Capability::Unsupported {
            debug!(count = locators.len(), "deletion unsupported here");
            return DeletionReport::without_changes(DeletionOutcome::Unsupported);
        }

        if locators.is_empty() {
            return DeletionReport::without_changes(DeletionOutcome::Granted);
        }

        if !self.confirmer.confirm(locators) {
            info!(count = locators.len(), "deletion denied");
            return DeletionReport::without_changes(DeletionOutcome::Denied);
        }

        let mut report = DeletionReport::without_changes(DeletionOutcome::Granted);
        for locator in locators {
            match delete_file(Path::new(locator)) {
                Ok(bytes) => {
                    report.deleted.push(locator.clone());
                    report.bytes_freed = report.bytes_freed.saturating_add(bytes);
                }
                Err(e) => {
                    warn!(%locator, "delete failed: {e}");
                    report.errors.push(format!("failed to delete {locator}: {e}"));
                }
            }
        }

        info!(deleted = report.deleted.len(), errors = report.errors.len(), "deletion granted");
        report
    }
}

/// Removes a regular file. Directories are refused: the inventory only
/// ever tracks files, so a directory here means the path changed under us.
fn delete_file(path: &Path) -> io::Result<u64> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        return Err(io::Error::new(io::ErrorKind::Other, "is a directory"));
    }
    fs::remove_file(path)?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingConfirm {
        answer: bool,
        asked: Cell<usize>,
    }

    impl Confirmer for CountingConfirm {
        fn confirm(&self, _locators: &[String]) -> bool {
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    fn counting(answer: bool) -> CountingConfirm {
        CountingConfirm { answer, asked: Cell::new(0) }
    }

    fn make_files(dir: &Path, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                fs::write(&p, b"12345").unwrap();
                p.to_string_lossy().into_owned()
            })
            .collect()
    }

    #[test]
    fn granted_request_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let locators = make_files(dir.path(), &["a", "b"]);

        let requester = FsDeletionRequester::new(AutoConfirm(true)).platform(Platform::Linux);
        let report = requester.request_deletion(&locators);

        assert_eq!(report.outcome, DeletionOutcome::Granted);
        assert_eq!(report.deleted, locators);
        assert_eq!(report.bytes_freed, 10);
        assert!(locators.iter().all(|l| !Path::new(l).exists()));
    }

    #[test]
    fn denied_request_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let locators = make_files(dir.path(), &["a"]);

        let requester = FsDeletionRequester::new(AutoConfirm(false)).platform(Platform::Linux);
        let report = requester.request_deletion(&locators);

        assert_eq!(report.outcome, DeletionOutcome::Denied);
        assert!(report.deleted.is_empty());
        assert!(Path::new(&locators[0]).exists());
    }

    #[test]
    fn unsupported_platform_never_asks() {
        let dir = tempfile::tempdir().unwrap();
        let locators = make_files(dir.path(), &["a"]);
        let requester = FsDeletionRequester::new(counting(true)).platform(Platform::Unknown);

        assert_eq!(requester.capability(), Capability::Unsupported);
        let report = requester.request_deletion(&locators);
        assert_eq!(report.outcome, DeletionOutcome::Unsupported);
        assert_eq!(requester.confirmer.asked.get(), 0);
        assert!(Path::new(&locators[0]).exists());
    }

    #[test]
    fn disabled_deletion_is_unsupported() {
        let requester = FsDeletionRequester::new(AutoConfirm(true))
            .platform(Platform::Linux)
            .allow_delete(false);
        assert_eq!(requester.capability(), Capability::Unsupported);
    }

    #[test]
    fn empty_request_granted_without_prompt() {
        let requester = FsDeletionRequester::new(counting(false)).platform(Platform::Linux);
        let report = requester.request_deletion(&[]);
        assert_eq!(report.outcome, DeletionOutcome::Granted);
        assert_eq!(requester.confirmer.asked.get(), 0);
    }

    #[test]
    fn whole_set_confirmed_once() {
        let dir = tempfile::tempdir().unwrap();
        let locators = make_files(dir.path(), &["a", "b", "c"]);
        let requester = FsDeletionRequester::new(counting(true)).platform(Platform::Linux);

        requester.request_deletion(&locators);
        assert_eq!(requester.confirmer.asked.get(), 1);
    }

    #[test]
    fn missing_file_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut locators = make_files(dir.path(), &["present"]);
        locators.push(dir.path().join("absent").to_string_lossy().into_owned());

        let requester = FsDeletionRequester::new(AutoConfirm(true)).platform(Platform::Linux);
        let report = requester.request_deletion(&locators);

        assert_eq!(report.outcome, DeletionOutcome::Granted);
        assert!(report.was_deleted(&locators[0]));
        assert!(!report.was_deleted(&locators[1]));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn directories_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        let requester = FsDeletionRequester::new(AutoConfirm(true)).platform(Platform::Linux);
        let report = requester.request_deletion(&[sub.to_string_lossy().into_owned()]);
        assert_eq!(report.errors.len(), 1);
        assert!(sub.exists());
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
