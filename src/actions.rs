//! What happens when the user picks an action for a pending file.
//!
//! - Archive: copy into the vault, request deletion of the original, mark ARCHIVED
//! - Delete: request deletion; the record is dropped once the file is gone
//! - Ignore: mark IGNORED so the file is never offered again

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::delete::{DeletionOutcome, DeletionReport, DeletionRequester};
use crate::error::ActionError;
use crate::inventory::{FileStatus, Inventory, TrackedFile};
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Archive,
    Delete,
    Ignore,
}

#[derive(Debug, Serialize)]
pub struct ActionOutcome {
    pub locator: String,
    pub action: Action,
    /// status after the action; `None` once the record is no longer tracked
    pub status: Option<FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion: Option<DeletionOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ActionOutcome {
    fn new(file: &TrackedFile, action: Action) -> Self {
        ActionOutcome {
            locator: file.locator.clone(),
            action,
            status: Some(file.status),
            archived_to: None,
            deletion: None,
            errors: Vec::new(),
        }
    }

    fn record_deletion(&mut self, report: DeletionReport) {
        self.deletion = Some(report.outcome);
        self.errors.extend(report.errors);
    }
}

pub struct Assistant<'a, R: DeletionRequester> {
    inventory: &'a Inventory,
    vault: &'a Vault,
    requester: R,
}

impl<'a, R: DeletionRequester> Assistant<'a, R> {
    pub fn new(inventory: &'a Inventory, vault: &'a Vault, requester: R) -> Self {
        Assistant { inventory, vault, requester }
    }

    /// Looks the locator up in the inventory and applies `action` to it.
    /// Relative or non-canonical paths are resolved before giving up.
    pub fn handle_locator(&self, locator: &str, action: Action) -> Result<ActionOutcome, ActionError> {
        match self.lookup(locator)? {
            Some(file) => self.handle(&file, action),
            None => Err(ActionError::NotTracked(locator.to_string())),
        }
    }

    fn lookup(&self, locator: &str) -> Result<Option<TrackedFile>, ActionError> {
        if let Some(file) = self.inventory.get(locator)? {
            return Ok(Some(file));
        }

        let canonical = fs::canonicalize(locator)
            .ok()
            .and_then(|p| p.to_str().map(str::to_owned));
        match canonical {
            Some(c) if c != locator => Ok(self.inventory.get(&c)?),
            _ => Ok(None),
        }
    }

    pub fn handle(&self, file: &TrackedFile, action: Action) -> Result<ActionOutcome, ActionError> {
        // the caller's copy may be stale; the inventory decides
        let current = self
            .inventory
            .get(&file.locator)?
            .ok_or_else(|| ActionError::NotTracked(file.locator.clone()))?;
        if !current.is_pending() {
            return Err(ActionError::NotPending(file.locator.clone()));
        }

        match action {
            Action::Archive => self.archive(current),
            Action::Delete => self.delete(current),
            Action::Ignore => self.ignore(current),
        }
    }

    fn archive(&self, file: TrackedFile) -> Result<ActionOutcome, ActionError> {
        let mut outcome = ActionOutcome::new(&file, Action::Archive);

        // a failed copy leaves the record PENDING and nothing is deleted
        let destination = self.vault.archive(&file)?;
        outcome.archived_to = Some(destination);

        outcome.record_deletion(self.requester.request_deletion(&[file.locator.clone()]));

        self.inventory.update(&file.with_status(FileStatus::Archived))?;
        outcome.status = Some(FileStatus::Archived);
        info!(locator = %outcome.locator, deletion = ?outcome.deletion, "archive action");
        Ok(outcome)
    }

    fn delete(&self, file: TrackedFile) -> Result<ActionOutcome, ActionError> {
        let mut outcome = ActionOutcome::new(&file, Action::Delete);

        let report = self.requester.request_deletion(&[file.locator.clone()]);
        let gone = report.outcome == DeletionOutcome::Granted && report.was_deleted(&file.locator);
        outcome.record_deletion(report);

        if gone {
            self.inventory.remove(&file.locator)?;
            outcome.status = None;
        }
        info!(locator = %outcome.locator, deletion = ?outcome.deletion, "delete action");
        Ok(outcome)
    }

    fn ignore(&self, file: TrackedFile) -> Result<ActionOutcome, ActionError> {
        let mut outcome = ActionOutcome::new(&file, Action::Ignore);
        self.inventory.update(&file.with_status(FileStatus::Ignored))?;
        outcome.status = Some(FileStatus::Ignored);
        Ok(outcome)
    }

    /// `(file, action) -> ()` for presentation layers that only fire and forget.
    pub fn callback(&self) -> impl Fn(&TrackedFile, Action) + '_ {
        move |file, action| {
            if let Err(e) = self.handle(file, action) {
                warn!(locator = %file.locator, ?action, "action failed: {e}");
            }
        }
    }
}
