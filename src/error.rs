use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::inventory::FileStatus;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not determine data directory")]
    DataDir,

    #[error("could not create database directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("{locator}: cannot move from {from} to {to}")]
    InvalidTransition {
        locator: String,
        from: FileStatus,
        to: FileStatus,
    },

    #[error("unrecognised status '{0}' in inventory")]
    CorruptStatus(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("storage index unavailable: {reason}")]
    IndexUnavailable { reason: String },
}

/// Failure kinds of a vault copy. Flattened to a bool only by `Vault::archive_ok`.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("cannot read {path}: {source}")]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("cannot write to vault at {path}: {source}")]
    DestinationUnwritable { path: PathBuf, source: io::Error },

    #[error("copy of {path} interrupted: {source}")]
    CopyInterrupted { path: PathBuf, source: io::Error },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid threshold '{value}': {source}")]
    Threshold {
        value: String,
        source: humantime::DurationError,
    },

    #[error("could not determine data directory")]
    DataDir,
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("{0} is not pending")]
    NotPending(String),

    #[error("{0} is not tracked, run 'vaultkeep list --status all' to see tracked paths")]
    NotTracked(String),
}

/// Everything the binary can fail with.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{failed} of {total} actions failed")]
    ActionsFailed { failed: usize, total: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
