//! Runtime configuration.
//!
//! Resolved in three layers, later ones winning:
//! - built-in defaults (home directory, 180 days, platform data dir)
//! - optional TOML file (~/.config/vaultkeep/config.toml or --config)
//! - command line flags

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::{Cli, Command, GlobalArgs, ScanArgs};
use crate::error::ConfigError;
use crate::platform::{self, Platform};
use crate::scan::DEFAULT_THRESHOLD;

/// Which filesystem timestamp counts as a file's "added" date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgeBasis {
    /// creation time, falling back to modification time
    #[default]
    Added,
    Modified,
    Accessed,
}

pub struct Config {
    pub roots: Vec<PathBuf>,
    pub threshold: Duration,
    pub basis: AgeBasis,
    pub include_hidden: bool,
    pub follow_links: bool,
    pub scan_timeout: Option<Duration>,
    pub db_path: PathBuf,
    pub vault_dir: PathBuf,
    pub notify_dir: PathBuf,
    pub allow_delete: bool,
    pub notify: bool,
    pub json_output: bool,
    pub verbose: bool,
    pub platform: Platform,
}

/// Keys accepted in config.toml. Everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub roots: Option<Vec<PathBuf>>,
    pub threshold: Option<String>,
    pub basis: Option<AgeBasis>,
    pub include_hidden: Option<bool>,
    pub follow_links: Option<bool>,
    pub scan_timeout: Option<String>,
    pub db_path: Option<PathBuf>,
    pub vault_dir: Option<PathBuf>,
    pub allow_delete: Option<bool>,
}

impl FileConfig {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }
}

pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::Threshold {
        value: value.to_string(),
        source,
    })
}

impl Config {
    /// Defaults with every piece of state kept under `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let roots = platform::home_dir().map(|h| vec![h]).unwrap_or_default();

        Config {
            roots,
            threshold: DEFAULT_THRESHOLD,
            basis: AgeBasis::default(),
            include_hidden: false,
            follow_links: false,
            scan_timeout: None,
            db_path: data_dir.join("vaultkeep.db"),
            vault_dir: data_dir.join("vault"),
            notify_dir: data_dir.join("notifications"),
            allow_delete: true,
            notify: true,
            json_output: false,
            verbose: false,
            platform: platform::detect(),
        }
    }

    pub fn defaults() -> Result<Self, ConfigError> {
        let data_dir = platform::data_dir().ok_or(ConfigError::DataDir)?;
        Ok(Self::with_data_dir(&data_dir))
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::defaults()?;

        match &cli.global.config {
            Some(path) => config.apply_file(FileConfig::load(path)?)?,
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    config.apply_file(FileConfig::load(&path)?)?;
                }
            }
        }

        config.apply_global(&cli.global);
        if let Command::Scan(args) = &cli.command {
            config.apply_scan_args(args);
        }

        Ok(config)
    }

    pub fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(roots) = file.roots {
            self.roots = roots;
        }
        if let Some(threshold) = file.threshold {
            self.threshold = parse_duration(&threshold)?;
        }
        if let Some(timeout) = file.scan_timeout {
            self.scan_timeout = Some(parse_duration(&timeout)?);
        }
        if let Some(basis) = file.basis {
            self.basis = basis;
        }
        if let Some(hidden) = file.include_hidden {
            self.include_hidden = hidden;
        }
        if let Some(follow) = file.follow_links {
            self.follow_links = follow;
        }
        if let Some(db_path) = file.db_path {
            self.db_path = db_path;
        }
        if let Some(vault_dir) = file.vault_dir {
            self.vault_dir = vault_dir;
        }
        if let Some(allow) = file.allow_delete {
            self.allow_delete = allow;
        }
        Ok(())
    }

    pub fn apply_global(&mut self, args: &GlobalArgs) {
        if let Some(db) = &args.db {
            self.db_path = db.clone();
        }
        if let Some(vault) = &args.vault {
            self.vault_dir = vault.clone();
        }
        self.verbose = args.verbose;
    }

    pub fn apply_scan_args(&mut self, args: &ScanArgs) {
        if let Some(roots) = &args.roots {
            self.roots = roots.clone();
        }
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(basis) = args.basis {
            self.basis = basis;
        }
        if let Some(secs) = args.timeout {
            self.scan_timeout = Some(Duration::from_secs(secs));
        }
        self.include_hidden |= args.hidden;
        self.json_output = args.json;
        self.notify = !args.no_notify;
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    platform::config_dir().map(|d| d.join("config.toml"))
}
