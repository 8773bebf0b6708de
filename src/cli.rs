use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::AgeBasis;
use crate::inventory::FileStatus;

#[derive(Parser)]
#[command(name = "vaultkeep")]
#[command(about = "Finds files left untouched for months and archives or deletes them on request")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Inventory database (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory archived copies are written to
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    /// Config file (defaults to ~/.config/vaultkeep/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Find stale files and add them to the inventory
    Scan(ScanArgs),

    /// Show tracked files
    List(ListArgs),

    /// Walk through pending files and choose what to do with each
    Review(ReviewArgs),

    /// Copy files into the vault, then request deletion of the originals
    Archive(LocatorArgs),

    /// Request deletion of files
    Delete(LocatorArgs),

    /// Stop offering files for cleanup
    Ignore(IgnoreArgs),
}

#[derive(Parser)]
pub struct ScanArgs {
    /// Directories to scan (defaults to home directory)
    #[arg(long, value_delimiter = ',')]
    pub roots: Option<Vec<PathBuf>>,

    /// Minimum age of a candidate, e.g. "180d" or "26w"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub threshold: Option<Duration>,

    /// Timestamp used to judge a file's age
    #[arg(long, value_enum)]
    pub basis: Option<AgeBasis>,

    /// Include hidden files and directories
    #[arg(long, default_value_t = false)]
    pub hidden: bool,

    /// Stop walking after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output as JSON instead of table
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Don't raise a notification for pending files
    #[arg(long, default_value_t = false)]
    pub no_notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Archived,
    Ignored,
    All,
}

impl StatusFilter {
    pub fn status(self) -> Option<FileStatus> {
        match self {
            StatusFilter::Pending => Some(FileStatus::Pending),
            StatusFilter::Archived => Some(FileStatus::Archived),
            StatusFilter::Ignored => Some(FileStatus::Ignored),
            StatusFilter::All => None,
        }
    }
}

#[derive(Parser)]
pub struct ListArgs {
    /// Which records to show
    #[arg(long, value_enum, default_value_t = StatusFilter::Pending)]
    pub status: StatusFilter,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Only print counts per status
    #[arg(long, default_value_t = false)]
    pub summary: bool,
}

#[derive(Parser)]
pub struct ReviewArgs {
    /// Approve deletions without asking
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct LocatorArgs {
    /// Paths of tracked files
    #[arg(required = true)]
    pub locators: Vec<String>,

    /// Approve deletions without asking
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct IgnoreArgs {
    /// Paths of tracked files
    #[arg(required = true)]
    pub locators: Vec<String>,
}
