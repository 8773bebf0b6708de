//! Vault: the private directory archived copies live in.
//!
//! A copy is streamed into a temporary file inside the vault and only
//! renamed to its final name once every byte has arrived, so a failed copy
//! never shows up as a truncated archive.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ArchiveError;
use crate::inventory::TrackedFile;

pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Vault { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Vault::new(&config.vault_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `file` into the vault and returns where the copy landed.
    pub fn archive(&self, file: &TrackedFile) -> Result<PathBuf, ArchiveError> {
        let source_path = file.path();
        let mut source = File::open(source_path).map_err(|source| ArchiveError::SourceUnreadable {
            path: source_path.to_path_buf(),
            source,
        })?;
        let expected = source
            .metadata()
            .map_err(|source| ArchiveError::SourceUnreadable {
                path: source_path.to_path_buf(),
                source,
            })?
            .len();

        let unwritable = |source: io::Error| ArchiveError::DestinationUnwritable {
            path: self.root.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(unwritable)?;
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(unwritable)?;

        let copied = io::copy(&mut source, tmp.as_file_mut()).map_err(|source| {
            ArchiveError::CopyInterrupted {
                path: source_path.to_path_buf(),
                source,
            }
        })?;

        if copied != expected {
            return Err(ArchiveError::CopyInterrupted {
                path: source_path.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("copied {copied} of {expected} bytes"),
                ),
            });
        }

        tmp.as_file().sync_all().map_err(unwritable)?;

        let destination = self.destination_for(&file.name);
        // persist_noclobber so a name taken between the check and the rename
        // fails instead of silently replacing an earlier archive
        tmp.persist_noclobber(&destination)
            .map_err(|e| ArchiveError::DestinationUnwritable {
                path: destination.clone(),
                source: e.error,
            })?;

        info!(locator = %file.locator, destination = %destination.display(), bytes = copied, "archived");
        Ok(destination)
    }

    /// Boolean form for callers that only show "did it work".
    pub fn archive_ok(&self, file: &TrackedFile) -> bool {
        match self.archive(file) {
            Ok(_) => true,
            Err(e) => {
                warn!(locator = %file.locator, "archive failed: {e}");
                false
            }
        }
    }

    /// First free name for `name` in the vault: `name`, then `stem (1).ext`, ...
    fn destination_for(&self, name: &str) -> PathBuf {
        let base = sanitize(name);
        let candidate = self.root.join(&base);
        if !candidate.exists() {
            return candidate;
        }

        let base_path = Path::new(&base);
        let stem = base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.clone());
        let ext = base_path.extension().map(|e| e.to_string_lossy().into_owned());

        let mut n = 1u32;
        loop {
            let name = match &ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.root.join(name);
            if !candidate.exists() {
                debug!(taken = %base, chosen = %candidate.display(), "vault name collision");
                return candidate;
            }
            n += 1;
        }
    }
}

/// Display names may carry path separators; keep only the last component.
fn sanitize(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unnamed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(path: &Path) -> TrackedFile {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        TrackedFile::new(path.to_string_lossy(), name, 0, 0, "text/plain")
    }

    #[test]
    fn archive_makes_identical_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.pdf");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &bytes).unwrap();

        let vault = Vault::new(dir.path().join("vault"));
        let dest = vault.archive(&tracked(&source)).unwrap();

        assert_eq!(dest, dir.path().join("vault").join("report.pdf"));
        assert_eq!(fs::read(&dest).unwrap(), bytes);
        // the original is left alone
        assert!(source.exists());
    }

    #[test]
    fn empty_file_archives() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty");
        fs::write(&source, b"").unwrap();

        let dest = Vault::new(dir.path().join("vault")).archive(&tracked(&source)).unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"");
    }

    #[test]
    fn missing_source_is_unreadable_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let vault_dir = dir.path().join("vault");
        let vault = Vault::new(&vault_dir);

        let err = vault.archive(&tracked(&dir.path().join("gone.txt"))).unwrap_err();
        assert!(matches!(err, ArchiveError::SourceUnreadable { .. }));
        assert!(!vault_dir.exists() || fs::read_dir(&vault_dir).unwrap().next().is_none());
        assert!(!vault.archive_ok(&tracked(&dir.path().join("gone.txt"))));
    }

    #[test]
    fn vault_path_blocked_by_file_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"data").unwrap();
        let blocker = dir.path().join("vault");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = Vault::new(&blocker).archive(&tracked(&source)).unwrap_err();
        assert!(matches!(err, ArchiveError::DestinationUnwritable { .. }));
    }

    #[test]
    fn directory_source_fails_without_residue() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("folder");
        fs::create_dir(&source).unwrap();
        let vault_dir = dir.path().join("vault");

        assert!(Vault::new(&vault_dir).archive(&tracked(&source)).is_err());
        let leftovers = fs::read_dir(&vault_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn same_name_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a").join("notes.txt");
        let b = dir.path().join("b").join("notes.txt");
        let c = dir.path().join("c").join("notes.txt");
        for (path, body) in [(&a, "first"), (&b, "second"), (&c, "third")] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }

        let vault = Vault::new(dir.path().join("vault"));
        let first = vault.archive(&tracked(&a)).unwrap();
        let second = vault.archive(&tracked(&b)).unwrap();
        let third = vault.archive(&tracked(&c)).unwrap();

        assert_eq!(first.file_name().unwrap(), "notes.txt");
        assert_eq!(second.file_name().unwrap(), "notes (1).txt");
        assert_eq!(third.file_name().unwrap(), "notes (2).txt");
        assert_eq!(fs::read_to_string(first).unwrap(), "first");
        assert_eq!(fs::read_to_string(second).unwrap(), "second");
    }

    #[test]
    fn names_reduced_to_last_component() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("plain.txt"), "plain.txt");
        assert_eq!(sanitize(".."), "unnamed");
        assert_eq!(sanitize(""), "unnamed");
    }
}
