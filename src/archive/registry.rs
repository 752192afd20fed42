//! Archive registry
//!
//! Builds the catalog of sealed blobs, either from the storage directory on
//! disk or from every revision in version control that touched it, and
//! resolves user-supplied target tokens to a single entry.
//!
//! Scanning is best-effort: a file that isn't a sealed blob, or whose name
//! doesn't decode, is skipped with a logged reason instead of failing the
//! whole listing.

use std::fs;

use tracing::debug;

use super::entry::{sort_catalog, ArchiveEntry};
use super::name::has_sealed_suffix;
use crate::config::WardPaths;
use crate::error::{WardError, WardResult};
use crate::vcs::GitClient;

/// Result of examining one candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Entry(ArchiveEntry),
    Skip { name: String, reason: String },
}

/// Catalog of sealed blobs in one storage location
pub struct ArchiveRegistry<'a> {
    paths: WardPaths,
    git: GitClient<'a>,
}

impl<'a> ArchiveRegistry<'a> {
    pub fn new(paths: WardPaths, git: GitClient<'a>) -> Self {
        Self { paths, git }
    }

    pub fn paths(&self) -> &WardPaths {
        &self.paths
    }

    pub fn git(&self) -> &GitClient<'a> {
        &self.git
    }

    /// Filesystem scan, in catalog order
    pub fn list(&self) -> WardResult<Vec<ArchiveEntry>> {
        Ok(collect_entries(self.scan()?))
    }

    /// History scan, in catalog order
    ///
    /// One entry per (file, revision), including blobs since deleted from disk.
    pub fn list_history(&self) -> WardResult<Vec<ArchiveEntry>> {
        Ok(collect_entries(self.scan_history()?))
    }

    /// Either scan, chosen by `history`
    pub fn catalog(&self, history: bool) -> WardResult<Vec<ArchiveEntry>> {
        if history {
            self.list_history()
        } else {
            self.list()
        }
    }

    /// Examine every file in the storage directory
    pub fn scan(&self) -> WardResult<Vec<ScanOutcome>> {
        let dir = self.paths.archive_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let read_dir = fs::read_dir(&dir).map_err(|e| {
            WardError::Io(format!("Failed to read archive directory: {}", e))
        })?;

        let mut outcomes = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| {
                WardError::Io(format!("Failed to read directory entry: {}", e))
            })?;

            let name = item.file_name().to_string_lossy().into_owned();
            let metadata = match item.metadata() {
                Ok(m) => m,
                Err(e) => {
                    outcomes.push(ScanOutcome::Skip {
                        name,
                        reason: format!("cannot stat: {}", e),
                    });
                    continue;
                }
            };
            if !metadata.is_file() {
                outcomes.push(ScanOutcome::Skip {
                    name,
                    reason: "not a regular file".into(),
                });
                continue;
            }
            if !has_sealed_suffix(&name) {
                outcomes.push(ScanOutcome::Skip {
                    name,
                    reason: "missing sealed suffix".into(),
                });
                continue;
            }

            let repo_path = self.paths.archive_git_path(&name);
            let outcome = match ArchiveEntry::new(&name, metadata.len(), item.path(), &repo_path, None) {
                Ok(mut entry) => {
                    entry.provenance = self.git.last_commit_for(&repo_path)?;
                    ScanOutcome::Entry(entry)
                }
                Err(e) => ScanOutcome::Skip {
                    name,
                    reason: e.to_string(),
                },
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Examine every sealed blob at every revision that touched the storage directory
    pub fn scan_history(&self) -> WardResult<Vec<ScanOutcome>> {
        let repo_dir = self
            .paths
            .archive_dir_relative()
            .to_string_lossy()
            .replace('\\', "/");

        let mut outcomes = Vec::new();
        for commit in self.git.history_for(&repo_dir)? {
            for blob in self.git.list_tree(&commit.commit_hash, &repo_dir)? {
                let name = blob.file_name().to_string();
                if !has_sealed_suffix(&name) {
                    outcomes.push(ScanOutcome::Skip {
                        name: format!("{}@{}", name, commit.short_hash()),
                        reason: "missing sealed suffix".into(),
                    });
                    continue;
                }

                let outcome = match ArchiveEntry::new(
                    &name,
                    blob.size_bytes,
                    self.paths.archive_path(&name),
                    &blob.path,
                    Some(commit.clone()),
                ) {
                    Ok(entry) => ScanOutcome::Entry(entry),
                    Err(e) => ScanOutcome::Skip {
                        name: format!("{}@{}", name, commit.short_hash()),
                        reason: e.to_string(),
                    },
                };
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }
}

/// Keep the entries, log the skips, sort into catalog order
fn collect_entries(outcomes: Vec<ScanOutcome>) -> Vec<ArchiveEntry> {
    let mut entries: Vec<ArchiveEntry> = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            ScanOutcome::Entry(entry) => Some(entry),
            ScanOutcome::Skip { name, reason } => {
                debug!(name = %name, reason = %reason, "skipping catalog candidate");
                None
            }
        })
        .collect();
    sort_catalog(&mut entries);
    entries
}

/// Resolve a target token against a catalog in catalog order
///
/// - no token: the newest committed entry
/// - all digits: zero-based index into committed entries only
/// - otherwise: an exact archive name (suffix optional), then the first
///   entry whose commit hash starts with the token
pub fn select<'e>(entries: &'e [ArchiveEntry], token: Option<&str>) -> WardResult<&'e ArchiveEntry> {
    let committed: Vec<&ArchiveEntry> = entries.iter().filter(|e| e.is_committed()).collect();

    let Some(token) = token.map(str::trim) else {
        return committed
            .first()
            .copied()
            .ok_or(WardError::NoCommittedArchives);
    };

    if token.is_empty() {
        return Err(WardError::archive_not_found(token));
    }

    if token.bytes().all(|b| b.is_ascii_digit()) {
        if committed.is_empty() {
            return Err(WardError::NoCommittedArchives);
        }
        let index: usize = token
            .parse()
            .map_err(|_| WardError::archive_not_found(token))?;
        return committed
            .get(index)
            .copied()
            .ok_or_else(|| WardError::archive_not_found(token));
    }

    if let Some(entry) = entries
        .iter()
        .find(|e| e.name == token || e.stem() == token)
    {
        return Ok(entry);
    }

    committed
        .into_iter()
        .find(|e| e.commit_hash().is_some_and(|h| h.starts_with(token)))
        .ok_or_else(|| WardError::archive_not_found(token))
}

/// The newest `count` entries
pub fn select_latest(entries: &[ArchiveEntry], count: usize) -> Vec<&ArchiveEntry> {
    entries.iter().take(count).collect()
}
