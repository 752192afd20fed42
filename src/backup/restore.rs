//! Archive restoration and verification for ward
//!
//! Restore replaces the whole private tree with an archive's contents; it
//! never merges. The archive is unsealed and extracted into a staging
//! directory first and only swapped into place once extraction succeeded,
//! so a failed restore leaves the private tree untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::packer::Packer;
use super::scratch_dir;
use crate::archive::{select, select_latest, ArchiveEntry, ArchiveRegistry};
use crate::config::{Settings, WardPaths};
use crate::crypto::{GpgTransport, SigningOptions};
use crate::error::{WardError, WardResult};
use crate::process::ProcessRunner;
use crate::vcs::GitClient;

/// Handles restoring and verifying archives
pub struct RestoreManager<'a> {
    registry: ArchiveRegistry<'a>,
    gpg: GpgTransport<'a>,
    packer: Packer<'a>,
    signing: SigningOptions,
}

impl<'a> RestoreManager<'a> {
    /// Create a new RestoreManager
    pub fn new(runner: &'a dyn ProcessRunner, paths: WardPaths, settings: Settings) -> Self {
        let git = GitClient::new(runner, &settings.programs.git, paths.root());
        Self {
            registry: ArchiveRegistry::new(paths, git),
            gpg: GpgTransport::new(runner, &settings.programs.gpg),
            packer: Packer::new(runner, &settings.programs.tar),
            signing: SigningOptions::from_settings(&settings),
        }
    }

    pub fn registry(&self) -> &ArchiveRegistry<'a> {
        &self.registry
    }

    fn paths(&self) -> &WardPaths {
        self.registry.paths()
    }

    /// Resolve `target` in the catalog and restore it
    ///
    /// Returns `Ok(None)` when the catalog is empty: there is nothing to restore.
    pub fn restore_target(&self, target: Option<&str>, history: bool) -> WardResult<Option<RestoreResult>> {
        let entries = self.registry.catalog(history)?;
        if entries.is_empty() {
            return Ok(None);
        }
        let entry = select(&entries, target)?;
        self.restore(entry).map(Some)
    }

    /// Replace the private tree with the contents of `entry`
    pub fn restore(&self, entry: &ArchiveEntry) -> WardResult<RestoreResult> {
        let scratch = scratch_dir(self.paths().root(), ".ward-restore-")?;

        let staging = self
            .unpack_into_staging(entry, scratch.path())
            .map_err(|e| WardError::RestoreFailed(format!("{}: {}", entry.name, e)))?;

        let private_dir = self.paths().private_dir();
        swap_into_place(&staging, &private_dir, &scratch.path().join("previous"))
            .map_err(|e| WardError::RestoreFailed(format!("{}: {}", entry.name, e)))?;

        let files_restored = WalkDir::new(&private_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| !e.file_type().is_dir())
            .count();

        info!(name = %entry.name, files = files_restored, "archive restored");
        Ok(RestoreResult {
            name: entry.name.clone(),
            commit: entry.commit_hash().map(String::from),
            files_restored,
        })
    }

    fn unpack_into_staging(&self, entry: &ArchiveEntry, scratch: &Path) -> WardResult<PathBuf> {
        let sealed = self.materialize(entry, scratch)?;

        let plain = scratch.join("restore.tar");
        self.gpg.unseal_to(&sealed, &plain, &self.signing)?;

        let staging = scratch.join("tree");
        fs::create_dir_all(&staging)?;
        let extracted = self.packer.extract(&plain, &staging);
        if let Err(e) = fs::remove_file(&plain) {
            debug!(path = %plain.display(), error = %e, "could not remove plaintext");
        }
        extracted?;

        Ok(staging)
    }

    /// Path of `entry`'s sealed blob, exporting it from history if it is no
    /// longer on disk
    fn materialize(&self, entry: &ArchiveEntry, scratch: &Path) -> WardResult<PathBuf> {
        if entry.path.is_file() {
            return Ok(entry.path.clone());
        }
        let Some(commit) = entry.commit_hash() else {
            return Err(WardError::archive_not_found(entry.name.clone()));
        };
        let exported = scratch.join(&entry.name);
        self.registry
            .git()
            .export_blob(commit, &entry.repo_path, &exported)?;
        debug!(name = %entry.name, commit, "exported blob from history");
        Ok(exported)
    }

    /// Bring this checkout up to date, then restore the newest committed archive
    ///
    /// Tracked local changes are stashed around `git pull --rebase` and
    /// re-applied afterwards, also when the pull or the restore failed.
    pub fn pull(&self) -> WardResult<PullResult> {
        let git = self.registry.git();
        let stashed = git.has_local_changes()?;
        if stashed {
            info!("stashing local changes before pull");
            git.stash()?;
        }

        let outcome = git
            .pull_rebase()
            .and_then(|()| self.restore_target(None, false));

        if stashed {
            if let Err(e) = git.stash_pop() {
                return match outcome {
                    Ok(_) => Err(e),
                    Err(original) => {
                        warn!(error = %e, "stashed changes could not be re-applied");
                        Err(original)
                    }
                };
            }
        }

        outcome.map(|restored| PullResult { stashed, restored })
    }

    /// Verify the entries selected by `target`, `latest` or neither (all)
    pub fn verify_target(
        &self,
        target: Option<&str>,
        latest: Option<usize>,
        history: bool,
    ) -> WardResult<VerifyReport> {
        let entries = self.registry.catalog(history)?;
        let selected: Vec<&ArchiveEntry> = match (target, latest) {
            (Some(token), _) => vec![select(&entries, Some(token))?],
            (None, Some(count)) => select_latest(&entries, count),
            (None, None) => entries.iter().collect(),
        };
        self.verify(&selected)
    }

    /// Check that each entry unseals to a readable tar
    ///
    /// Every entry is attempted; one failure never stops the rest.
    pub fn verify(&self, entries: &[&ArchiveEntry]) -> WardResult<VerifyReport> {
        let overall = scratch_dir(self.paths().root(), ".ward-verify-")?;
        let mut report = VerifyReport::default();

        for entry in entries {
            let outcome = match tempfile::Builder::new().prefix("entry-").tempdir_in(overall.path()) {
                Ok(area) => {
                    let result = self.verify_one(entry, area.path());
                    if let Err(e) = area.close() {
                        warn!(error = %e, "could not remove verify scratch area");
                    }
                    result
                }
                Err(e) => Err(WardError::Io(format!("Failed to create scratch area: {}", e))),
            };

            let result = match outcome {
                Ok(members) => VerifyOutcome {
                    name: entry.name.clone(),
                    commit: entry.provenance.as_ref().map(|p| p.short_hash().to_string()),
                    valid: true,
                    members,
                    reason: None,
                },
                Err(e) => {
                    debug!(name = %entry.name, error = %e, "verification failed");
                    VerifyOutcome {
                        name: entry.name.clone(),
                        commit: entry.provenance.as_ref().map(|p| p.short_hash().to_string()),
                        valid: false,
                        members: 0,
                        reason: Some(e.to_string()),
                    }
                }
            };
            report.results.push(result);
        }

        overall
            .close()
            .map_err(|e| WardError::Io(format!("Failed to remove scratch directory: {}", e)))?;
        Ok(report)
    }

    fn verify_one(&self, entry: &ArchiveEntry, area: &Path) -> WardResult<usize> {
        let sealed = self.materialize(entry, area)?;
        let plain = area.join("verify.tar");
        self.gpg.unseal_to(&sealed, &plain, &self.signing)?;
        Ok(self.packer.list(&plain)?.len())
    }
}

/// Move `staging` to `target`, parking any existing `target` at `parked`
///
/// If the second rename fails the parked tree is moved back.
fn swap_into_place(staging: &Path, target: &Path, parked: &Path) -> WardResult<()> {
    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, parked)?;
    } else if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if had_previous {
            if let Err(undo) = fs::rename(parked, target) {
                warn!(error = %undo, path = %parked.display(), "could not put the previous tree back");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// Outcome of a successful restore
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub name: String,
    pub commit: Option<String>,
    /// Non-directory entries now in the private tree
    pub files_restored: usize,
}

impl RestoreResult {
    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        let from = match &self.commit {
            Some(hash) => format!("{} ({})", self.name, &hash[..hash.len().min(7)]),
            None => self.name.clone(),
        };
        format!("Restored {} file(s) from {}", self.files_restored, from)
    }
}

/// Outcome of a pull
#[derive(Debug, Clone, Serialize)]
pub struct PullResult {
    /// Whether local changes were stashed and re-applied
    pub stashed: bool,
    /// `None` when the catalog was still empty after pulling
    pub restored: Option<RestoreResult>,
}

/// Verification result for one entry
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub name: String,
    /// Short commit hash, when committed
    pub commit: Option<String>,
    pub valid: bool,
    /// Entries in the tar's table of contents
    pub members: usize,
    pub reason: Option<String>,
}

/// Aggregate verification result
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub results: Vec<VerifyOutcome>,
}

impl VerifyReport {
    /// True only if every entry validated
    pub fn all_valid(&self) -> bool {
        self.results.iter().all(|r| r.valid)
    }

    pub fn invalid_count(&self) -> usize {
        self.results.iter().filter(|r| !r.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ArchiveManager;
    use crate::process::fake::FakeToolchain;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings {
            recipients: vec!["me@example.com".into()],
            ..Settings::default()
        }
    }

    fn setup() -> (TempDir, WardPaths) {
        let temp = TempDir::new().unwrap();
        let paths = WardPaths::with_root(temp.path());
        paths.ensure_directories().unwrap();
        fs::create_dir_all(paths.private_dir().join("notes")).unwrap();
        fs::write(paths.private_dir().join("journal.md"), b"day one").unwrap();
        fs::write(paths.private_dir().join("notes/a.md"), b"alpha").unwrap();
        (temp, paths)
    }

    fn no_scratch_left(root: &Path) -> bool {
        fs::read_dir(root)
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().starts_with(".ward-"))
    }

    #[test]
    fn test_restore_replaces_whole_tree() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let entry = manager.create_archive().unwrap();
        fs::write(paths.private_dir().join("journal.md"), b"overwritten").unwrap();
        fs::write(paths.private_dir().join("stray.md"), b"not in archive").unwrap();
        fs::remove_file(paths.private_dir().join("notes/a.md")).unwrap();

        let result = restorer.restore(&entry).unwrap();

        assert_eq!(result.files_restored, 2);
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
        assert_eq!(fs::read(paths.private_dir().join("notes/a.md")).unwrap(), b"alpha");
        assert!(!paths.private_dir().join("stray.md").exists());
        assert!(no_scratch_left(temp.path()));
    }

    #[test]
    fn test_failed_restore_leaves_tree_untouched() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let entry = manager.create_archive().unwrap();

        fs::write(paths.private_dir().join("journal.md"), b"current").unwrap();
        fake.forget_secret_key("me@example.com");
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let err = restorer.restore(&entry).unwrap_err();
        assert!(matches!(err, WardError::RestoreFailed(_)));
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"current");
        assert!(no_scratch_left(temp.path()));
    }

    #[test]
    fn test_restore_target_on_empty_catalog_is_noop() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        assert!(restorer.restore_target(None, false).unwrap().is_none());
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
    }

    #[test]
    fn test_restore_target_defaults_to_newest_committed() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let committed = manager.create_archive().unwrap();
        fake.commit("snapshot", &[committed.repo_path.as_str()]);
        fs::write(paths.private_dir().join("journal.md"), b"day two").unwrap();
        manager.create_archive().unwrap();

        let result = restorer.restore_target(None, false).unwrap().unwrap();
        assert_eq!(result.name, committed.name);
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
    }

    #[test]
    fn test_restore_from_history_after_blob_deleted() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let entry = manager.create_archive().unwrap();
        let hash = fake.commit("snapshot", &[entry.repo_path.as_str()]);
        fs::remove_file(&entry.path).unwrap();
        fs::write(paths.private_dir().join("journal.md"), b"lost").unwrap();

        let result = restorer.restore_target(Some(&hash[..8]), true).unwrap().unwrap();
        assert_eq!(result.name, entry.name);
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
        assert!(!entry.path.exists());
    }

    #[test]
    fn test_pull_restores_archive_from_upstream() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        // Another checkout archived this tree and pushed it
        let upstream = manager.create_archive().unwrap();
        let sealed = fs::read(&upstream.path).unwrap();
        fs::remove_file(&upstream.path).unwrap();
        fake.push_remote("from laptop", &[(upstream.repo_path.as_str(), sealed)]);

        fs::write(paths.private_dir().join("journal.md"), b"stale").unwrap();
        let staged_before = fake.staged();
        assert!(!staged_before.is_empty());

        let result = restorer.pull().unwrap();

        assert!(result.stashed);
        assert_eq!(result.restored.unwrap().name, upstream.name);
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
        assert_eq!(fake.staged(), staged_before);
        assert_eq!(fake.stash_depth(), 0);
        assert!(no_scratch_left(temp.path()));
    }

    #[test]
    fn test_pull_without_local_changes_skips_stash() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let result = restorer.pull().unwrap();

        assert!(!result.stashed);
        assert!(result.restored.is_none());
        assert!(!fake
            .calls()
            .iter()
            .any(|c| c.args.first().map(String::as_str) == Some("stash")));
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"day one");
    }

    #[test]
    fn test_failed_pull_reapplies_stash_and_keeps_tree() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let entry = manager.create_archive().unwrap();
        fake.commit("snapshot", &[entry.repo_path.as_str()]);
        fake.fail_when("git", "pull");
        fs::write(paths.private_dir().join("journal.md"), b"local edit").unwrap();
        let staged_before = fake.staged();

        let err = restorer.pull().unwrap_err();

        assert!(matches!(err, WardError::Process { ref tool, .. } if tool == "git"));
        assert_eq!(fake.staged(), staged_before);
        assert_eq!(fake.stash_depth(), 0);
        assert_eq!(fs::read(paths.private_dir().join("journal.md")).unwrap(), b"local edit");
    }

    #[test]
    fn test_verify_reports_corrupt_entry_only() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        let a = manager.create_archive().unwrap();
        let b = manager.create_archive().unwrap();
        let c = manager.create_archive().unwrap();

        // Truncate the last byte of the middle archive
        let bytes = fs::read(&b.path).unwrap();
        fs::write(&b.path, &bytes[..bytes.len() - 1]).unwrap();

        let report = restorer.verify_target(None, None, false).unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(!report.all_valid());
        assert_eq!(report.invalid_count(), 1);

        for outcome in &report.results {
            if outcome.name == b.name {
                assert!(!outcome.valid);
                assert!(outcome.reason.is_some());
            } else {
                assert!(outcome.name == a.name || outcome.name == c.name);
                assert!(outcome.valid);
                assert!(outcome.members > 0);
            }
        }
        assert!(no_scratch_left(temp.path()));
    }

    #[test]
    fn test_verify_latest_subset() {
        let (temp, paths) = setup();
        let fake = FakeToolchain::new(temp.path());
        let manager = ArchiveManager::new(&fake, paths.clone(), settings());
        let restorer = RestoreManager::new(&fake, paths.clone(), settings());

        manager.create_archive().unwrap();
        let newest = manager.create_archive().unwrap();

        let report = restorer.verify_target(None, Some(1), false).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, newest.name);
        assert!(report.all_valid());
    }

    #[test]
    fn test_summary() {
        let result = RestoreResult {
            name: "1733100000.tar.gpg".into(),
            commit: Some("abc1234def".into()),
            files_restored: 3,
        };
        assert_eq!(result.summary(), "Restored 3 file(s) from 1733100000.tar.gpg (abc1234)");
    }
}
