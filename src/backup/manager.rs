//! Archive manager for ward
//!
//! Creates sealed archives of the private tree, skips creation when nothing
//! changed since the latest archive, and prunes uncommitted archives.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::diff::{compare_trees, TreeDiff};
use super::packer::Packer;
use super::scratch_dir;
use crate::archive::name;
use crate::archive::{ArchiveEntry, ArchiveRegistry};
use crate::config::{ExclusionSet, Settings, WardPaths};
use crate::crypto::{GpgTransport, SigningOptions};
use crate::error::{WardError, WardResult};
use crate::process::ProcessRunner;
use crate::vcs::GitClient;

/// Ignore entry covering every scratch directory
const SCRATCH_IGNORE: &str = "/.ward-*/";

/// How many 1 ms steps a fresh name may be advanced past an occupied one
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// Manages archive creation and cleanup
pub struct ArchiveManager<'a> {
    registry: ArchiveRegistry<'a>,
    gpg: GpgTransport<'a>,
    packer: Packer<'a>,
    settings: Settings,
}

impl<'a> ArchiveManager<'a> {
    /// Create a new ArchiveManager
    pub fn new(runner: &'a dyn ProcessRunner, paths: WardPaths, settings: Settings) -> Self {
        let git = GitClient::new(runner, &settings.programs.git, paths.root());
        Self {
            registry: ArchiveRegistry::new(paths, git),
            gpg: GpgTransport::new(runner, &settings.programs.gpg),
            packer: Packer::new(runner, &settings.programs.tar),
            settings,
        }
    }

    pub fn registry(&self) -> &ArchiveRegistry<'a> {
        &self.registry
    }

    fn paths(&self) -> &WardPaths {
        self.registry.paths()
    }

    /// A structured name for `now` that no file in storage already uses
    ///
    /// Advances the instant 1 ms at a time past occupied names.
    pub fn fresh_name(&self, now: DateTime<Utc>) -> WardResult<String> {
        for step in 0..MAX_NAME_ATTEMPTS {
            let candidate = name::encode(now + Duration::milliseconds(step));
            if !self.paths().archive_path(&candidate).exists() {
                return Ok(candidate);
            }
        }
        Err(WardError::NameCollision(name::encode(now)))
    }

    /// Pack, seal and stage a new archive of the private tree
    pub fn create_archive(&self) -> WardResult<ArchiveEntry> {
        let exclusions = ExclusionSet::load(&self.paths().exclusion_file())?;
        self.create_with(&exclusions)
    }

    /// Create an archive only if the private tree differs from the latest one
    ///
    /// With `force`, or when no archive exists yet, always creates.
    pub fn pack_if_changed(&self, force: bool) -> WardResult<ArchiveEntry> {
        let exclusions = ExclusionSet::load(&self.paths().exclusion_file())?;

        if !force {
            let entries = self.registry.list()?;
            if let Some(latest) = entries.first() {
                let diff = self.diff_against(latest, &exclusions)?;
                if diff.is_empty() {
                    return Err(WardError::NoChangesDetected {
                        latest: latest.name.clone(),
                    });
                }
                debug!(
                    latest = %latest.name,
                    added = diff.added.len(),
                    removed = diff.removed.len(),
                    modified = diff.modified.len(),
                    "private tree changed"
                );
            }
        }

        self.create_with(&exclusions)
    }

    /// Differences between `entry`'s contents and the private tree
    pub fn diff_against(&self, entry: &ArchiveEntry, exclusions: &ExclusionSet) -> WardResult<TreeDiff> {
        let scratch = scratch_dir(self.paths().root(), ".ward-diff-")?;
        let plain = scratch.path().join("latest.tar");
        let tree = scratch.path().join("tree");

        let signing = SigningOptions::from_settings(&self.settings);
        self.gpg.unseal_to(&entry.path, &plain, &signing)?;
        fs::create_dir_all(&tree)?;
        self.packer.extract(&plain, &tree)?;

        compare_trees(&tree, &self.paths().private_dir(), exclusions)
    }

    fn create_with(&self, exclusions: &ExclusionSet) -> WardResult<ArchiveEntry> {
        let recipients = self.settings.effective_recipients();
        self.gpg.check_recipients(&recipients)?;

        let private_dir = self.paths().private_dir();
        if !private_dir.is_dir() {
            return Err(WardError::Config(format!(
                "Private directory not found: {} (run 'ward init')",
                private_dir.display()
            )));
        }
        fs::create_dir_all(self.paths().archive_dir())
            .map_err(|e| WardError::Io(format!("Failed to create archive directory: {}", e)))?;

        // Dropping the scratch dir removes the plaintext tar on every path
        let scratch = scratch_dir(self.paths().root(), ".ward-pack-")?;
        let plain = scratch.path().join("archive.tar");
        self.packer.pack(&private_dir, &plain, exclusions, scratch.path())?;

        let name = self.fresh_name(Utc::now())?;
        let dest = self.paths().archive_path(&name);
        let signing = SigningOptions::from_settings(&self.settings);
        self.gpg
            .seal_checked(&plain, &dest, &recipients, &signing)
            .map_err(|e| match e {
                WardError::DestinationExists(_) => WardError::NameCollision(name.clone()),
                other => other,
            })?;
        remove_plaintext(&plain);

        let size = fs::metadata(&dest)?.len();
        let repo_path = self.paths().archive_git_path(&name);
        let entry = ArchiveEntry::new(&name, size, dest, &repo_path, None)?;

        if self.settings.auto_stage {
            if let Err(e) = self.registry.git().stage(&repo_path) {
                warn!(path = %repo_path, error = %e, "archive created but not staged");
            }
        }

        info!(name = %entry.name, size_bytes = entry.size_bytes, "archive created");
        Ok(entry)
    }

    /// Delete every uncommitted archive except the newest one
    ///
    /// Returns the names removed (or, with `dry_run`, that would be).
    pub fn cleanup_uncommitted(&self, dry_run: bool) -> WardResult<Vec<String>> {
        let entries = self.registry.list()?;
        let mut removed = Vec::new();

        for entry in entries.iter().filter(|e| !e.is_committed()).skip(1) {
            if !dry_run {
                self.registry.git().unstage(&entry.repo_path)?;
                fs::remove_file(&entry.path).map_err(|e| {
                    WardError::Io(format!("Failed to delete {}: {}", entry.name, e))
                })?;
                info!(name = %entry.name, "uncommitted archive deleted");
            }
            removed.push(entry.name.clone());
        }

        Ok(removed)
    }

    /// Create the private tree and storage directory, plus an initial archive
    /// when storage holds none
    ///
    /// Also keeps the plaintext tree and scratch directories out of git.
    pub fn init(&self) -> WardResult<Option<ArchiveEntry>> {
        self.paths().ensure_directories()?;
        self.ensure_gitignore()?;
        if !self.registry.list()?.is_empty() {
            return Ok(None);
        }
        self.create_archive().map(Some)
    }

    /// Append the plaintext ignore entries `.gitignore` lacks; returns those added
    pub fn ensure_gitignore(&self) -> WardResult<Vec<String>> {
        let path = self.paths().gitignore_file();
        let existing = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(WardError::Io(format!("Failed to read {}: {}", path.display(), e)));
            }
        };

        let private = self
            .paths()
            .private_dir_relative()
            .to_string_lossy()
            .replace('\\', "/");
        let wanted = [
            format!("/{}/", private.trim_matches('/')),
            SCRATCH_IGNORE.to_string(),
        ];
        let missing: Vec<String> = wanted
            .into_iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == entry))
            .collect();
        if missing.is_empty() {
            return Ok(missing);
        }

        let mut contents = existing;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        for entry in &missing {
            contents.push_str(entry);
            contents.push('\n');
        }
        fs::write(&path, contents)
            .map_err(|e| WardError::Io(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!(entries = ?missing, "updated .gitignore");
        Ok(missing)
    }
}

fn remove_plaintext(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "plaintext already gone");
    }
}
