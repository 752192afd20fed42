//! Git collaborator
//!
//! Thin wrapper over the handful of git plumbing commands ward needs:
//! provenance for a path, the commits that touched the storage directory,
//! the sealed blobs present at a revision, exporting a blob, and staging.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tracing::{debug, warn};

use crate::archive::Provenance;
use crate::error::{WardError, WardResult};
use crate::process::{Invocation, ProcessRunner};

/// `git log` format: hash, author, commit time, subject, separated by US (0x1f)
const LOG_FORMAT: &str = "--format=%H%x1f%an <%ae>%x1f%ct%x1f%s";

/// One blob listed by `git ls-tree -l`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBlob {
    /// Repository-relative path
    pub path: String,
    pub size_bytes: u64,
}

impl TreeBlob {
    /// Final path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Runs git in the repository root
pub struct GitClient<'a> {
    runner: &'a dyn ProcessRunner,
    program: String,
    root: PathBuf,
}

impl<'a> GitClient<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, program: impl Into<String>, root: &Path) -> Self {
        Self {
            runner,
            program: program.into(),
            root: root.to_path_buf(),
        }
    }

    fn git(&self) -> Invocation {
        Invocation::new(&self.program).current_dir(&self.root)
    }

    fn run_checked(&self, invocation: Invocation) -> WardResult<Vec<u8>> {
        let output = self.runner.run(&invocation)?;
        if !output.success() {
            return Err(WardError::process("git", output.diagnostics()));
        }
        Ok(output.stdout)
    }

    /// The most recent commit that touched exactly `repo_path`
    ///
    /// Returns `None` when the path was never committed or git has no answer
    /// (for example outside a repository).
    pub fn last_commit_for(&self, repo_path: &str) -> WardResult<Option<Provenance>> {
        let invocation = self.git().args(["log", "-1", LOG_FORMAT, "--", repo_path]);
        let output = self.runner.run(&invocation)?;
        if !output.success() {
            debug!(path = repo_path, error = %output.diagnostics(), "no provenance available");
            return Ok(None);
        }
        Ok(parse_log(&output.stdout_str()).into_iter().next())
    }

    /// Every commit touching anything under `repo_dir`, newest first
    pub fn history_for(&self, repo_dir: &str) -> WardResult<Vec<Provenance>> {
        let invocation = self.git().args(["log", LOG_FORMAT, "--", repo_dir]);
        let stdout = self.run_checked(invocation)?;
        Ok(parse_log(&String::from_utf8_lossy(&stdout)))
    }

    /// Blobs directly inside `repo_dir` at revision `commit`
    pub fn list_tree(&self, commit: &str, repo_dir: &str) -> WardResult<Vec<TreeBlob>> {
        let dir = format!("{}/", repo_dir.trim_end_matches('/'));
        let invocation = self.git().args(["ls-tree", "-l", commit, "--", dir.as_str()]);
        let stdout = self.run_checked(invocation)?;
        Ok(parse_ls_tree(&String::from_utf8_lossy(&stdout)))
    }

    /// Write the blob at `commit:repo_path` to `dest`
    pub fn export_blob(&self, commit: &str, repo_path: &str, dest: &Path) -> WardResult<()> {
        if dest.exists() {
            return Err(WardError::DestinationExists(dest.to_path_buf()));
        }
        let object = format!("{}:{}", commit, repo_path);
        let invocation = self.git().args(["cat-file", "blob", object.as_str()]);
        let bytes = self.run_checked(invocation)?;
        std::fs::write(dest, bytes).map_err(|e| {
            WardError::Io(format!("Failed to write {}: {}", dest.display(), e))
        })
    }

    /// Stage `repo_path` for the next commit
    pub fn stage(&self, repo_path: &str) -> WardResult<()> {
        self.run_checked(self.git().args(["add", "--", repo_path]))?;
        Ok(())
    }

    /// Drop `repo_path` from the index without touching the working tree
    pub fn unstage(&self, repo_path: &str) -> WardResult<()> {
        self.run_checked(self.git().args([
            "rm",
            "--cached",
            "--quiet",
            "--ignore-unmatch",
            "--",
            repo_path,
        ]))?;
        Ok(())
    }

    /// Whether the working tree or index has tracked changes
    pub fn has_local_changes(&self) -> WardResult<bool> {
        let stdout = self.run_checked(self.git().args([
            "status",
            "--porcelain",
            "--untracked-files=no",
        ]))?;
        Ok(!String::from_utf8_lossy(&stdout).trim().is_empty())
    }

    /// Set tracked changes aside on the stash
    pub fn stash(&self) -> WardResult<()> {
        self.run_checked(self.git().args(["stash", "push", "--message", "ward pull"]))?;
        Ok(())
    }

    /// Re-apply the most recent stash
    pub fn stash_pop(&self) -> WardResult<()> {
        self.run_checked(self.git().args(["stash", "pop"]))?;
        Ok(())
    }

    /// Fetch and rebase onto the upstream branch
    pub fn pull_rebase(&self) -> WardResult<()> {
        self.run_checked(self.git().args(["pull", "--rebase"]))?;
        Ok(())
    }

    /// First line of `git --version`
    pub fn version(&self) -> WardResult<String> {
        let stdout = self.run_checked(self.git().arg("--version"))?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

/// Parse `LOG_FORMAT` lines, skipping malformed ones
fn parse_log(stdout: &str) -> Vec<Provenance> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.splitn(4, '\x1f').collect();
            if fields.len() != 4 {
                warn!(line, "unexpected git log line");
                return None;
            }
            let seconds: i64 = fields[2].trim().parse().ok()?;
            Some(Provenance {
                commit_hash: fields[0].trim().to_string(),
                author: fields[1].to_string(),
                committed_at: Utc.timestamp_opt(seconds, 0).single()?,
                message: fields[3].to_string(),
            })
        })
        .collect()
}

/// Parse `git ls-tree -l` lines (`<mode> <type> <object> <size>\t<path>`), keeping blobs
fn parse_ls_tree(stdout: &str) -> Vec<TreeBlob> {
    stdout
        .lines()
        .filter_map(|line| {
            let (meta, path) = line.split_once('\t')?;
            let fields: Vec<&str> = meta.split_whitespace().collect();
            if fields.len() != 4 || fields[1] != "blob" {
                return None;
            }
            Some(TreeBlob {
                path: path.to_string(),
                size_bytes: fields[3].parse().ok()?,
            })
        })
        .collect()
}
