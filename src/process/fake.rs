//! In-memory stand-ins for tar, gpg and git used by unit tests
//!
//! Emulates exactly the command lines ward issues. "Archives" are JSON
//! trees, "encryption" is a header naming the recipients, and git history is
//! a list of scripted commits holding full snapshots of the files they saw.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{Invocation, ProcessOutput, ProcessRunner};
use crate::config::ExclusionSet;
use crate::error::WardResult;

const SEAL_HEADER: &str = "FAKEGPG:";

#[derive(Debug, Serialize, Deserialize)]
enum FakeNode {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FakeArchive {
    entries: BTreeMap<String, FakeNode>,
}

#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub hash: String,
    pub author: String,
    pub timestamp: i64,
    pub message: String,
    /// Paths changed by this commit
    pub touched: Vec<String>,
    /// Every file present at this revision
    pub tree: BTreeMap<String, Vec<u8>>,
}

/// Scripted tar + gpg + git
pub struct FakeToolchain {
    root: PathBuf,
    public_keys: RefCell<HashSet<String>>,
    secret_keys: RefCell<HashSet<String>>,
    commits: RefCell<Vec<FakeCommit>>,
    staged: RefCell<Vec<String>>,
    unstaged: RefCell<Vec<String>>,
    stashes: RefCell<Vec<Vec<String>>>,
    /// Commits waiting upstream: message plus the files they add
    remote: RefCell<Vec<(String, Vec<(String, Vec<u8>)>)>>,
    calls: RefCell<Vec<Invocation>>,
    failures: RefCell<Vec<(String, String)>>,
}

impl FakeToolchain {
    /// A toolchain whose git working directory is `root`, with one keypair for `me@example.com`
    pub fn new(root: &Path) -> Self {
        let fake = Self {
            root: root.to_path_buf(),
            public_keys: RefCell::new(HashSet::new()),
            secret_keys: RefCell::new(HashSet::new()),
            commits: RefCell::new(Vec::new()),
            staged: RefCell::new(Vec::new()),
            unstaged: RefCell::new(Vec::new()),
            stashes: RefCell::new(Vec::new()),
            remote: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
        };
        fake.add_keypair("me@example.com");
        fake
    }

    pub fn add_keypair(&self, identity: &str) {
        self.public_keys.borrow_mut().insert(identity.to_string());
        self.secret_keys.borrow_mut().insert(identity.to_string());
    }

    pub fn add_public_key(&self, identity: &str) {
        self.public_keys.borrow_mut().insert(identity.to_string());
    }

    pub fn forget_secret_key(&self, identity: &str) {
        self.secret_keys.borrow_mut().remove(identity);
    }

    /// Make any `program` call whose arguments include `arg` exit non-zero
    pub fn fail_when(&self, program: &str, arg: &str) {
        self.failures
            .borrow_mut()
            .push((program.to_string(), arg.to_string()));
    }

    /// Record a commit of `paths` (repo-relative) using their current bytes on disk
    pub fn commit(&self, message: &str, paths: &[&str]) -> String {
        let index = self.commits.borrow().len() as u64;
        let hash = synthetic_hash(index);
        self.commit_with_hash(&hash, message, paths);
        hash
    }

    pub fn commit_with_hash(&self, hash: &str, message: &str, paths: &[&str]) {
        let mut commits = self.commits.borrow_mut();
        let mut tree = commits.last().map(|c| c.tree.clone()).unwrap_or_default();

        for path in paths {
            match std::fs::read(self.root.join(path)) {
                Ok(bytes) => {
                    tree.insert(path.to_string(), bytes);
                }
                Err(_) => {
                    tree.remove(*path);
                }
            }
        }

        let timestamp = 1_700_000_000 + commits.len() as i64 * 60;
        commits.push(FakeCommit {
            hash: hash.to_string(),
            author: "Test User <me@example.com>".to_string(),
            timestamp,
            message: message.to_string(),
            touched: paths.iter().map(|p| p.to_string()).collect(),
            tree,
        });
    }

    /// Queue an upstream commit that the next `git pull` writes to disk and records
    pub fn push_remote(&self, message: &str, files: &[(&str, Vec<u8>)]) {
        self.remote.borrow_mut().push((
            message.to_string(),
            files
                .iter()
                .map(|(path, bytes)| (path.to_string(), bytes.clone()))
                .collect(),
        ));
    }

    pub fn stash_depth(&self) -> usize {
        self.stashes.borrow().len()
    }

    fn pull(&self) -> ProcessOutput {
        let pending: Vec<_> = self.remote.borrow_mut().drain(..).collect();
        for (message, files) in pending {
            for (path, bytes) in &files {
                let dest = self.root.join(path);
                let written = dest
                    .parent()
                    .map(std::fs::create_dir_all)
                    .unwrap_or(Ok(()))
                    .and_then(|_| std::fs::write(&dest, bytes));
                if let Err(e) = written {
                    return ProcessOutput::failed(1, format!("error: {}", e));
                }
            }
            let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
            self.commit(&message, &paths);
        }
        ProcessOutput::ok("Successfully rebased and updated refs/heads/main.\n")
    }

    pub fn staged(&self) -> Vec<String> {
        self.staged.borrow().clone()
    }

    pub fn unstaged(&self) -> Vec<String> {
        self.unstaged.borrow().clone()
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Number of calls made to `program`
    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    fn resolve(&self, cwd: &Option<PathBuf>, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            cwd.clone().unwrap_or_else(|| self.root.clone()).join(path)
        }
    }

    fn run_tar(&self, inv: &Invocation) -> ProcessOutput {
        let args = &inv.args;
        if args.iter().any(|a| a == "--version") {
            return ProcessOutput::ok("tar (fake) 1.0\n");
        }

        let value_after = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        if let Some(out) = value_after("-cf") {
            let Some(dir) = value_after("-C") else {
                return ProcessOutput::failed(2, "tar: missing -C");
            };
            let exclusions = args
                .iter()
                .find_map(|a| a.strip_prefix("--exclude-from="))
                .map(|f| ExclusionSet::load(&self.resolve(&inv.cwd, f)))
                .transpose();
            let exclusions = match exclusions {
                Ok(set) => set.unwrap_or_default(),
                Err(e) => return ProcessOutput::failed(2, e.to_string()),
            };

            let source = self.resolve(&inv.cwd, &dir);
            let mut archive = FakeArchive::default();
            for entry in WalkDir::new(&source).min_depth(1).sort_by_file_name() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => return ProcessOutput::failed(2, format!("tar: {}", e)),
                };
                let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
                if exclusions.is_excluded(relative) {
                    continue;
                }
                let key = relative.to_string_lossy().replace('\\', "/");
                if entry.file_type().is_dir() {
                    archive.entries.insert(key, FakeNode::Dir);
                } else {
                    match std::fs::read(entry.path()) {
                        Ok(bytes) => {
                            archive.entries.insert(key, FakeNode::File(bytes));
                        }
                        Err(e) => return ProcessOutput::failed(2, format!("tar: {}", e)),
                    }
                }
            }

            let json = serde_json::to_vec(&archive).unwrap_or_default();
            return match std::fs::write(self.resolve(&inv.cwd, &out), json) {
                Ok(()) => ProcessOutput::ok(Vec::new()),
                Err(e) => ProcessOutput::failed(2, format!("tar: {}", e)),
            };
        }

        let read_archive = |file: &str| -> Result<FakeArchive, String> {
            let bytes = std::fs::read(self.resolve(&inv.cwd, file)).map_err(|e| format!("tar: {}", e))?;
            serde_json::from_slice(&bytes)
                .map_err(|_| "tar: This does not look like a tar archive".to_string())
        };

        if let Some(file) = value_after("-tf") {
            return match read_archive(&file) {
                Ok(archive) => {
                    let listing: String = archive
                        .entries
                        .keys()
                        .map(|k| format!("./{}\n", k))
                        .collect();
                    ProcessOutput::ok(listing)
                }
                Err(e) => ProcessOutput::failed(2, e),
            };
        }

        if let Some(file) = value_after("-xf") {
            let Some(dir) = value_after("-C") else {
                return ProcessOutput::failed(2, "tar: missing -C");
            };
            let archive = match read_archive(&file) {
                Ok(a) => a,
                Err(e) => return ProcessOutput::failed(2, e),
            };
            let target = self.resolve(&inv.cwd, &dir);
            for (key, node) in archive.entries {
                let path = target.join(&key);
                let result = match node {
                    FakeNode::Dir => std::fs::create_dir_all(&path),
                    FakeNode::File(bytes) => path
                        .parent()
                        .map(std::fs::create_dir_all)
                        .unwrap_or(Ok(()))
                        .and_then(|_| std::fs::write(&path, bytes)),
                };
                if let Err(e) = result {
                    return ProcessOutput::failed(2, format!("tar: {}", e));
                }
            }
            return ProcessOutput::ok(Vec::new());
        }

        ProcessOutput::failed(2, format!("tar: unsupported arguments {:?}", args))
    }

    fn run_gpg(&self, inv: &Invocation) -> ProcessOutput {
        let args = &inv.args;
        if args.iter().any(|a| a == "--version") {
            return ProcessOutput::ok("gpg (GnuPG) fake\n");
        }

        if args.iter().any(|a| a == "--list-keys") {
            let Some(identity) = args.last() else {
                return ProcessOutput::failed(2, "gpg: no identity");
            };
            return if self.public_keys.borrow().contains(identity) {
                ProcessOutput::ok(format!("pub:u:4096:1:ABCD:::::::\nuid:u::::::::{}:\n", identity))
            } else {
                ProcessOutput::failed(2, "gpg: error reading key: No public key")
            };
        }

        let Some(output) = args
            .iter()
            .position(|a| a == "--output")
            .and_then(|i| args.get(i + 1))
            .map(|o| self.resolve(&inv.cwd, o))
        else {
            return ProcessOutput::failed(2, "gpg: missing --output");
        };
        let Some(input) = args.last().map(|i| self.resolve(&inv.cwd, i)) else {
            return ProcessOutput::failed(2, "gpg: missing input");
        };
        if output.exists() {
            return ProcessOutput::failed(2, format!("gpg: {}: File exists", output.display()));
        }
        let plain = match std::fs::read(&input) {
            Ok(b) => b,
            Err(e) => return ProcessOutput::failed(2, format!("gpg: can't open '{}': {}", input.display(), e)),
        };

        if args.iter().any(|a| a == "--encrypt") {
            let recipients: Vec<String> = args
                .windows(2)
                .filter(|w| w[0] == "--recipient")
                .map(|w| w[1].clone())
                .collect();
            if let Some(unknown) = recipients
                .iter()
                .find(|r| !self.public_keys.borrow().contains(*r))
            {
                return ProcessOutput::failed(2, format!("gpg: {}: skipped: No public key", unknown));
            }
            let mut sealed = format!("{}{}\n", SEAL_HEADER, recipients.join(",")).into_bytes();
            sealed.extend_from_slice(&plain);
            return match std::fs::write(&output, sealed) {
                Ok(()) => ProcessOutput::ok(Vec::new()),
                Err(e) => ProcessOutput::failed(2, format!("gpg: {}", e)),
            };
        }

        if args.iter().any(|a| a == "--decrypt") {
            let Some(rest) = plain.strip_prefix(SEAL_HEADER.as_bytes()) else {
                return ProcessOutput::failed(2, "gpg: no valid OpenPGP data found.");
            };
            let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
                return ProcessOutput::failed(2, "gpg: invalid packet");
            };
            let recipients = String::from_utf8_lossy(&rest[..newline]).into_owned();
            let can_decrypt = recipients
                .split(',')
                .any(|r| self.secret_keys.borrow().contains(r));
            if !can_decrypt {
                return ProcessOutput::failed(2, "gpg: decryption failed: No secret key");
            }
            return match std::fs::write(&output, &rest[newline + 1..]) {
                Ok(()) => ProcessOutput::ok(Vec::new()),
                Err(e) => ProcessOutput::failed(2, format!("gpg: {}", e)),
            };
        }

        ProcessOutput::failed(2, format!("gpg: unsupported arguments {:?}", args))
    }

    fn run_git(&self, inv: &Invocation) -> ProcessOutput {
        let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
        let paths_after_dashdash = || -> Vec<String> {
            args.iter()
                .position(|a| *a == "--")
                .map(|i| args[i + 1..].iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        };

        match args.first().copied() {
            Some("--version") => ProcessOutput::ok("git version fake\n"),
            Some("log") => {
                let single = args.contains(&"-1");
                let filters = paths_after_dashdash();
                let commits = self.commits.borrow();
                let mut out = String::new();
                for commit in commits.iter().rev() {
                    let touches = commit.touched.iter().any(|t| {
                        filters.iter().any(|f| {
                            let dir = f.trim_end_matches('/');
                            t == f || t.starts_with(&format!("{}/", dir))
                        })
                    });
                    if !touches {
                        continue;
                    }
                    out.push_str(&format!(
                        "{}\x1f{}\x1f{}\x1f{}\n",
                        commit.hash, commit.author, commit.timestamp, commit.message
                    ));
                    if single {
                        break;
                    }
                }
                ProcessOutput::ok(out)
            }
            Some("ls-tree") => {
                let Some(rev) = args.iter().find(|a| !a.starts_with('-') && **a != "ls-tree") else {
                    return ProcessOutput::failed(128, "fatal: missing revision");
                };
                let dir = paths_after_dashdash()
                    .first()
                    .map(|d| d.trim_end_matches('/').to_string())
                    .unwrap_or_default();
                let commits = self.commits.borrow();
                let Some(commit) = commits.iter().find(|c| c.hash == *rev) else {
                    return ProcessOutput::failed(128, format!("fatal: not a tree object: {}", rev));
                };
                let mut out = String::new();
                for (path, bytes) in &commit.tree {
                    let in_dir = path
                        .strip_prefix(&format!("{}/", dir))
                        .map(|rest| !rest.contains('/'))
                        .unwrap_or(false);
                    if in_dir {
                        out.push_str(&format!(
                            "100644 blob {} {:>7}\t{}\n",
                            synthetic_hash(bytes.len() as u64),
                            bytes.len(),
                            path
                        ));
                    }
                }
                ProcessOutput::ok(out)
            }
            Some("cat-file") => {
                let Some(object) = args.last() else {
                    return ProcessOutput::failed(128, "fatal: missing object");
                };
                let Some((rev, path)) = object.split_once(':') else {
                    return ProcessOutput::failed(128, "fatal: bad object");
                };
                let commits = self.commits.borrow();
                match commits
                    .iter()
                    .find(|c| c.hash == rev)
                    .and_then(|c| c.tree.get(path))
                {
                    Some(bytes) => ProcessOutput::ok(bytes.clone()),
                    None => ProcessOutput::failed(128, format!("fatal: path '{}' does not exist", path)),
                }
            }
            Some("add") => {
                self.staged.borrow_mut().extend(paths_after_dashdash());
                ProcessOutput::ok(Vec::new())
            }
            Some("status") => {
                let listing: String = self
                    .staged
                    .borrow()
                    .iter()
                    .map(|p| format!("A  {}\n", p))
                    .collect();
                ProcessOutput::ok(listing)
            }
            Some("stash") if args.get(1) == Some(&"pop") => match self.stashes.borrow_mut().pop() {
                Some(paths) => {
                    self.staged.borrow_mut().extend(paths);
                    ProcessOutput::ok(Vec::new())
                }
                None => ProcessOutput::failed(1, "No stash entries found."),
            },
            Some("stash") => {
                let paths: Vec<String> = self.staged.borrow_mut().drain(..).collect();
                if paths.is_empty() {
                    return ProcessOutput::ok("No local changes to save\n");
                }
                self.stashes.borrow_mut().push(paths);
                ProcessOutput::ok(Vec::new())
            }
            Some("pull") => self.pull(),
            Some("rm") => {
                let paths = paths_after_dashdash();
                self.staged.borrow_mut().retain(|s| !paths.contains(s));
                self.unstaged.borrow_mut().extend(paths);
                ProcessOutput::ok(Vec::new())
            }
            _ => ProcessOutput::failed(1, format!("git: unsupported arguments {:?}", args)),
        }
    }
}

impl ProcessRunner for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> WardResult<ProcessOutput> {
        self.calls.borrow_mut().push(invocation.clone());

        let injected = self.failures.borrow().iter().any(|(program, arg)| {
            *program == invocation.program && invocation.args.iter().any(|a| a == arg)
        });
        if injected {
            return Ok(ProcessOutput::failed(2, format!("{}: injected failure", invocation.program)));
        }

        Ok(match invocation.program.as_str() {
            "tar" => self.run_tar(invocation),
            "gpg" => self.run_gpg(invocation),
            "git" => self.run_git(invocation),
            other => ProcessOutput::failed(127, format!("{}: command not found", other)),
        })
    }
}

/// Deterministic 40-character hex hash for commit `n`
pub fn synthetic_hash(n: u64) -> String {
    let a = n.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let b = a.rotate_left(17) ^ 0xD1B5_4A32_D192_ED03;
    format!("{:016x}{:016x}{:08x}", a, b, (a >> 32) as u32)
}
