//! Archival engine for ward
//!
//! Packs the private tree into a tar, seals it with gpg into the storage
//! directory, and brings archives back.
//!
//! # Architecture
//!
//! - `ArchiveManager`: creates archives (optionally only when the tree
//!   changed), prunes uncommitted ones, initializes a repository
//! - `RestoreManager`: restores one archive over the private tree, pulls
//!   upstream and restores the newest, verifies any number of archives
//! - `Packer`: the tar driver both of them use
//! - `compare_trees`: the recursive diff behind change detection
//!
//! # Temporary files
//!
//! Plaintext tars only ever live in a scratch directory (`.ward-*`) created
//! inside the repository root and removed when the operation returns,
//! whether it succeeded or not. `init` adds `/.ward-*/` to `.gitignore` so an
//! interrupted run never leaves plaintext for git to pick up.
//!
//! # Example
//!
//! ```rust,ignore
//! use ward::backup::{ArchiveManager, RestoreManager};
//! use ward::config::{Settings, WardPaths};
//! use ward::process::SystemRunner;
//!
//! let runner = SystemRunner;
//! let paths = WardPaths::with_root("/home/me/vault");
//! let settings = Settings::load_or_default(paths.root())?;
//!
//! let manager = ArchiveManager::new(&runner, paths.clone(), settings.clone());
//! let entry = manager.pack_if_changed(false)?;
//!
//! let restorer = RestoreManager::new(&runner, paths, settings);
//! println!("{}", restorer.restore(&entry)?.summary());
//! ```

use std::path::Path;

use tempfile::TempDir;

use crate::error::{WardError, WardResult};

mod diff;
mod manager;
mod packer;
mod restore;

pub use diff::{compare_trees, TreeDiff};
pub use manager::ArchiveManager;
pub use packer::Packer;
pub use restore::{PullResult, RestoreManager, RestoreResult, VerifyOutcome, VerifyReport};

/// A scratch directory inside `root`, removed when dropped
pub(crate) fn scratch_dir(root: &Path, prefix: &str) -> WardResult<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(root)
        .map_err(|e| WardError::Io(format!("Failed to create scratch directory: {}", e)))
}
