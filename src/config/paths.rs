//! Path management for ward
//!
//! Every path ward touches hangs off a single repository root.
//!
//! ## Path Resolution Order
//!
//! 1. `--root` command line flag
//! 2. `WARD_ROOT` environment variable
//! 3. The current working directory

use std::path::{Path, PathBuf};

use super::settings::Settings;
use crate::error::WardError;

/// Name of the optional settings file inside the root
pub const SETTINGS_FILE: &str = ".ward.json";

/// Name of the dotenv file inside the root
pub const DOTENV_FILE: &str = ".env";

/// Name of git's ignore file inside the root
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Manages all paths used by ward
#[derive(Debug, Clone)]
pub struct WardPaths {
    /// Repository root (also the git working directory)
    root: PathBuf,
    /// Private tree, relative to root
    private_dir: PathBuf,
    /// Sealed blob storage, relative to root
    archive_dir: PathBuf,
    /// Exclusion pattern file, relative to root
    exclusion_file: PathBuf,
}

impl WardPaths {
    /// Create paths with the default layout under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::from_settings(root, &Settings::default())
    }

    /// Create paths using the directory names from `settings`
    pub fn from_settings(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            root: root.into(),
            private_dir: PathBuf::from(&settings.private_dir),
            archive_dir: PathBuf::from(&settings.archive_dir),
            exclusion_file: PathBuf::from(&settings.exclusion_file),
        }
    }

    /// Resolve the root from an explicit override or the current directory
    pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf, WardError> {
        match explicit {
            Some(root) => Ok(root),
            None => std::env::current_dir().map_err(|e| {
                WardError::Config(format!("Could not determine current directory: {}", e))
            }),
        }
    }

    /// Get the repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the private tree (plaintext working directory)
    pub fn private_dir(&self) -> PathBuf {
        self.root.join(&self.private_dir)
    }

    /// Get the storage directory holding sealed blobs
    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(&self.archive_dir)
    }

    /// Get the storage directory relative to the root (as git sees it)
    pub fn archive_dir_relative(&self) -> &Path {
        &self.archive_dir
    }

    /// Get the private tree relative to the root (as git sees it)
    pub fn private_dir_relative(&self) -> &Path {
        &self.private_dir
    }

    /// Get the exclusion pattern file
    pub fn exclusion_file(&self) -> PathBuf {
        self.root.join(&self.exclusion_file)
    }

    /// Get the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Get the dotenv file
    pub fn dotenv_file(&self) -> PathBuf {
        self.root.join(DOTENV_FILE)
    }

    /// Get git's ignore file
    pub fn gitignore_file(&self) -> PathBuf {
        self.root.join(GITIGNORE_FILE)
    }

    /// Path of a sealed blob inside the storage directory
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.archive_dir().join(name)
    }

    /// Repository-relative path of a sealed blob, with forward slashes
    pub fn archive_git_path(&self, name: &str) -> String {
        let dir = self.archive_dir.to_string_lossy().replace('\\', "/");
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() || dir == "." {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        }
    }

    /// Ensure the private tree and the storage directory exist
    pub fn ensure_directories(&self) -> Result<(), WardError> {
        std::fs::create_dir_all(self.private_dir())
            .map_err(|e| WardError::Io(format!("Failed to create private directory: {}", e)))?;

        std::fs::create_dir_all(self.archive_dir())
            .map_err(|e| WardError::Io(format!("Failed to create archive directory: {}", e)))?;

        Ok(())
    }
}
