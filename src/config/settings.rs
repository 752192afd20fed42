//! User settings for ward
//!
//! Settings come from an optional `.ward.json` in the repository root and
//! are then overridden by `WARD_*` environment variables (usually supplied
//! through `.env`). The result is resolved once at startup and handed to
//! every component; nothing below the CLI reads the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::paths::SETTINGS_FILE;
use crate::error::WardError;

/// Comma-separated list of recipient identities
pub const ENV_RECIPIENTS: &str = "WARD_GPG_RECIPIENTS";

/// Signing identity, also the fallback recipient
pub const ENV_SIGNING_KEY: &str = "WARD_GPG_KEY";

/// Names of the external programs ward drives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolPrograms {
    #[serde(default = "default_gpg")]
    pub gpg: String,
    #[serde(default = "default_tar")]
    pub tar: String,
    #[serde(default = "default_git")]
    pub git: String,
}

impl Default for ToolPrograms {
    fn default() -> Self {
        Self {
            gpg: default_gpg(),
            tar: default_tar(),
            git: default_git(),
        }
    }
}

/// User settings for ward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Identities every archive is encrypted to (email or key ID)
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Identity passed to gpg as `--local-user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Whether archives are also signed with `signing_key`
    #[serde(default)]
    pub sign_archives: bool,

    /// Whether new archives are staged with `git add`
    #[serde(default = "default_true")]
    pub auto_stage: bool,

    /// Private tree, relative to the root
    #[serde(default = "default_private_dir")]
    pub private_dir: String,

    /// Sealed blob storage, relative to the root
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Exclusion pattern file, relative to the root
    #[serde(default = "default_exclusion_file")]
    pub exclusion_file: String,

    /// External program names
    #[serde(default)]
    pub programs: ToolPrograms,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_private_dir() -> String {
    "private".to_string()
}

fn default_archive_dir() -> String {
    ".archives".to_string()
}

fn default_exclusion_file() -> String {
    ".encignore".to_string()
}

fn default_gpg() -> String {
    "gpg".to_string()
}

fn default_tar() -> String {
    "tar".to_string()
}

fn default_git() -> String {
    "git".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            recipients: Vec::new(),
            signing_key: None,
            sign_archives: false,
            auto_stage: true,
            private_dir: default_private_dir(),
            archive_dir: default_archive_dir(),
            exclusion_file: default_exclusion_file(),
            programs: ToolPrograms::default(),
        }
    }
}

impl Settings {
    /// Load settings from `<root>/.ward.json`, or defaults if the file doesn't exist
    pub fn load_or_default(root: &Path) -> Result<Self, WardError> {
        let settings_path = root.join(SETTINGS_FILE);

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| WardError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| WardError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to `<root>/.ward.json`
    pub fn save(&self, root: &Path) -> Result<(), WardError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| WardError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(root.join(SETTINGS_FILE), contents)
            .map_err(|e| WardError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Apply `WARD_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RECIPIENTS) {
            let recipients = parse_recipients(&raw);
            if !recipients.is_empty() {
                self.recipients = recipients;
            }
        }

        if let Some(key) = lookup(ENV_SIGNING_KEY) {
            let key = key.trim();
            if !key.is_empty() {
                self.signing_key = Some(key.to_string());
            }
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Recipients to encrypt for
    ///
    /// Falls back to the signing key alone when no recipients are listed.
    pub fn effective_recipients(&self) -> Vec<String> {
        if !self.recipients.is_empty() {
            return self.recipients.clone();
        }
        self.signing_key.iter().cloned().collect()
    }
}

/// Split a comma-separated recipient list, dropping blanks
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}
