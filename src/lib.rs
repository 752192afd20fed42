//! ward - encrypt-at-rest version control for a directory of private files
//!
//! A plaintext private directory is packed with tar, sealed with gpg into a
//! timestamp-named `.tar.gpg` blob, and committed to git. Only the sealed
//! blobs are ever versioned; the catalog of blobs plus their commit history
//! forms an append-only log that can be listed, verified and restored.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path layout, settings and exclusion patterns
//! - `error`: Custom error types
//! - `process`: The external-process seam (`ProcessRunner`)
//! - `archive`: Filename codec, catalog entries and the registry
//! - `vcs`: The git collaborator
//! - `crypto`: The gpg transport
//! - `backup`: Archive creation, change detection, restore and verify
//! - `display`: Terminal formatting
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use ward::archive::{select, ArchiveRegistry};
//! use ward::config::{Settings, WardPaths};
//! use ward::process::SystemRunner;
//! use ward::vcs::GitClient;
//!
//! let paths = WardPaths::with_root(".");
//! let settings = Settings::load_or_default(paths.root())?;
//! let git = GitClient::new(&SystemRunner, &settings.programs.git, paths.root());
//! let registry = ArchiveRegistry::new(paths, git);
//!
//! let entries = registry.list()?;
//! let latest = select(&entries, None)?;
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod process;
pub mod vcs;

pub use error::{WardError, WardResult};
