//! Custom error types for ward
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for ward operations
#[derive(Error, Debug)]
pub enum WardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A file name that encodes no recognizable timestamp
    #[error("Invalid archive name: {0}")]
    InvalidArchiveName(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Committed entries were requested but none exist
    #[error("No committed archives found")]
    NoCommittedArchives,

    /// The private tree matches the latest archive
    #[error("No changes detected since {latest}")]
    NoChangesDetected { latest: String },

    /// Sealing was requested with an empty recipient list
    #[error("No GPG recipients configured (set WARD_GPG_RECIPIENTS or WARD_GPG_KEY)")]
    NoRecipientsConfigured,

    /// A recipient identity has no public key in the keyring
    #[error("Unknown GPG recipient: {0}")]
    UnknownRecipient(String),

    /// gpg exited non-zero
    #[error("gpg failed: {0}")]
    CryptoTransportFailure(String),

    /// A freshly generated archive name is already taken
    #[error("Archive name collision: {0}")]
    NameCollision(String),

    /// Restore did not complete; the private tree was left untouched
    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    /// One or more archives failed verification
    #[error("{failed} of {total} archive(s) failed verification")]
    VerificationFailed { failed: usize, total: usize },

    /// Refusing to overwrite an existing file
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// An external tool (tar, git) exited non-zero
    #[error("{tool} failed: {message}")]
    Process { tool: String, message: String },

    /// An external tool could not be started at all
    #[error("Could not run '{program}': {message}")]
    ToolUnavailable { program: String, message: String },
}

impl WardError {
    /// Create a "not found" error for archives
    pub fn archive_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Archive",
            identifier: identifier.into(),
        }
    }

    /// Create a process failure for the named tool
    pub fn process(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Advisory outcomes mean "nothing to do" rather than "something broke"
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            Self::NoChangesDetected { .. } | Self::NoCommittedArchives
        )
    }
}

impl From<std::io::Error> for WardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for ward operations
pub type WardResult<T> = Result<T, WardError>;
