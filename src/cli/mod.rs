//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the archive engines.

pub mod archive;
pub mod doctor;
pub mod encrypt;

pub use archive::{handle_archive_command, ArchiveCommands};
pub use doctor::{handle_doctor, run_checks, Check};
pub use encrypt::{handle_decrypt, handle_encrypt};
