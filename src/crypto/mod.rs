//! Cryptographic transport for ward
//!
//! Encryption is delegated to gpg; this module only builds the command lines,
//! enforces the recipient and overwrite rules, and reports gpg's diagnostics.

pub mod gpg;

pub use gpg::{plain_path_for, sealed_path_for, GpgTransport, SigningOptions, GPG_SUFFIX};
