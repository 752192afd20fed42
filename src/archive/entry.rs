//! Archive catalog entries

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::name;
use crate::error::WardResult;

/// Version-control metadata for the commit that recorded a sealed blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Full commit hash
    pub commit_hash: String,
    /// `Name <email>`
    pub author: String,
    /// Commit subject line
    pub message: String,
    /// Commit time
    pub committed_at: DateTime<Utc>,
}

impl Provenance {
    /// Abbreviated hash for display
    pub fn short_hash(&self) -> &str {
        let end = self.commit_hash.len().min(7);
        &self.commit_hash[..end]
    }
}

/// One sealed snapshot of the private tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// File name, e.g. `2024-12-01_23-37-27-060.tar.gpg`
    pub name: String,
    /// Seconds since the epoch, decoded from `name`
    pub timestamp: i64,
    /// Full-precision instant decoded from `name`
    pub created_at: DateTime<Utc>,
    /// Size of the sealed blob
    pub size_bytes: u64,
    /// Absolute path of the blob in the storage directory
    pub path: PathBuf,
    /// Path of the blob relative to the repository root, as git names it
    pub repo_path: String,
    /// Present only once version control has recorded this blob
    pub provenance: Option<Provenance>,
}

impl ArchiveEntry {
    /// Build an entry, decoding the timestamp from `name`
    pub fn new(
        name: impl Into<String>,
        size_bytes: u64,
        path: PathBuf,
        repo_path: impl Into<String>,
        provenance: Option<Provenance>,
    ) -> WardResult<Self> {
        let name = name.into();
        let created_at = name::decode(&name)?;
        Ok(Self {
            timestamp: created_at.timestamp(),
            created_at,
            name,
            size_bytes,
            path,
            repo_path: repo_path.into(),
            provenance,
        })
    }

    pub fn is_committed(&self) -> bool {
        self.provenance.is_some()
    }

    /// Full commit hash, if committed
    pub fn commit_hash(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.commit_hash.as_str())
    }

    /// Name without the sealed suffix
    pub fn stem(&self) -> &str {
        self.name
            .strip_suffix(name::SEALED_SUFFIX)
            .unwrap_or(&self.name)
    }
}

/// Catalog order: newest first
///
/// Compares the full-precision instant, so whole-second order is preserved.
/// Equal instants fall back to name (descending) and then commit hash, which
/// keeps the order identical across repeated scans.
pub fn catalog_order(a: &ArchiveEntry, b: &ArchiveEntry) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.name.cmp(&a.name))
        .then_with(|| a.commit_hash().cmp(&b.commit_hash()))
}

/// Sort entries into catalog order
pub fn sort_catalog(entries: &mut [ArchiveEntry]) {
    entries.sort_by(catalog_order);
}
