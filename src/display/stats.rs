//! Catalog statistics

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::format_size;
use crate::archive::ArchiveEntry;

/// How many of the newest entries `stats` lists
const RECENT_COUNT: usize = 5;

/// Totals over a catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogStats {
    pub count: usize,
    pub committed: usize,
    pub total_bytes: u64,
    pub average_bytes: u64,
    pub authors: BTreeSet<String>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// Names of the newest entries, newest first
    pub recent: Vec<String>,
}

impl CatalogStats {
    /// Compute statistics for entries in catalog order
    pub fn from_entries(entries: &[ArchiveEntry]) -> Self {
        let total_bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();
        let count = entries.len();

        Self {
            count,
            committed: entries.iter().filter(|e| e.is_committed()).count(),
            total_bytes,
            average_bytes: if count == 0 { 0 } else { total_bytes / count as u64 },
            authors: entries
                .iter()
                .filter_map(|e| e.provenance.as_ref().map(|p| p.author.clone()))
                .collect(),
            oldest: entries.iter().map(|e| e.created_at).min(),
            newest: entries.iter().map(|e| e.created_at).max(),
            recent: entries
                .iter()
                .take(RECENT_COUNT)
                .map(|e| e.name.clone())
                .collect(),
        }
    }
}

/// Format catalog statistics
pub fn format_stats(stats: &CatalogStats) -> String {
    if stats.count == 0 {
        return "No archives found.".to_string();
    }

    let mut output = String::new();
    output.push_str("Archive Statistics\n");
    output.push_str("==================\n");
    output.push_str(&format!(
        "Archives:     {} ({} committed, {} uncommitted)\n",
        stats.count,
        stats.committed,
        stats.count - stats.committed
    ));
    output.push_str(&format!("Total size:   {}\n", format_size(stats.total_bytes)));
    output.push_str(&format!("Average size: {}\n", format_size(stats.average_bytes)));

    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        output.push_str(&format!(
            "Date range:   {} to {}\n",
            oldest.format("%Y-%m-%d %H:%M:%S"),
            newest.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    if !stats.authors.is_empty() {
        output.push_str(&format!("Authors ({}):\n", stats.authors.len()));
        for author in &stats.authors {
            output.push_str(&format!("  {}\n", author));
        }
    }

    output.push_str("Most recent:\n");
    for name in &stats.recent {
        output.push_str(&format!("  {}\n", name));
    }

    output
}
