//! Archive display formatting
//!
//! Formats catalog entries for terminal output in table and detail views.

use chrono::Utc;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{format_duration, format_size};
use crate::archive::ArchiveEntry;
use crate::backup::VerifyReport;

#[derive(Tabled)]
struct CatalogRow {
    /// Selection index among committed entries
    #[tabled(rename = "#")]
    index: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct VerifyRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Format the catalog as a table
///
/// Committed entries are numbered with the index `restore` and `verify`
/// accept; uncommitted ones show `-`.
pub fn format_archive_list(entries: &[ArchiveEntry]) -> String {
    if entries.is_empty() {
        return "No archives found.".to_string();
    }

    let now = Utc::now();
    let mut committed_index = 0;
    let rows: Vec<CatalogRow> = entries
        .iter()
        .map(|entry| {
            let index = if entry.is_committed() {
                committed_index += 1;
                (committed_index - 1).to_string()
            } else {
                "-".to_string()
            };
            let (commit, author, message) = match &entry.provenance {
                Some(p) => (
                    p.short_hash().to_string(),
                    p.author.clone(),
                    truncate(&p.message, 40),
                ),
                None => ("(uncommitted)".to_string(), String::new(), String::new()),
            };
            CatalogRow {
                index,
                name: entry.name.clone(),
                age: format_duration(now.signed_duration_since(entry.created_at)),
                size: format_size(entry.size_bytes),
                commit,
                author,
                message,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::psql());

    let committed = entries.iter().filter(|e| e.is_committed()).count();
    format!(
        "{}\n\nTotal: {} archive(s), {} committed",
        table,
        entries.len(),
        committed
    )
}

/// Format a single entry's details
pub fn format_archive_details(entry: &ArchiveEntry) -> String {
    let mut output = String::new();

    output.push_str(&format!("Archive: {}\n", entry.name));
    output.push_str(&format!(
        "  Created:   {}\n",
        entry.created_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    ));
    output.push_str(&format!("  Timestamp: {}\n", entry.timestamp));
    output.push_str(&format!(
        "  Size:      {} ({} bytes)\n",
        format_size(entry.size_bytes),
        entry.size_bytes
    ));
    output.push_str(&format!("  Path:      {}\n", entry.repo_path));
    output.push_str(&format!(
        "  On disk:   {}\n",
        if entry.path.is_file() { "Yes" } else { "No" }
    ));

    match &entry.provenance {
        Some(p) => {
            output.push_str(&format!("  Commit:    {}\n", p.commit_hash));
            output.push_str(&format!("  Author:    {}\n", p.author));
            output.push_str(&format!(
                "  Committed: {}\n",
                p.committed_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            output.push_str(&format!("  Message:   {}\n", p.message));
        }
        None => output.push_str("  Commit:    (uncommitted)\n"),
    }

    output
}

/// Format verification results, one row per entry, plus a verdict
pub fn format_verify_report(report: &VerifyReport) -> String {
    if report.results.is_empty() {
        return "No archives to verify.".to_string();
    }

    let rows: Vec<VerifyRow> = report
        .results
        .iter()
        .map(|r| VerifyRow {
            name: r.name.clone(),
            commit: r.commit.clone().unwrap_or_else(|| "-".to_string()),
            status: if r.valid { "OK" } else { "INVALID" }.to_string(),
            detail: match &r.reason {
                Some(reason) => truncate(reason, 60),
                None => format!("{} member(s)", r.members),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::psql());

    let verdict = if report.all_valid() {
        format!("All {} archive(s) verified.", report.results.len())
    } else {
        format!(
            "{} of {} archive(s) failed verification.",
            report.invalid_count(),
            report.results.len()
        )
    };

    format!("{}\n\n{}", table, verdict)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
