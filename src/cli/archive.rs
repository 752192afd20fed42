//! Archive CLI commands
//!
//! Implements the catalog, create, restore, pull, verify and cleanup commands.

use clap::Subcommand;

use crate::archive::{select, ArchiveRegistry};
use crate::backup::{ArchiveManager, RestoreManager};
use crate::config::{Settings, WardPaths};
use crate::display::{
    format_archive_details, format_archive_list, format_stats, format_verify_report, CatalogStats,
};
use crate::error::{WardError, WardResult};
use crate::process::ProcessRunner;
use crate::vcs::GitClient;

/// Archive subcommands
#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List archives, newest first
    #[command(alias = "ls")]
    List {
        /// Scan version-control history instead of the storage directory
        #[arg(long)]
        history: bool,

        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show details for one archive
    Show {
        /// Committed index, archive name or commit hash prefix
        target: String,

        #[arg(long)]
        history: bool,
    },

    /// Show catalog statistics
    Stats {
        #[arg(long)]
        history: bool,
    },

    /// Check that archives decrypt to readable tars
    Verify {
        /// Committed index, archive name or commit hash prefix (default: all)
        target: Option<String>,

        /// Only the newest N archives
        #[arg(long, value_name = "N", conflicts_with = "target")]
        latest: Option<usize>,

        #[arg(long)]
        history: bool,
    },

    /// Replace the private directory with an archive's contents
    Restore {
        /// Committed index, archive name or commit hash prefix
        /// (default: newest committed archive)
        target: Option<String>,

        #[arg(long)]
        history: bool,
    },

    /// Pull upstream commits and restore the newest committed archive
    Pull,

    /// Archive the private directory if it changed
    Create {
        /// Archive even if nothing changed
        #[arg(short, long)]
        force: bool,
    },

    /// Delete uncommitted archives, keeping the newest
    Cleanup {
        /// Only print what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Create the private and storage directories and a first archive
    Init,
}

/// Handle an archive command
pub fn handle_archive_command(
    runner: &dyn ProcessRunner,
    paths: &WardPaths,
    settings: &Settings,
    cmd: ArchiveCommands,
) -> WardResult<()> {
    let registry = ArchiveRegistry::new(
        paths.clone(),
        GitClient::new(runner, &settings.programs.git, paths.root()),
    );

    match cmd {
        ArchiveCommands::List { history, json } => {
            let entries = registry.catalog(history)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", format_archive_list(&entries));
            }
        }

        ArchiveCommands::Show { target, history } => {
            let entries = registry.catalog(history)?;
            let entry = select(&entries, Some(target.as_str()))?;
            print!("{}", format_archive_details(entry));
        }

        ArchiveCommands::Stats { history } => {
            let entries = registry.catalog(history)?;
            println!("{}", format_stats(&CatalogStats::from_entries(&entries)));
        }

        ArchiveCommands::Verify {
            target,
            latest,
            history,
        } => {
            let restorer = RestoreManager::new(runner, paths.clone(), settings.clone());
            let report = restorer.verify_target(target.as_deref(), latest, history)?;
            println!("{}", format_verify_report(&report));

            if !report.all_valid() {
                return Err(WardError::VerificationFailed {
                    failed: report.invalid_count(),
                    total: report.results.len(),
                });
            }
        }

        ArchiveCommands::Restore { target, history } => {
            let restorer = RestoreManager::new(runner, paths.clone(), settings.clone());
            match restorer.restore_target(target.as_deref(), history)? {
                Some(result) => {
                    println!("{}", result.summary());
                    println!("Location: {}", paths.private_dir().display());
                }
                None => println!("Nothing to restore: no archives found."),
            }
        }

        ArchiveCommands::Pull => {
            let restorer = RestoreManager::new(runner, paths.clone(), settings.clone());
            let result = restorer.pull()?;
            match result.restored {
                Some(restored) => {
                    println!("{}", restored.summary());
                    println!("Location: {}", paths.private_dir().display());
                }
                None => println!("Pulled; nothing to restore: no archives found."),
            }
            if result.stashed {
                println!("Local changes were stashed and re-applied.");
            }
        }

        ArchiveCommands::Create { force } => {
            let manager = ArchiveManager::new(runner, paths.clone(), settings.clone());
            let entry = manager.pack_if_changed(force)?;
            println!("Archive created: {}", entry.name);
            if settings.auto_stage {
                println!("Staged {} for the next commit.", entry.repo_path);
            }
        }

        ArchiveCommands::Cleanup { dry_run } => {
            let manager = ArchiveManager::new(runner, paths.clone(), settings.clone());
            let removed = manager.cleanup_uncommitted(dry_run)?;

            if removed.is_empty() {
                println!("No uncommitted archives to clean up.");
                return Ok(());
            }

            let verb = if dry_run { "Would delete" } else { "Deleted" };
            for name in &removed {
                println!("{}: {}", verb, name);
            }
            println!();
            println!("{} {} uncommitted archive(s).", verb, removed.len());
        }

        ArchiveCommands::Init => {
            let manager = ArchiveManager::new(runner, paths.clone(), settings.clone());
            println!("Initializing ward at: {}", paths.root().display());
            match manager.init()? {
                Some(entry) => println!("Initial archive created: {}", entry.name),
                None => println!("Archives already present; nothing created."),
            }
            println!("Private directory: {}", paths.private_dir().display());
            println!("Archive directory: {}", paths.archive_dir().display());
        }
    }

    Ok(())
}
