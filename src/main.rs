use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ward::cli::{handle_archive_command, handle_decrypt, handle_doctor, handle_encrypt, ArchiveCommands};
use ward::config::{ExclusionSet, Settings, WardPaths};
use ward::process::SystemRunner;
use ward::WardError;

#[derive(Parser)]
#[command(
    name = "ward",
    version,
    about = "Encrypt-at-rest version control for a directory of private files",
    long_about = "ward packs a private directory with tar, seals it with gpg into a \
                  timestamp-named .tar.gpg archive and stages it for git, so only \
                  ciphertext is ever committed. Archives can be listed, verified \
                  and restored by index, name or commit hash."
)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, env = "WARD_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Archive(ArchiveCommands),

    /// Encrypt a single file to <FILE>.gpg
    Encrypt {
        file: PathBuf,
    },

    /// Decrypt a <FILE>.gpg next to itself
    Decrypt {
        file: PathBuf,
    },

    /// Validate tools, directories and keys
    Doctor,

    /// Show current configuration and paths
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<WardError>() {
            Some(e) if e.is_advisory() => {
                println!("{}", e);
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = WardPaths::resolve_root(cli.root)?;

    // .env never overrides variables already set in the environment
    let dotenv = root.join(ward::config::paths::DOTENV_FILE);
    let dotenv_loaded = match dotenvy::from_path(&dotenv) {
        Ok(()) => true,
        Err(e) if e.not_found() => false,
        Err(e) => return Err(e).with_context(|| format!("Failed to load {}", dotenv.display())),
    };

    init_logging(cli.verbose);
    tracing::debug!(root = %root.display(), dotenv_loaded, "starting");

    let mut settings = Settings::load_or_default(&root)?;
    settings.apply_process_env();
    let paths = WardPaths::from_settings(root, &settings);
    let runner = SystemRunner;

    match cli.command {
        Some(Commands::Archive(cmd)) => {
            handle_archive_command(&runner, &paths, &settings, cmd)?;
        }
        Some(Commands::Encrypt { file }) => {
            handle_encrypt(&runner, &settings, &file)?;
        }
        Some(Commands::Decrypt { file }) => {
            handle_decrypt(&runner, &settings, &file)?;
        }
        Some(Commands::Doctor) => {
            handle_doctor(&runner, &paths, &settings)?;
        }
        Some(Commands::Config) => {
            let exclusions = ExclusionSet::load(&paths.exclusion_file())?;
            let recipients = settings.effective_recipients();

            println!("ward Configuration");
            println!("==================");
            println!("Root:              {}", paths.root().display());
            println!("Private directory: {}", paths.private_dir().display());
            println!("Archive directory: {}", paths.archive_dir().display());
            println!(
                "Exclusion file:    {} ({} pattern(s))",
                paths.exclusion_file().display(),
                exclusions.len()
            );
            println!(
                "Settings file:     {}{}",
                paths.settings_file().display(),
                if paths.settings_file().exists() { "" } else { " (defaults)" }
            );
            println!(
                "Dotenv file:       {}{}",
                paths.dotenv_file().display(),
                if dotenv_loaded { "" } else { " (not found)" }
            );
            println!();
            println!("Settings:");
            println!(
                "  Recipients:      {}",
                if recipients.is_empty() {
                    "(none)".to_string()
                } else {
                    recipients.join(", ")
                }
            );
            println!(
                "  Signing key:     {}",
                settings.signing_key.as_deref().unwrap_or("(none)")
            );
            println!("  Sign archives:   {}", settings.sign_archives);
            println!("  Auto stage:      {}", settings.auto_stage);
            println!(
                "  Programs:        gpg={} tar={} git={}",
                settings.programs.gpg, settings.programs.tar, settings.programs.git
            );
        }
        None => {
            println!("ward - encrypt-at-rest version control for private files");
            println!();
            println!("Run 'ward --help' for usage information.");
            println!("Run 'ward init' to set up the current directory.");
        }
    }

    Ok(())
}

/// Log to stderr, filtered by WARD_LOG, then RUST_LOG, then `-v`
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_env("WARD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
