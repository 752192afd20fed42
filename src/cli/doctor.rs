//! Environment validation
//!
//! Checks that tar, gpg and git run, that the working directories exist and
//! that every configured recipient has a public key.

use crate::backup::Packer;
use crate::config::{Settings, WardPaths};
use crate::crypto::GpgTransport;
use crate::error::{WardError, WardResult};
use crate::process::ProcessRunner;
use crate::vcs::GitClient;

/// Result of one environment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Run every check; never stops at the first failure
pub fn run_checks(runner: &dyn ProcessRunner, paths: &WardPaths, settings: &Settings) -> Vec<Check> {
    let gpg = GpgTransport::new(runner, &settings.programs.gpg);
    let packer = Packer::new(runner, &settings.programs.tar);
    let git = GitClient::new(runner, &settings.programs.git, paths.root());

    let mut checks = vec![
        tool_check("tar", packer.version()),
        tool_check("gpg", gpg.version()),
        tool_check("git", git.version()),
    ];

    for (name, dir) in [
        ("private directory", paths.private_dir()),
        ("archive directory", paths.archive_dir()),
    ] {
        checks.push(if dir.is_dir() {
            Check::pass(name, dir.display().to_string())
        } else {
            Check::fail(name, format!("missing: {} (run 'ward init')", dir.display()))
        });
    }

    let recipients = settings.effective_recipients();
    if recipients.is_empty() {
        checks.push(Check::fail("recipients", WardError::NoRecipientsConfigured.to_string()));
    } else {
        checks.push(Check::pass("recipients", recipients.join(", ")));
        for recipient in &recipients {
            let name = format!("public key for {}", recipient);
            checks.push(match gpg.has_public_key(recipient) {
                Ok(true) => Check::pass(name, "found"),
                Ok(false) => Check::fail(name, "not in keyring"),
                Err(e) => Check::fail(name, e.to_string()),
            });
        }
    }

    checks
}

fn tool_check(name: &str, version: WardResult<String>) -> Check {
    match version {
        Ok(v) => Check::pass(name, v),
        Err(e) => Check::fail(name, e.to_string()),
    }
}

/// Print the checks and fail if any did
pub fn handle_doctor(runner: &dyn ProcessRunner, paths: &WardPaths, settings: &Settings) -> WardResult<()> {
    let checks = run_checks(runner, paths, settings);

    println!("Environment Check");
    println!("=================");
    for check in &checks {
        let mark = if check.passed { "ok  " } else { "FAIL" };
        println!("[{}] {}: {}", mark, check.name, check.detail);
    }

    let failed = checks.iter().filter(|c| !c.passed).count();
    println!();
    if failed == 0 {
        println!("All {} checks passed.", checks.len());
        Ok(())
    } else {
        Err(WardError::Config(format!(
            "{} of {} environment check(s) failed",
            failed,
            checks.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeToolchain;
    use tempfile::TempDir;

    #[test]
    fn test_all_checks_pass() {
        let temp = TempDir::new().unwrap();
        let paths = WardPaths::with_root(temp.path());
        paths.ensure_directories().unwrap();
        let fake = FakeToolchain::new(temp.path());
        let settings = Settings {
            recipients: vec!["me@example.com".into()],
            ..Settings::default()
        };

        let checks = run_checks(&fake, &paths, &settings);
        assert!(checks.iter().all(|c| c.passed), "{:?}", checks);
        assert!(handle_doctor(&fake, &paths, &settings).is_ok());
    }

    #[test]
    fn test_reports_every_failure() {
        let temp = TempDir::new().unwrap();
        let paths = WardPaths::with_root(temp.path());
        let fake = FakeToolchain::new(temp.path());
        let settings = Settings {
            recipients: vec!["stranger@example.com".into()],
            programs: crate::config::settings::ToolPrograms {
                tar: "no-such-tar".into(),
                ..Default::default()
            },
            ..Settings::default()
        };

        let checks = run_checks(&fake, &paths, &settings);
        let failed: Vec<_> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            failed,
            vec![
                "tar",
                "private directory",
                "archive directory",
                "public key for stranger@example.com"
            ]
        );
        assert!(handle_doctor(&fake, &paths, &settings).is_err());
    }
}
