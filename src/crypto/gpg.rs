//! gpg-backed sealing of single files
//!
//! Sealing encrypts a plaintext file to a set of recipients, optionally
//! signing it; unsealing decrypts it back. Trust validation is bypassed
//! (`--trust-model always`): the keyring is self-managed, not a web of
//! trust. Neither direction ever overwrites an existing file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{WardError, WardResult};
use crate::process::{Invocation, ProcessRunner};

/// Suffix appended to a sealed file
pub const GPG_SUFFIX: &str = ".gpg";

/// Identity options shared by seal and unseal
#[derive(Debug, Clone, Default)]
pub struct SigningOptions {
    /// Passed as `--local-user`
    pub key: Option<String>,
    /// Whether sealing also signs with `key`
    pub sign: bool,
}

impl SigningOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            key: settings.signing_key.clone(),
            sign: settings.sign_archives && settings.signing_key.is_some(),
        }
    }
}

/// Encrypts and decrypts files by driving gpg
pub struct GpgTransport<'a> {
    runner: &'a dyn ProcessRunner,
    program: String,
}

impl<'a> GpgTransport<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn gpg(&self) -> Invocation {
        Invocation::new(&self.program).arg("--batch")
    }

    /// Seal `plain` to `<plain>.gpg`
    pub fn seal(
        &self,
        plain: &Path,
        recipients: &[String],
        signing: &SigningOptions,
    ) -> WardResult<PathBuf> {
        let sealed = sealed_path_for(plain);
        self.seal_to(plain, &sealed, recipients, signing)?;
        Ok(sealed)
    }

    /// Seal `plain` into `sealed`
    ///
    /// Fails with `NoRecipientsConfigured` or `UnknownRecipient` before gpg
    /// is asked to encrypt anything, and with `DestinationExists` if
    /// `sealed` is already present.
    pub fn seal_to(
        &self,
        plain: &Path,
        sealed: &Path,
        recipients: &[String],
        signing: &SigningOptions,
    ) -> WardResult<()> {
        self.check_recipients(recipients)?;
        self.seal_checked(plain, sealed, recipients, signing)
    }

    /// `seal_to` for callers that already ran `check_recipients`
    pub(crate) fn seal_checked(
        &self,
        plain: &Path,
        sealed: &Path,
        recipients: &[String],
        signing: &SigningOptions,
    ) -> WardResult<()> {
        if sealed.exists() {
            return Err(WardError::DestinationExists(sealed.to_path_buf()));
        }

        let mut invocation = self.gpg().args(["--trust-model", "always"]);
        if let Some(key) = &signing.key {
            invocation = invocation.args(["--local-user", key.as_str()]);
            if signing.sign {
                invocation = invocation.arg("--sign");
            }
        }
        for recipient in recipients {
            invocation = invocation.args(["--recipient", recipient.as_str()]);
        }
        let invocation = invocation
            .arg("--output")
            .path_arg(sealed)
            .arg("--encrypt")
            .path_arg(plain);

        let output = self.runner.run(&invocation)?;
        if !output.success() {
            // gpg may leave a partial file behind
            remove_partial(sealed);
            return Err(WardError::CryptoTransportFailure(output.diagnostics()));
        }

        info!(
            plain = %plain.display(),
            sealed = %sealed.display(),
            recipients = recipients.len(),
            "sealed"
        );
        Ok(())
    }

    /// Unseal `sealed` to the same path without its `.gpg` suffix
    pub fn unseal(&self, sealed: &Path, signing: &SigningOptions) -> WardResult<PathBuf> {
        let plain = plain_path_for(sealed).ok_or_else(|| {
            WardError::Config(format!(
                "Expected a '{}' file: {}",
                GPG_SUFFIX,
                sealed.display()
            ))
        })?;
        self.unseal_to(sealed, &plain, signing)?;
        Ok(plain)
    }

    /// Unseal `sealed` into `plain`, refusing to overwrite an existing file
    pub fn unseal_to(&self, sealed: &Path, plain: &Path, signing: &SigningOptions) -> WardResult<()> {
        if plain.exists() {
            return Err(WardError::DestinationExists(plain.to_path_buf()));
        }

        let mut invocation = self.gpg();
        if let Some(key) = &signing.key {
            invocation = invocation.args(["--local-user", key.as_str()]);
        }
        let invocation = invocation
            .arg("--output")
            .path_arg(plain)
            .arg("--decrypt")
            .path_arg(sealed);

        let output = self.runner.run(&invocation)?;
        if !output.success() {
            remove_partial(plain);
            return Err(WardError::CryptoTransportFailure(output.diagnostics()));
        }

        debug!(sealed = %sealed.display(), plain = %plain.display(), "unsealed");
        Ok(())
    }

    /// Fail unless `recipients` is non-empty and every identity has a public key
    pub fn check_recipients(&self, recipients: &[String]) -> WardResult<()> {
        if recipients.is_empty() {
            return Err(WardError::NoRecipientsConfigured);
        }
        for recipient in recipients {
            if !self.has_public_key(recipient)? {
                return Err(WardError::UnknownRecipient(recipient.clone()));
            }
        }
        Ok(())
    }

    /// Whether `identity` resolves to a public key in the keyring
    pub fn has_public_key(&self, identity: &str) -> WardResult<bool> {
        let invocation = self
            .gpg()
            .args(["--list-keys", "--with-colons", identity]);
        Ok(self.runner.run(&invocation)?.success())
    }

    /// First line of `gpg --version`
    pub fn version(&self) -> WardResult<String> {
        let output = self.runner.run(&Invocation::new(&self.program).arg("--version"))?;
        if !output.success() {
            return Err(WardError::CryptoTransportFailure(output.diagnostics()));
        }
        Ok(output
            .stdout_str()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

/// `<path>.gpg`
pub fn sealed_path_for(plain: &Path) -> PathBuf {
    let mut name = plain.as_os_str().to_os_string();
    name.push(GPG_SUFFIX);
    PathBuf::from(name)
}

/// `<path>` without a trailing `.gpg`, if it has one
pub fn plain_path_for(sealed: &Path) -> Option<PathBuf> {
    let name = sealed.file_name()?.to_str()?;
    let stem = name.strip_suffix(GPG_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(sealed.with_file_name(stem))
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
}
