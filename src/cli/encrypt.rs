//! Single-file encryption commands
//!
//! Seal one file to `<file>.gpg` for the configured recipients, or unseal a
//! `.gpg` file next to itself. Neither command overwrites an existing file.

use std::path::Path;

use crate::config::Settings;
use crate::crypto::{GpgTransport, SigningOptions};
use crate::error::{WardError, WardResult};
use crate::process::ProcessRunner;

/// Encrypt `file` to `<file>.gpg`
pub fn handle_encrypt(runner: &dyn ProcessRunner, settings: &Settings, file: &Path) -> WardResult<()> {
    require_file(file)?;
    let gpg = GpgTransport::new(runner, &settings.programs.gpg);
    let recipients = settings.effective_recipients();

    let sealed = gpg.seal(file, &recipients, &SigningOptions::from_settings(settings))?;
    println!("Encrypted: {}", sealed.display());
    println!("Recipients: {}", recipients.join(", "));
    Ok(())
}

/// Decrypt `<file>.gpg` to `<file>`
pub fn handle_decrypt(runner: &dyn ProcessRunner, settings: &Settings, file: &Path) -> WardResult<()> {
    require_file(file)?;
    let gpg = GpgTransport::new(runner, &settings.programs.gpg);

    let plain = gpg.unseal(file, &SigningOptions::from_settings(settings))?;
    println!("Decrypted: {}", plain.display());
    Ok(())
}

fn require_file(file: &Path) -> WardResult<()> {
    if !file.is_file() {
        return Err(WardError::NotFound {
            entity_type: "File",
            identifier: file.display().to_string(),
        });
    }
    Ok(())
}
