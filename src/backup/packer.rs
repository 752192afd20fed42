//! tar driver
//!
//! Packs a whole directory into one uncompressed tar file, lists a tar's
//! table of contents, and extracts one into a directory.

use std::path::Path;

use tracing::debug;

use crate::config::ExclusionSet;
use crate::error::{WardError, WardResult};
use crate::process::{Invocation, ProcessRunner};

/// Name of the transient exclude file written next to the tar being built
const EXCLUDE_FILE: &str = "exclude.lst";

pub struct Packer<'a> {
    runner: &'a dyn ProcessRunner,
    program: String,
}

impl<'a> Packer<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn run(&self, invocation: Invocation) -> WardResult<Vec<u8>> {
        let output = self.runner.run(&invocation)?;
        if !output.success() {
            return Err(WardError::process("tar", output.diagnostics()));
        }
        Ok(output.stdout)
    }

    /// Pack everything under `source` into `tar_file`
    ///
    /// Exclusion patterns are handed to tar through a file in `scratch`,
    /// which is removed again before returning.
    pub fn pack(
        &self,
        source: &Path,
        tar_file: &Path,
        exclusions: &ExclusionSet,
        scratch: &Path,
    ) -> WardResult<()> {
        if tar_file.exists() {
            return Err(WardError::DestinationExists(tar_file.to_path_buf()));
        }

        let mut invocation = Invocation::new(&self.program).arg("-cf").path_arg(tar_file);

        let exclude_file = scratch.join(EXCLUDE_FILE);
        if !exclusions.is_empty() {
            exclusions.write_to(&exclude_file)?;
            invocation = invocation.arg(format!("--exclude-from={}", exclude_file.display()));
        }

        let invocation = invocation.arg("-C").path_arg(source).arg(".");
        let result = self.run(invocation);

        if exclude_file.exists() {
            if let Err(e) = std::fs::remove_file(&exclude_file) {
                debug!(path = %exclude_file.display(), error = %e, "could not remove exclude file");
            }
        }

        result?;
        debug!(
            source = %source.display(),
            tar = %tar_file.display(),
            exclusions = exclusions.len(),
            "packed"
        );
        Ok(())
    }

    /// Member paths in `tar_file`, without extracting anything
    pub fn list(&self, tar_file: &Path) -> WardResult<Vec<String>> {
        let stdout = self.run(Invocation::new(&self.program).arg("-tf").path_arg(tar_file))?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Extract `tar_file` into the existing directory `dest`
    pub fn extract(&self, tar_file: &Path, dest: &Path) -> WardResult<()> {
        self.run(
            Invocation::new(&self.program)
                .arg("-xf")
                .path_arg(tar_file)
                .arg("-C")
                .path_arg(dest),
        )?;
        Ok(())
    }

    /// First line of `tar --version`
    pub fn version(&self) -> WardResult<String> {
        let stdout = self.run(Invocation::new(&self.program).arg("--version"))?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}
