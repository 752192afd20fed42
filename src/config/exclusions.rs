//! Exclusion patterns for packing the private tree
//!
//! Patterns are read from the exclusion file (`.encignore` by default): one
//! glob per line, blank lines and `#` comments ignored. Patterns are
//! normalized once (leading `./` and trailing `/` dropped) and the normalized
//! strings are both compiled for change detection and handed to tar as an
//! `--exclude-from` file, so the two always agree on what is excluded.

use std::path::{Component, Path};

use glob::Pattern;

use crate::error::{WardError, WardResult};

/// Ordered list of exclusion globs
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    compiled: Vec<Pattern>,
}

impl ExclusionSet {
    /// An empty set that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse patterns from the text of an exclusion file
    pub fn parse(text: &str) -> WardResult<Self> {
        let patterns: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();

        Self::from_patterns(patterns)
    }

    /// Build a set from already-split patterns
    ///
    /// Patterns that normalize to nothing (`./`, `/`) are dropped.
    pub fn from_patterns(raw: Vec<String>) -> WardResult<Self> {
        let mut patterns = Vec::with_capacity(raw.len());
        let mut compiled = Vec::with_capacity(raw.len());

        for pattern in raw {
            let normalized = normalize(&pattern);
            if normalized.is_empty() {
                continue;
            }
            let glob = Pattern::new(&normalized).map_err(|e| {
                WardError::Config(format!("Invalid exclusion pattern '{}': {}", pattern, e))
            })?;
            patterns.push(normalized);
            compiled.push(glob);
        }

        Ok(Self { patterns, compiled })
    }

    /// Load the exclusion file, or an empty set if it doesn't exist
    pub fn load(path: &Path) -> WardResult<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            WardError::Io(format!("Failed to read exclusion file {}: {}", path.display(), e))
        })?;

        Self::parse(&text)
    }

    /// The normalized patterns in file order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether a path relative to the private tree is excluded
    ///
    /// Mirrors tar's unanchored matching: a pattern may match any run of
    /// consecutive path components, and excluding a directory excludes
    /// everything below it.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.compiled.is_empty() {
            return false;
        }

        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        for end in 0..components.len() {
            for start in 0..=end {
                let candidate = components[start..=end].join("/");
                if self.compiled.iter().any(|p| p.matches(&candidate)) {
                    return true;
                }
            }
        }

        false
    }

    /// Write the normalized patterns to `path` in the format tar's
    /// `--exclude-from` reads
    pub fn write_to(&self, path: &Path) -> WardResult<()> {
        let mut contents = self.patterns.join("\n");
        contents.push('\n');
        std::fs::write(path, contents).map_err(|e| {
            WardError::Io(format!("Failed to write exclude file {}: {}", path.display(), e))
        })
    }
}

/// Strip the forms tar would otherwise match differently: any number of
/// leading `./` and trailing `/`
fn normalize(pattern: &str) -> String {
    let mut rest = pattern.trim();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.trim_end_matches('/').to_string()
}
