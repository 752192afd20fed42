//! Recursive tree comparison for change detection

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ExclusionSet;
use crate::error::{WardError, WardResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Dir,
    File,
    Symlink(PathBuf),
}

/// Paths (relative to the compared roots) that differ between two trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Only in the current tree
    pub added: Vec<PathBuf>,
    /// Only in the snapshot
    pub removed: Vec<PathBuf>,
    /// In both, with different content or kind
    pub modified: Vec<PathBuf>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of differing paths
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Compare a `snapshot` tree against the `current` tree
///
/// Paths matched by `exclusions` are ignored on both sides. A missing
/// `current` directory is treated as empty.
pub fn compare_trees(snapshot: &Path, current: &Path, exclusions: &ExclusionSet) -> WardResult<TreeDiff> {
    let before = index_tree(snapshot, exclusions)?;
    let after = index_tree(current, exclusions)?;

    let mut diff = TreeDiff::default();

    for (path, kind) in &before {
        match after.get(path) {
            None => diff.removed.push(path.clone()),
            Some(other) if other != kind => diff.modified.push(path.clone()),
            Some(NodeKind::File) => {
                if !same_contents(&snapshot.join(path), &current.join(path))? {
                    diff.modified.push(path.clone());
                }
            }
            Some(_) => {}
        }
    }

    diff.added = after
        .keys()
        .filter(|path| !before.contains_key(*path))
        .cloned()
        .collect();

    Ok(diff)
}

fn index_tree(root: &Path, exclusions: &ExclusionSet) -> WardResult<BTreeMap<PathBuf, NodeKind>> {
    let mut nodes = BTreeMap::new();
    if !root.exists() {
        return Ok(nodes);
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|relative| !exclusions.is_excluded(relative))
                .unwrap_or(true)
        });

    for entry in walker {
        let entry = entry.map_err(|e| WardError::Io(format!("Failed to walk {}: {}", root.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| WardError::Io(e.to_string()))?
            .to_path_buf();

        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            NodeKind::Dir
        } else if file_type.is_symlink() {
            NodeKind::Symlink(fs::read_link(entry.path())?)
        } else {
            NodeKind::File
        };
        nodes.insert(relative, kind);
    }

    Ok(nodes)
}

fn same_contents(a: &Path, b: &Path) -> WardResult<bool> {
    let meta_a = fs::metadata(a)?;
    let meta_b = fs::metadata(b)?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}
