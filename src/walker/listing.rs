//! Deterministic directory listing
//!
//! Children are ordered directories first, then by case-insensitive name,
//! so that runs are reproducible whatever order the file system reports.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl Child {
    /// File name as text (lossy)
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// List the immediate children of `dir` in walk order
///
/// Symlinks are followed when deciding whether a child is a directory.
pub fn list_sorted(dir: &Path) -> io::Result<Vec<Child>> {
    let mut children = fs::read_dir(dir)?
        .map(|entry| -> io::Result<Child> {
            let path = entry?.path();
            let is_dir = path.is_dir();
            Ok(Child { path, is_dir })
        })
        .collect::<io::Result<Vec<_>>>()?;

    children.sort_by(compare_children);
    Ok(children)
}

/// Directories before files, then case-insensitive name order
///
/// Names equal apart from case fall back to a byte-wise comparison to keep
/// the order total.
pub fn compare_children(a: &Child, b: &Child) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| compare_names(&a.name(), &b.name()))
}

fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}
