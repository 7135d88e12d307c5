//! Expansion of `[[targets]]` entries into concrete file paths.

use crate::config::schema::TargetDefinition;
use globset::Glob;
use log::{debug, trace};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub enum TargetError {
    Glob {
        pattern: String,
        source: globset::Error,
    },
    Walk {
        dir: PathBuf,
        source: walkdir::Error,
    },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::Glob { pattern, source } => {
                write!(f, "invalid target glob '{}': {}", pattern, source)
            }
            TargetError::Walk { dir, source } => {
                write!(f, "failed to list {}: {}", dir.display(), source)
            }
        }
    }
}

impl std::error::Error for TargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TargetError::Glob { source, .. } => Some(source),
            TargetError::Walk { source, .. } => Some(source),
        }
    }
}

/// Join `path` onto `root` unless it is already absolute.
pub fn resolve(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Expand targets in declaration order.
///
/// `dir` targets list files whose name matches the glob, sorted by path. A
/// directory that does not exist is returned as-is so the patcher reports it
/// as not found.
pub fn expand_targets(
    targets: &[TargetDefinition],
    root: &Path,
) -> Result<Vec<PathBuf>, TargetError> {
    let mut files = Vec::new();

    for target in targets {
        if let Some(path) = &target.path {
            files.push(resolve(root, path));
            continue;
        }

        let Some(dir) = &target.dir else {
            continue;
        };
        let dir = resolve(root, dir);
        if !dir.is_dir() {
            debug!("target directory {} does not exist", dir.display());
            files.push(dir);
            continue;
        }

        let pattern = target.glob_pattern();
        let matcher = Glob::new(pattern)
            .map_err(|source| TargetError::Glob {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        let max_depth = if target.recursive { usize::MAX } else { 1 };
        let mut matched = Vec::new();
        for entry in WalkDir::new(&dir).max_depth(max_depth) {
            let entry = entry.map_err(|source| TargetError::Walk {
                dir: dir.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if matcher.is_match(entry.file_name()) {
                trace!("{} matched {}", entry.path().display(), pattern);
                matched.push(entry.into_path());
            }
        }
        matched.sort();
        debug!(
            "{} files in {} matched {}",
            matched.len(),
            dir.display(),
            pattern
        );
        files.extend(matched);
    }

    Ok(dedup_paths(files))
}

/// Drop repeated paths, keeping first occurrences.
///
/// Existing files are compared by canonical path so that two spellings of the
/// same file are patched only once.
pub fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| {
            let key = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            seen.insert(key)
        })
        .collect()
}
