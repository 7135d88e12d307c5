//! The bundle patcher: read a file, run a [`RuleSet`] over it in memory and
//! write it back only when the content changed.

use crate::edit::{EditError, EditResult, FileEdit};
use crate::rule::{RuleHit, RuleSet};
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-file outcome of a patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// Target path does not exist; nothing was created
    NotFound,
    /// No rule changed the content; nothing was written
    Unchanged,
    /// Content changed (and was written, unless this is a check)
    Changed,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStatus::NotFound => write!(f, "not found"),
            PatchStatus::Unchanged => write!(f, "unchanged"),
            PatchStatus::Changed => write!(f, "changed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    /// The file was left untouched
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: EditError,
    },
}

impl PatchError {
    pub fn path(&self) -> &Path {
        match self {
            PatchError::Read { path, .. } | PatchError::Write { path, .. } => path,
        }
    }
}

/// Everything known about one file after a patch or check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for its status"]
pub struct PatchOutcome {
    pub file: PathBuf,
    pub status: PatchStatus,
    pub hits: Vec<RuleHit>,
    /// Re-running the rules on the patched content changes nothing
    pub idempotent: bool,
    before: String,
    after: String,
}

impl PatchOutcome {
    fn not_found(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            status: PatchStatus::NotFound,
            hits: Vec::new(),
            idempotent: true,
            before: String::new(),
            after: String::new(),
        }
    }

    /// Original and patched content, when the content changed.
    pub fn contents(&self) -> Option<(&str, &str)> {
        match self.status {
            PatchStatus::Changed => Some((&self.before, &self.after)),
            _ => None,
        }
    }

    /// Human-readable status line for this file.
    pub fn status_line(&self, dry_run: bool) -> String {
        match (self.status, dry_run) {
            (PatchStatus::NotFound, _) => format!("File not found: {}", self.file.display()),
            (PatchStatus::Unchanged, _) => {
                format!("No changes made to {}", self.file.display())
            }
            (PatchStatus::Changed, false) => {
                format!("Successfully patched {}", self.file.display())
            }
            (PatchStatus::Changed, true) => format!("Would patch {}", self.file.display()),
        }
    }
}

/// Patch `path` in place with `rules`.
///
/// A missing file is reported as [`PatchStatus::NotFound`], not as an error.
/// At most one write happens, and only when the content actually differs.
pub fn patch(path: impl AsRef<Path>, rules: &RuleSet) -> Result<PatchOutcome, PatchError> {
    run(path.as_ref(), rules, true)
}

/// Compute what [`patch`] would do without writing anything.
pub fn check(path: impl AsRef<Path>, rules: &RuleSet) -> Result<PatchOutcome, PatchError> {
    run(path.as_ref(), rules, false)
}

fn run(path: &Path, rules: &RuleSet, write: bool) -> Result<PatchOutcome, PatchError> {
    let original = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if matches!(
            e.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
        ) =>
        {
            debug!("{} does not exist", path.display());
            return Ok(PatchOutcome::not_found(path));
        }
        Err(source) => {
            return Err(PatchError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let transform = rules.transform(&original);
    for hit in &transform.hits {
        if hit.skipped {
            debug!("{}: rule '{}' skipped by guard", path.display(), hit.id);
        } else {
            debug!(
                "{}: rule '{}' made {} replacements",
                path.display(),
                hit.id,
                hit.replacements
            );
        }
    }

    let idempotent = rules.is_fixed_point(&transform.content);
    if !idempotent {
        warn!(
            "{}: rules are not idempotent; a second run would change the file again",
            path.display()
        );
    }

    let edit = FileEdit::new(path, original, transform.content);
    let status = if edit.is_noop() {
        PatchStatus::Unchanged
    } else {
        PatchStatus::Changed
    };

    if write && status == PatchStatus::Changed {
        let result = edit.apply().map_err(|source| PatchError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        if let EditResult::AlreadyApplied { .. } = result {
            debug!("{} already held the patched content", path.display());
        }
        info!(
            "patched {} ({} replacements)",
            path.display(),
            transform.hits.iter().map(|h| h.replacements).sum::<usize>()
        );
    }

    Ok(PatchOutcome {
        file: path.to_path_buf(),
        status,
        hits: transform.hits,
        idempotent,
        before: edit.expected_before,
        after: edit.new_text,
    })
}
