//! Config applicator - runs a patch config over its targets
//!
//! This module:
//! - Gates configs on their `requires` constraint
//! - Compiles the rule list once, before any file is read
//! - Expands targets and patches (or checks) each file exactly once
//! - Reports a per-file result without aborting the batch

use crate::config::schema::PatchConfig;
use crate::config::targets::{dedup_paths, expand_targets, resolve, TargetError};
use crate::config::version::{supports, VersionError, PATCHER_VERSION};
use crate::patch::{check, patch, PatchError, PatchOutcome};
use crate::rule::{RuleError, RuleSet};
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether files are rewritten or only inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Check,
}

pub type FileResult = (PathBuf, Result<PatchOutcome, PatchError>);

/// Result of running one config
#[derive(Debug)]
#[must_use = "RunReport should be checked for per-file failures"]
pub enum RunReport {
    /// Config's version constraint excludes this build
    SkippedVersion { reason: String },
    /// One entry per target file, in target order
    Files(Vec<FileResult>),
}

impl RunReport {
    pub fn files(&self) -> &[FileResult] {
        match self {
            RunReport::SkippedVersion { .. } => &[],
            RunReport::Files(files) => files,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.files().iter().any(|(_, result)| result.is_err())
    }
}

/// Errors that stop a config before any file is touched
#[derive(Debug)]
pub enum ApplicationError {
    Version(VersionError),
    Rules(RuleError),
    Targets(TargetError),
    /// The config has no `[[targets]]` and the caller gave no paths
    NoTargets,
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
            ApplicationError::Rules(e) => write!(f, "rule error: {}", e),
            ApplicationError::Targets(e) => write!(f, "target error: {}", e),
            ApplicationError::NoTargets => {
                write!(f, "no targets configured and no paths given")
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Version(e) => Some(e),
            ApplicationError::Rules(e) => Some(e),
            ApplicationError::Targets(e) => Some(e),
            ApplicationError::NoTargets => None,
        }
    }
}

impl From<VersionError> for ApplicationError {
    fn from(e: VersionError) -> Self {
        ApplicationError::Version(e)
    }
}

impl From<RuleError> for ApplicationError {
    fn from(e: RuleError) -> Self {
        ApplicationError::Rules(e)
    }
}

impl From<TargetError> for ApplicationError {
    fn from(e: TargetError) -> Self {
        ApplicationError::Targets(e)
    }
}

/// Run a patch config.
///
/// # Arguments
///
/// * `config` - The patch config to run
/// * `root` - Base directory for relative target paths
/// * `paths` - When given, replaces the config's own targets
/// * `mode` - Rewrite files or only check them
pub fn apply_config(
    config: &PatchConfig,
    root: &Path,
    paths: Option<&[PathBuf]>,
    mode: Mode,
) -> Result<RunReport, ApplicationError> {
    if !supports(config.meta.requires.as_deref())? {
        let req = config.meta.requires.as_deref().unwrap_or("").trim();
        return Ok(RunReport::SkippedVersion {
            reason: format!("bundle-patcher {PATCHER_VERSION} does not satisfy requires {req}"),
        });
    }

    let rules = config.compile_rules()?;

    let files = match paths {
        Some(paths) if !paths.is_empty() => {
            dedup_paths(paths.iter().map(|p| resolve(root, p)).collect())
        }
        _ if config.targets.is_empty() => return Err(ApplicationError::NoTargets),
        _ => expand_targets(&config.targets, root)?,
    };
    if files.is_empty() {
        warn!(
            "targets of '{}' matched no files under {}",
            config.display_name(),
            root.display()
        );
        return Ok(RunReport::Files(Vec::new()));
    }

    info!(
        "running {} rules from '{}' over {} files",
        rules.len(),
        config.display_name(),
        files.len()
    );
    Ok(RunReport::Files(run_rules(&rules, &files, mode)))
}

/// Patch or check each file in order. One file's failure never stops the rest.
pub fn run_rules(rules: &RuleSet, files: &[PathBuf], mode: Mode) -> Vec<FileResult> {
    files
        .iter()
        .map(|file| {
            let result = match mode {
                Mode::Apply => patch(file, rules),
                Mode::Check => check(file, rules),
            };
            (file.clone(), result)
        })
        .collect()
}
