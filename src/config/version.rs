//! Version gating for patch configs using semver constraints
//!
//! A config can declare `requires = ">=0.1, <0.3"` in its `[meta]` table.
//! Configs whose requirement does not match the running bundle-patcher are
//! skipped instead of applied.

use semver::{Version, VersionReq};
use std::fmt;

/// Version of this bundle-patcher build.
pub const PATCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors during version filtering
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use bundle_patcher::config::version::matches_requirement;
///
/// assert!(matches_requirement("0.1.0", Some(">=0.1")).unwrap());
/// assert!(!matches_requirement("0.1.0", Some(">=0.2, <0.3")).unwrap());
///
/// // None requirement means "any version"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let Some(req_str) = requirement else {
        return Ok(true);
    };

    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}

/// Check a config's `requires` field against this build.
pub fn supports(requirement: Option<&str>) -> Result<bool, VersionError> {
    matches_requirement(PATCHER_VERSION, requirement)
}
