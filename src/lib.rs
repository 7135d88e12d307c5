//! Bundle Patcher: idempotent text substitution for built web bundles
//!
//! Applies an ordered list of literal and regex rules to pre-built artifacts
//! such as minified JavaScript bundles, writing a file back only when its
//! content actually changed.
//!
//! # Architecture
//!
//! - [`rule`] compiles rules and performs the pure in-memory rewrite.
//! - [`patch`] reads one file, runs the rules and decides whether to write.
//! - [`edit`] is the write primitive: a verified, atomic whole-file rewrite.
//! - [`config`] loads TOML patch files and runs them over their targets.
//! - [`diff`] renders compact diffs of long minified lines.
//!
//! # Safety
//!
//! - Invalid patterns are rejected before any file is read
//! - Files are read and written as UTF-8, never lossily converted
//! - Atomic file writes (tempfile + fsync + rename)
//! - On-disk content is re-verified before the rename
//! - Unchanged files are never written
//!
//! # Example
//!
//! ```no_run
//! use bundle_patcher::{patch, Rule, RuleSet};
//!
//! let rules = RuleSet::compile(&[
//!     Rule::literal("label", "300mg KSM-66® per day", "Daily serving"),
//!     Rule::regex("dose", r"300\s?mg", "Daily serving"),
//! ])?;
//!
//! let outcome = patch("dist/assets/index.js", &rules)?;
//! println!("{}", outcome.status_line(false));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod diff;
pub mod edit;
pub mod patch;
pub mod rule;

// Re-exports
pub use config::{
    apply_config, load_from_path, load_from_str, ApplicationError, ConfigError, Mode,
    PatchConfig, RunReport,
};
pub use edit::{EditError, EditResult, FileEdit};
pub use patch::{check, patch, PatchError, PatchOutcome, PatchStatus};
pub use rule::{Rule, RuleError, RuleHit, RuleKind, RuleSet, Transform};
