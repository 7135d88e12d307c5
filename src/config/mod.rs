pub mod applicator;
pub mod loader;
pub mod schema;
pub mod targets;
pub mod version;

pub use applicator::{apply_config, run_rules, ApplicationError, FileResult, Mode, RunReport};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    Metadata, PatchConfig, RuleDefinition, RuleMatcher, TargetDefinition, ValidationError,
    ValidationIssue,
};
pub use targets::{expand_targets, TargetError};
pub use version::{matches_requirement, VersionError, PATCHER_VERSION};
