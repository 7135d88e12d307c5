use crate::rule::{Rule, RuleError, RuleKind, RuleSet};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub targets: Vec<TargetDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        if let Some(version) = &self.meta.version {
            if let Err(e) = semver::Version::parse(version.trim()) {
                issues.push(ValidationIssue::InvalidVersion {
                    field: "meta.version",
                    value: version.clone(),
                    message: e.to_string(),
                });
            }
        }

        if let Some(requires) = &self.meta.requires {
            if !requires.trim().is_empty() {
                if let Err(e) = semver::VersionReq::parse(requires.trim()) {
                    issues.push(ValidationIssue::InvalidVersion {
                        field: "meta.requires",
                        value: requires.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        for (idx, target) in self.targets.iter().enumerate() {
            match (&target.path, &target.dir) {
                (None, None) => issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "targets.path",
                }),
                (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidTarget {
                    index: idx,
                    message: "path and dir are mutually exclusive".to_string(),
                }),
                (Some(path), None) => {
                    if path.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: None,
                            field: "targets.path",
                        });
                    }
                    if target.glob.is_some() || target.recursive {
                        issues.push(ValidationIssue::InvalidTarget {
                            index: idx,
                            message: "glob and recursive only apply to dir targets".to_string(),
                        });
                    }
                }
                (None, Some(dir)) => {
                    if dir.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: None,
                            field: "targets.dir",
                        });
                    }
                    if let Err(e) = globset::Glob::new(target.glob_pattern()) {
                        issues.push(ValidationIssue::InvalidTarget {
                            index: idx,
                            message: format!("invalid glob: {e}"),
                        });
                    }
                }
            }
        }

        let mut seen_ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            } else if !seen_ids.insert(rule.id.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    rule_id: Some(rule.id.clone()),
                    message: "duplicate rule id".to_string(),
                });
            }

            match &rule.matcher {
                RuleMatcher::Literal { find } => {
                    if find.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "find",
                        });
                    }
                }
                RuleMatcher::Regex { pattern } => {
                    if pattern.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "pattern",
                        });
                    } else if let Err(e) = regex::Regex::new(pattern) {
                        issues.push(ValidationIssue::InvalidPattern {
                            rule_id: rule.id.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            if let Some(marker) = &rule.unless_contains {
                if marker.is_empty() {
                    issues.push(ValidationIssue::InvalidCombo {
                        rule_id: Some(rule.id.clone()),
                        message: "unless_contains must not be empty".to_string(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Rules in the order they are written in the config.
    pub fn to_rules(&self) -> Vec<Rule> {
        self.rules.iter().map(RuleDefinition::to_rule).collect()
    }

    pub fn compile_rules(&self) -> Result<RuleSet, RuleError> {
        RuleSet::compile(&self.to_rules())
    }

    pub fn display_name(&self) -> &str {
        if self.meta.name.is_empty() {
            "unnamed"
        } else {
            &self.meta.name
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Version of this rule list
    #[serde(default)]
    pub version: Option<String>,
    /// bundle-patcher versions allowed to apply this config
    #[serde(default)]
    pub requires: Option<String>,
    /// Base directory for relative target paths
    #[serde(default)]
    pub root: Option<PathBuf>,
}

pub const DEFAULT_GLOB: &str = "*.js";

/// A single file, or every matching file in a directory.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TargetDefinition {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

impl TargetDefinition {
    pub fn glob_pattern(&self) -> &str {
        self.glob.as_deref().unwrap_or(DEFAULT_GLOB)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(flatten)]
    pub matcher: RuleMatcher,
    pub replace: String,
    #[serde(default)]
    pub unless_contains: Option<String>,
}

impl RuleDefinition {
    pub fn to_rule(&self) -> Rule {
        let kind = match &self.matcher {
            RuleMatcher::Literal { find } => RuleKind::Literal { find: find.clone() },
            RuleMatcher::Regex { pattern } => RuleKind::Regex {
                pattern: pattern.clone(),
            },
        };
        Rule {
            id: self.id.clone(),
            kind,
            replace: self.replace.clone(),
            unless_contains: self.unless_contains.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleMatcher {
    Literal { find: String },
    Regex { pattern: String },
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        rule_id: Option<String>,
        message: String,
    },
    InvalidPattern {
        rule_id: String,
        message: String,
    },
    InvalidTarget {
        index: usize,
        message: String,
    },
    InvalidVersion {
        field: &'static str,
        value: String,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "patch config contains no rules"),
            ValidationIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rule configuration: {message}"),
            },
            ValidationIssue::InvalidPattern { rule_id, message } => {
                write!(f, "rule '{rule_id}' has an invalid pattern: {message}")
            }
            ValidationIssue::InvalidTarget { index, message } => {
                write!(f, "target #{} is invalid: {message}", index + 1)
            }
            ValidationIssue::InvalidVersion {
                field,
                value,
                message,
            } => write!(f, "invalid {field} '{value}': {message}"),
        }
    }
}
