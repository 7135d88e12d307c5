//! Transformation rules and the in-memory rewrite they perform.
//!
//! A [`RuleSet`] is an ordered list of compiled rules. Each rule sees the
//! output of the rules before it, so the order given by the caller is
//! preserved exactly. Compilation validates every rule up front, which means
//! a malformed pattern is reported before any file is read.

use log::{debug, trace};
use regex::{Captures, Regex};
use std::fmt;
use thiserror::Error;

/// What a rule searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Exact substring match
    Literal { find: String },
    /// Regular expression; the replacement may reference capture groups
    Regex { pattern: String },
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Literal { .. } => "literal",
            RuleKind::Regex { .. } => "regex",
        }
    }

    /// The search string or pattern, as written.
    pub fn needle(&self) -> &str {
        match self {
            RuleKind::Literal { find } => find,
            RuleKind::Regex { pattern } => pattern,
        }
    }
}

/// A single uncompiled transformation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Stable name used in reports and logs
    pub id: String,
    pub kind: RuleKind,
    /// Replacement text. For regex rules `$1`, `${name}` and `$$` are expanded.
    pub replace: String,
    /// Skip the rule when the content already contains this marker
    pub unless_contains: Option<String>,
}

impl Rule {
    pub fn literal(
        id: impl Into<String>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RuleKind::Literal { find: find.into() },
            replace: replace.into(),
            unless_contains: None,
        }
    }

    pub fn regex(
        id: impl Into<String>,
        pattern: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RuleKind::Regex {
                pattern: pattern.into(),
            },
            replace: replace.into(),
            unless_contains: None,
        }
    }

    /// Guard this rule with a marker that signals it has already run.
    pub fn unless_contains(mut self, marker: impl Into<String>) -> Self {
        self.unless_contains = Some(marker.into());
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {:?} -> {:?}",
            self.id,
            self.kind.name(),
            self.kind.needle(),
            self.replace
        )?;
        if let Some(marker) = &self.unless_contains {
            write!(f, " unless {:?}", marker)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule list is empty")]
    Empty,

    #[error("rule '{id}' has an empty search string")]
    EmptyFind { id: String },

    #[error("rule '{id}' has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

#[derive(Debug)]
struct CompiledRule {
    id: String,
    matcher: Matcher,
    replace: String,
    unless_contains: Option<String>,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> Result<Self, RuleError> {
        let matcher = match &rule.kind {
            RuleKind::Literal { find } => {
                if find.is_empty() {
                    return Err(RuleError::EmptyFind {
                        id: rule.id.clone(),
                    });
                }
                Matcher::Literal(find.clone())
            }
            RuleKind::Regex { pattern } => {
                if pattern.is_empty() {
                    return Err(RuleError::EmptyFind {
                        id: rule.id.clone(),
                    });
                }
                let regex = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
                    id: rule.id.clone(),
                    source,
                })?;
                Matcher::Regex(regex)
            }
        };

        Ok(Self {
            id: rule.id.clone(),
            matcher,
            replace: rule.replace.clone(),
            unless_contains: rule.unless_contains.clone(),
        })
    }

    /// Returns the rewritten text and the number of replacements made.
    fn apply(&self, content: &str) -> (String, usize) {
        match &self.matcher {
            Matcher::Literal(find) => replace_literal(content, find, &self.replace),
            Matcher::Regex(regex) => {
                let mut count = 0;
                let rewritten = regex.replace_all(content, |caps: &Captures<'_>| {
                    count += 1;
                    let mut expanded = String::new();
                    caps.expand(&self.replace, &mut expanded);
                    expanded
                });
                (rewritten.into_owned(), count)
            }
        }
    }
}

/// Replace every non-overlapping occurrence of `find`, scanning left to right.
fn replace_literal(content: &str, find: &str, replace: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    let mut count = 0;

    for (start, _) in content.match_indices(find) {
        out.push_str(&content[last..start]);
        out.push_str(replace);
        last = start + find.len();
        count += 1;
    }
    out.push_str(&content[last..]);

    (out, count)
}

/// Per-rule outcome of a single transform pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub id: String,
    /// Number of replacements performed
    pub replacements: usize,
    /// The rule's `unless_contains` marker was already present
    pub skipped: bool,
}

/// Output of [`RuleSet::transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub content: String,
    pub hits: Vec<RuleHit>,
}

impl Transform {
    pub fn total_replacements(&self) -> usize {
        self.hits.iter().map(|hit| hit.replacements).sum()
    }
}

/// An ordered, validated list of rules.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules in order, failing on the first invalid one.
    pub fn compile(rules: &[Rule]) -> Result<Self, RuleError> {
        if rules.is_empty() {
            return Err(RuleError::Empty);
        }

        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("compiled {} rules", rules.len());
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.id.as_str())
    }

    /// Apply every rule in order to `content`.
    pub fn transform(&self, content: &str) -> Transform {
        let mut current = content.to_string();
        let mut hits = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            if let Some(marker) = &rule.unless_contains {
                if current.contains(marker.as_str()) {
                    trace!("rule '{}' skipped: marker already present", rule.id);
                    hits.push(RuleHit {
                        id: rule.id.clone(),
                        replacements: 0,
                        skipped: true,
                    });
                    continue;
                }
            }

            let (rewritten, replacements) = rule.apply(&current);
            trace!("rule '{}' made {} replacements", rule.id, replacements);
            if replacements > 0 {
                current = rewritten;
            }
            hits.push(RuleHit {
                id: rule.id.clone(),
                replacements,
                skipped: false,
            });
        }

        Transform {
            content: current,
            hits,
        }
    }

    /// True if applying the rules to `content` leaves it as is.
    pub fn is_fixed_point(&self, content: &str) -> bool {
        self.transform(content).content == content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rules: Vec<Rule>) -> RuleSet {
        RuleSet::compile(&rules).unwrap()
    }

    #[test]
    fn test_literal_exact_phrase() {
        let rules = set(vec![Rule::literal(
            "label",
            "300mg KSM-66® per day",
            "Daily serving",
        )]);
        let out = rules.transform("300mg KSM-66® per day");
        assert_eq!(out.content, "Daily serving");
        assert_eq!(out.total_replacements(), 1);
    }

    #[test]
    fn test_literal_replaces_at_edges_and_adjacent() {
        let rules = set(vec![Rule::literal("ab", "ab", "X")]);
        assert_eq!(rules.transform("ab-ab").content, "X-X");
        assert_eq!(rules.transform("ababab").content, "XXX");
        assert_eq!(rules.transform("abcab").content, "XcX");
    }

    #[test]
    fn test_literal_non_overlapping() {
        let rules = set(vec![Rule::literal("aa", "aa", "b")]);
        let out = rules.transform("aaa");
        assert_eq!(out.content, "ba");
        assert_eq!(out.hits[0].replacements, 1);
    }

    #[test]
    fn test_regex_optional_whitespace() {
        let rules = set(vec![Rule::regex("dose", r"300\s?mg", "Daily serving")]);
        assert_eq!(rules.transform("300 mg").content, "Daily serving");
        assert_eq!(rules.transform("300mg").content, "Daily serving");
    }

    #[test]
    fn test_regex_capture_groups() {
        let none = set(vec![Rule::regex("none", r"foo", "bar")]);
        assert_eq!(none.transform("foo foo").content, "bar bar");

        let one = set(vec![Rule::regex(
            "one",
            r#"["']/images/([^"'+?&%]+)["']"#,
            r#"ASSETS + "$1""#,
        )]);
        assert_eq!(
            one.transform(r#"src:"/images/logo.png""#).content,
            r#"src:ASSETS + "logo.png""#
        );

        let many = set(vec![Rule::regex(
            "many",
            r"(?P<first>\w+)-(\w+)-(\w+)",
            "${3}-${2}-${first}",
        )]);
        assert_eq!(many.transform("a-b-c x-y-z").content, "c-b-a z-y-x");
    }

    #[test]
    fn test_regex_literal_dollar() {
        let rules = set(vec![Rule::regex("price", r"(\d+) USD", "$$$1")]);
        assert_eq!(rules.transform("42 USD").content, "$42");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let rules = set(vec![
            Rule::literal("first", "a", "b"),
            Rule::literal("second", "b", "c"),
        ]);
        assert_eq!(rules.transform("a").content, "c");

        let reversed = set(vec![
            Rule::literal("second", "b", "c"),
            Rule::literal("first", "a", "b"),
        ]);
        assert_eq!(reversed.transform("a").content, "b");
    }

    #[test]
    fn test_guard_skips_rule() {
        let rules = set(vec![Rule::literal(
            "flavor",
            "children:h.subtitle",
            "children:h.subtitle,flavor:\"Mixed Berry\"",
        )
        .unless_contains("Mixed Berry")]);

        let once = rules.transform("{children:h.subtitle}");
        assert_eq!(once.content, "{children:h.subtitle,flavor:\"Mixed Berry\"}");

        let twice = rules.transform(&once.content);
        assert_eq!(twice.content, once.content);
        assert!(twice.hits[0].skipped);
    }

    #[test]
    fn test_guard_sees_earlier_rules_output() {
        let rules = set(vec![
            Rule::literal("mark", "x", "x MARK"),
            Rule::literal("guarded", "x", "y").unless_contains("MARK"),
        ]);
        let out = rules.transform("x");
        assert_eq!(out.content, "x MARK");
        assert!(out.hits[1].skipped);
    }

    #[test]
    fn test_no_match_is_identity() {
        let rules = set(vec![
            Rule::regex("images", r#"["']/images/([^"']+)["']"#, "\"/assets/$1\""),
            Rule::literal("prefix", "/images/", "/assets/"),
        ]);
        let content = "const a = \"logo.png\"; // no image paths here ®";
        let out = rules.transform(content);
        assert_eq!(out.content, content);
        assert_eq!(out.total_replacements(), 0);
    }

    #[test]
    fn test_fixed_point_detection() {
        let grows = set(vec![Rule::literal("grow", "a", "aa")]);
        assert!(!grows.is_fixed_point("aa"));

        let stable = set(vec![Rule::regex("dose", r"300\s?mg", "Daily serving")]);
        assert!(stable.is_fixed_point("Daily serving"));
    }

    #[test]
    fn test_compile_rejects_empty_list() {
        assert!(matches!(RuleSet::compile(&[]), Err(RuleError::Empty)));
    }

    #[test]
    fn test_compile_rejects_empty_find() {
        let result = RuleSet::compile(&[Rule::literal("blank", "", "x")]);
        assert!(matches!(result, Err(RuleError::EmptyFind { id }) if id == "blank"));
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        let result = RuleSet::compile(&[
            Rule::literal("ok", "a", "b"),
            Rule::regex("broken", r"(unclosed", "x"),
        ]);
        assert!(matches!(result, Err(RuleError::InvalidPattern { id, .. }) if id == "broken"));
    }

    #[test]
    fn test_multibyte_preserved() {
        let rules = set(vec![Rule::literal("tm", "KSM-66®", "KSM-66™")]);
        assert_eq!(
            rules.transform("« KSM-66® »").content,
            "« KSM-66™ »"
        );
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::literal("id-1", "a", "b").unless_contains("b");
        let text = rule.to_string();
        assert!(text.contains("id-1"));
        assert!(text.contains("literal"));
        assert!(text.contains("unless"));
    }
}
