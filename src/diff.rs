//! Compact diffs for minified files.
//!
//! A bundle is often a single multi-megabyte line, so a plain line diff would
//! print the whole file twice. Lines are diffed as usual, then each changed
//! line is diffed inline and unchanged stretches longer than twice
//! [`CONTEXT_CHARS`] are elided around the edits.

use similar::{ChangeTag, TextDiff};

/// Characters kept on each side of an inline change.
pub const CONTEXT_CHARS: usize = 40;

const ELLIPSIS: &str = "…";

/// A piece of a diff line; `emphasized` marks the part that actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub emphasized: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: ChangeTag,
    pub segments: Vec<Segment>,
}

impl DiffLine {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Group changed lines into hunks with one line of context.
pub fn hunks(before: &str, after: &str) -> Vec<Vec<DiffLine>> {
    let diff = TextDiff::from_lines(before, after);
    let mut hunks = Vec::new();

    for group in diff.grouped_ops(1) {
        let mut lines = Vec::new();
        for op in &group {
            for change in diff.iter_inline_changes(op) {
                let raw: Vec<(bool, String)> = change
                    .iter_strings_lossy()
                    .map(|(emphasized, text)| {
                        (emphasized, text.trim_end_matches('\n').to_string())
                    })
                    .collect();
                lines.push(DiffLine {
                    tag: change.tag(),
                    segments: elide(raw),
                });
            }
        }
        hunks.push(lines);
    }

    hunks
}

fn elide(raw: Vec<(bool, String)>) -> Vec<Segment> {
    let last = raw.len().saturating_sub(1);
    raw.into_iter()
        .enumerate()
        .map(|(idx, (emphasized, text))| {
            let text = if emphasized {
                text
            } else {
                clip(&text, idx == 0, idx == last)
            };
            Segment { emphasized, text }
        })
        .collect()
}

/// Shorten unchanged text, keeping only the ends that touch a change.
fn clip(text: &str, is_first: bool, is_last: bool) -> String {
    let len = text.chars().count();
    if len <= CONTEXT_CHARS * 2 {
        return text.to_string();
    }

    let head: String = text.chars().take(CONTEXT_CHARS).collect();
    let tail: String = text.chars().skip(len - CONTEXT_CHARS).collect();

    match (is_first, is_last) {
        // whole line unchanged
        (true, true) => format!("{head}{ELLIPSIS}{tail}"),
        (true, false) => format!("{ELLIPSIS}{tail}"),
        (false, true) => format!("{head}{ELLIPSIS}"),
        (false, false) => format!("{head}{ELLIPSIS}{tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_has_no_hunks() {
        assert!(hunks("same\n", "same\n").is_empty());
    }

    #[test]
    fn test_multiline_change() {
        let hunks = hunks("a\nb\nc\n", "a\nB\nc\n");
        assert_eq!(hunks.len(), 1);
        let tags: Vec<_> = hunks[0].iter().map(|l| l.tag).collect();
        assert_eq!(
            tags,
            vec![
                ChangeTag::Equal,
                ChangeTag::Delete,
                ChangeTag::Insert,
                ChangeTag::Equal
            ]
        );
        assert_eq!(hunks[0][1].text(), "b");
        assert_eq!(hunks[0][2].text(), "B");
    }

    #[test]
    fn test_long_line_is_elided_around_change() {
        let padding = "x".repeat(500);
        let before = format!("{padding} 300mg per day {padding}");
        let after = format!("{padding} Daily serving {padding}");

        let hunks = hunks(&before, &after);
        let deleted = hunks[0]
            .iter()
            .find(|l| l.tag == ChangeTag::Delete)
            .unwrap();
        let text = deleted.text();

        assert!(text.contains("300mg"));
        assert!(text.contains(ELLIPSIS));
        assert!(text.chars().count() < 200);
        assert!(deleted.segments.iter().any(|s| s.emphasized));
    }

    #[test]
    fn test_clip_keeps_short_text() {
        assert_eq!(clip("short", false, false), "short");
    }

    #[test]
    fn test_clip_multibyte() {
        let text = "®".repeat(CONTEXT_CHARS * 3);
        let clipped = clip(&text, true, false);
        assert_eq!(clipped.chars().count(), CONTEXT_CHARS + 1);
    }
}
