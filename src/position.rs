//! Structural position resolution
//!
//! Maps between raw text coordinates and structural key paths by scanning
//! indentation line by line. No parse tree is built: every query rescans the
//! text, assuming two spaces per nesting level.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Spaces per nesting level
pub const INDENT_WIDTH: usize = 2;

lazy_static! {
    /// Leading whitespace, a bare word key, then a colon
    static ref KEY_LINE: Regex =
        Regex::new(r"^(\s*)(\w[\w-]*):(?:\s|$)(.*)$").expect("key pattern is valid");
    /// Leading whitespace, then a sequence dash
    static ref SEQUENCE_ITEM: Regex =
        Regex::new(r"^(\s*)-(?:\s|$)").expect("sequence pattern is valid");
}

/// A cursor position (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// The text span of a structural node: a key, or a whole sequence-item line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextLocation {
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl TextLocation {
    /// Returned when a path cannot be found in the text
    pub const FALLBACK: TextLocation = TextLocation {
        line: 1,
        column: 1,
        length: 1,
    };
}

/// A 1-based range; `end_col` is exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl From<TextLocation> for TextRange {
    fn from(loc: TextLocation) -> Self {
        TextRange {
            start_line: loc.line,
            start_col: loc.column,
            end_line: loc.line,
            end_col: loc.column + loc.length,
        }
    }
}

/// A `key:` line split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLine<'a> {
    /// Indentation width in characters
    pub indent: usize,
    pub key: &'a str,
    /// Everything after the colon
    pub rest: &'a str,
}

impl KeyLine<'_> {
    pub fn level(&self) -> usize {
        self.indent / INDENT_WIDTH
    }

    /// 1-based column of the first key character
    pub fn column(&self) -> usize {
        self.indent + 1
    }

    pub fn key_len(&self) -> usize {
        self.key.chars().count()
    }

    /// True for `key:` with no value yet (a trailing comment still counts as none)
    pub fn is_stub(&self) -> bool {
        let rest = self.rest.trim();
        rest.is_empty() || rest.starts_with('#')
    }
}

/// Match a `key:` line
pub fn match_key(line: &str) -> Option<KeyLine<'_>> {
    let caps = KEY_LINE.captures(line)?;
    let indent = caps.get(1)?.as_str().chars().count();
    Some(KeyLine {
        indent,
        key: caps.get(2)?.as_str(),
        rest: caps.get(3).map_or("", |m| m.as_str()),
    })
}

/// The key on a given (1-based) line, if the line is a `key:` line
pub fn key_at_line(text: &str, line: usize) -> Option<KeyLine<'_>> {
    let content = text.lines().nth(line.checked_sub(1)?)?;
    match_key(content)
}

/// Width of a line's leading whitespace in characters
pub fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Running key path maintained while scanning lines top to bottom
#[derive(Debug, Default, Clone)]
pub(crate) struct PathScanner {
    slots: Vec<Option<String>>,
}

impl PathScanner {
    /// Truncate to `level` entries and place `segment` at `level`
    pub(crate) fn assign(&mut self, level: usize, segment: &str) {
        self.slots.truncate(level);
        self.slots.resize(level, None);
        self.slots.push(Some(segment.to_string()));
    }

    /// Feed one line; key lines update the path and are returned
    pub(crate) fn feed<'a>(&mut self, line: &'a str) -> Option<KeyLine<'a>> {
        let key = match_key(line)?;
        self.assign(key.level(), key.key);
        Some(key)
    }

    /// The path with empty slots removed
    pub(crate) fn path(&self) -> Vec<String> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Scanned path equals `target` over all of `target`'s entries
    fn matches(&self, target: &[String]) -> bool {
        self.matches_prefix(target, target.len())
    }

    fn matches_prefix(&self, target: &[String], len: usize) -> bool {
        len <= target.len()
            && len <= self.slots.len()
            && target[..len]
                .iter()
                .zip(&self.slots)
                .all(|(want, have)| have.as_deref() == Some(want.as_str()))
    }
}

/// Structural path of the node enclosing `position`
///
/// Only lines before the query line are scanned.
pub fn path_at_position(text: &str, position: Position) -> Vec<String> {
    scan_lines(text, position.line.saturating_sub(1))
}

/// Structural path up to and including the key on `line`
pub fn path_through_line(text: &str, line: usize) -> Vec<String> {
    scan_lines(text, line)
}

fn scan_lines(text: &str, count: usize) -> Vec<String> {
    let mut scanner = PathScanner::default();
    for line in text.lines().take(count) {
        scanner.feed(line);
    }
    scanner.path()
}

/// Text location of a structural path
///
/// Numeric segments address sequence items; the dash line of the matching
/// item is returned with a range covering the whole line. Falls back to
/// [`TextLocation::FALLBACK`] when nothing matches.
pub fn location_of_path(text: &str, target: &[String]) -> TextLocation {
    let mut scanner = PathScanner::default();
    // Sequence item counters, indexed by nesting level
    let mut counters: Vec<Option<usize>> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if let Some(caps) = SEQUENCE_ITEM.captures(line) {
            let level = caps[1].chars().count() / INDENT_WIDTH;
            counters.truncate(level + 1);
            counters.resize(level + 1, None);
            let index = counters[level].map_or(0, |i| i + 1);
            counters[level] = Some(index);
            scanner.assign(level, &index.to_string());

            let wanted = target.get(level).and_then(|s| s.parse::<usize>().ok());
            if wanted == Some(index) && scanner.matches_prefix(target, level) {
                return TextLocation {
                    line: idx + 1,
                    column: 1,
                    length: line.chars().count().max(1),
                };
            }
            continue;
        }

        if let Some(key) = scanner.feed(line) {
            counters.truncate(key.level() + 1);
            if scanner.matches(target) {
                return TextLocation {
                    line: idx + 1,
                    column: key.column(),
                    length: key.key_len(),
                };
            }
        }
    }

    TextLocation::FALLBACK
}

/// Index lookup candidates for a path, most specific first
///
/// The exact path, then the path with a single segment replaced by `*`
/// (deepest segment first, never the first segment), then the bare `*`.
pub fn possible_paths(path: &[String]) -> Vec<String> {
    let mut candidates = Vec::with_capacity(path.len() + 1);
    candidates.push(path.join("/"));

    for i in (1..path.len()).rev() {
        let candidate: Vec<&str> = path
            .iter()
            .enumerate()
            .map(|(j, segment)| if j == i { "*" } else { segment.as_str() })
            .collect();
        candidates.push(candidate.join("/"));
    }

    candidates.push("*".to_string());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const DOC: &str = "\
services:
  web:
    image: nginx
    ports:
      - 80
      - 443
  db:
    image: postgres
version: 3
";

    fn segs(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_key() {
        let key = match_key("    image: nginx").unwrap();
        assert_eq!(key.indent, 4);
        assert_eq!(key.key, "image");
        assert_eq!(key.rest.trim(), "nginx");
        assert_eq!(key.level(), 2);
        assert!(!key.is_stub());

        assert!(match_key("config:").unwrap().is_stub());
        assert!(match_key("config:   # later").unwrap().is_stub());
        assert!(match_key("- name: web").is_none());
        assert!(match_key("# comment: here").is_none());
        assert!(match_key("url:http").is_none());
    }

    #[test]
    fn test_path_at_position() {
        assert_eq!(path_at_position(DOC, Position::new(1, 1)), Vec::<String>::new());
        assert_eq!(path_at_position(DOC, Position::new(3, 5)), segs(&["services", "web"]));
        assert_eq!(
            path_at_position(DOC, Position::new(5, 7)),
            segs(&["services", "web", "ports"])
        );
        assert_eq!(path_at_position(DOC, Position::new(8, 5)), segs(&["services", "db"]));
        assert_eq!(path_at_position(DOC, Position::new(10, 1)), segs(&["version"]));
    }

    #[test]
    fn test_path_skips_empty_levels() {
        let text = "a:\n      deep:\n        x: 1\n";
        assert_eq!(path_at_position(text, Position::new(3, 1)), segs(&["a", "deep"]));
    }

    #[test]
    fn test_path_through_line_includes_key() {
        assert_eq!(
            path_through_line(DOC, 3),
            segs(&["services", "web", "image"])
        );
    }

    #[test]
    fn test_location_of_key() {
        assert_eq!(
            location_of_path(DOC, &segs(&["services", "db", "image"])),
            TextLocation {
                line: 8,
                column: 5,
                length: 5
            }
        );
        assert_eq!(
            location_of_path(DOC, &segs(&["version"])),
            TextLocation {
                line: 9,
                column: 1,
                length: 7
            }
        );
    }

    #[test]
    fn test_location_of_sequence_item() {
        assert_eq!(
            location_of_path(DOC, &segs(&["services", "web", "ports", "1"])),
            TextLocation {
                line: 6,
                column: 1,
                length: 11
            }
        );
    }

    #[test]
    fn test_sequence_counters_restart_per_parent() {
        let text = "a:\n  - 1\n  - 2\nb:\n  - 3\n  - 4\n";
        assert_eq!(location_of_path(text, &segs(&["b", "0"])).line, 5);
        assert_eq!(location_of_path(text, &segs(&["b", "1"])).line, 6);
        assert_eq!(location_of_path(text, &segs(&["a", "1"])).line, 3);
    }

    #[test]
    fn test_nested_sequence_keeps_outer_counter() {
        let text = "jobs:\n  - name: a\n    steps:\n      - x\n      - y\n  - name: b\n";
        assert_eq!(location_of_path(text, &segs(&["jobs", "1"])).line, 6);
        assert_eq!(
            location_of_path(text, &segs(&["jobs", "0", "steps", "1"])).line,
            5
        );
        assert_eq!(
            location_of_path(text, &segs(&["jobs", "1", "steps", "0"])),
            TextLocation::FALLBACK
        );
    }

    #[test]
    fn test_location_fallback() {
        assert_eq!(
            location_of_path(DOC, &segs(&["nope"])),
            TextLocation::FALLBACK
        );
        assert_eq!(location_of_path("", &segs(&["a"])), TextLocation::FALLBACK);
    }

    #[test]
    fn test_key_at_line() {
        let key = key_at_line(DOC, 2).unwrap();
        assert_eq!(key.key, "web");
        assert_eq!(key.column(), 3);
        assert!(key_at_line(DOC, 5).is_none());
        assert!(key_at_line(DOC, 0).is_none());
        assert!(key_at_line(DOC, 99).is_none());
    }

    #[test]
    fn test_possible_paths() {
        assert_eq!(
            possible_paths(&segs(&["a", "b", "c"])),
            vec!["a/b/c", "a/b/*", "a/*/c", "*"]
        );
        assert_eq!(possible_paths(&segs(&["web"])), vec!["web", "*"]);
    }

    proptest! {
        #[test]
        fn prop_possible_paths_single_wildcard(path in prop::collection::vec("[a-z]{1,6}", 1..6)) {
            let candidates = possible_paths(&path);
            prop_assert_eq!(candidates.len(), path.len() + 1);
            prop_assert_eq!(&candidates[0], &path.join("/"));
            prop_assert_eq!(candidates.last().map(String::as_str), Some("*"));
            for candidate in &candidates[1..candidates.len() - 1] {
                let parts: Vec<&str> = candidate.split('/').collect();
                prop_assert_eq!(parts.len(), path.len());
                prop_assert_eq!(parts.iter().filter(|p| **p == "*").count(), 1);
                prop_assert_ne!(parts[0], "*");
            }
        }
    }
}
