//! Pattern compilation helpers.
//!
//! Everything is built on the `regex` crate, whose automata match in time
//! linear in the input. Adversarial input cannot trigger backtracking blowups.

use regex::{Regex, RegexBuilder};

use crate::error::GuardError;

/// Compiles a case-insensitive pattern where `.` also spans newlines.
pub(crate) fn compile(pattern: &str) -> Result<Regex, GuardError> {
    build(pattern, false)
}

/// Same as [`compile`] with `^`/`$` anchoring at line boundaries too.
pub(crate) fn compile_multiline(pattern: &str) -> Result<Regex, GuardError> {
    build(pattern, true)
}

pub(crate) fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, GuardError> {
    patterns.iter().map(|pattern| compile(pattern)).collect()
}

fn build(pattern: &str, multi_line: bool) -> Result<Regex, GuardError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .multi_line(multi_line)
        .build()
        .map_err(|source| GuardError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
