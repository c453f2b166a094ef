//! Allow-list tag and attribute rewriting.
//!
//! This is a single left-to-right pass over everything that looks like a tag
//! (`<` up to the next `>`). Each tag is either dropped or re-emitted from
//! scratch, so nothing from the input survives between a `<` and a `>` unless
//! it was rebuilt here. Text between tags is copied through untouched.

use std::collections::BTreeSet;

use regex::{Captures, Regex};

use crate::error::GuardError;
use crate::pattern::compile;
use crate::validation::{SAFE_ATTRIBUTES, escape_attribute, validate_href};

#[derive(Debug, Clone)]
pub(crate) struct HtmlScrubber {
    tag: Regex,
    attribute: Regex,
}

impl HtmlScrubber {
    pub(crate) fn new() -> Result<Self, GuardError> {
        Ok(Self {
            tag: compile(r"<[^>]*>")?,
            attribute: compile(r#"(href|title|alt)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    /// Removes every tag not in `allowed` and rebuilds the allowed ones.
    pub(crate) fn scrub(&self, content: &str, allowed: &BTreeSet<String>) -> String {
        self.tag
            .replace_all(content, |caps: &Captures<'_>| {
                let inner = &caps[0][1..caps[0].len() - 1];
                self.rebuild(inner, allowed).unwrap_or_default()
            })
            .into_owned()
    }

    /// Returns the rebuilt tag, or `None` when the tag must be dropped.
    fn rebuild(&self, inner: &str, allowed: &BTreeSet<String>) -> Option<String> {
        let (closing, body) = match inner.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, inner),
        };

        let name_len = body
            .char_indices()
            .take_while(|(idx, c)| {
                if *idx == 0 {
                    c.is_ascii_alphabetic()
                } else {
                    c.is_ascii_alphanumeric()
                }
            })
            .count();
        if name_len == 0 {
            return None;
        }

        let (name, rest) = body.split_at(name_len);
        // `<p-x>` or `<svg:script>` is a different element, not `p` or `svg`.
        if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace() || c == '/') {
            return None;
        }

        let name = name.to_ascii_lowercase();
        if !allowed.contains(&name) {
            return None;
        }

        if closing {
            return Some(format!("</{name}>"));
        }

        let attributes = self.safe_attributes(rest);
        if attributes.is_empty() {
            Some(format!("<{name}>"))
        } else {
            Some(format!("<{name} {}>", attributes.join(" ")))
        }
    }

    /// Keeps the first quoted occurrence of each safe attribute, in
    /// [`SAFE_ATTRIBUTES`] order.
    fn safe_attributes(&self, raw: &str) -> Vec<String> {
        let mut found: [Option<&str>; SAFE_ATTRIBUTES.len()] = [None; SAFE_ATTRIBUTES.len()];

        for caps in self.attribute.captures_iter(raw) {
            let start = caps.get(0).map_or(0, |m| m.start());
            // `data-title=` or `xhref=` are other attributes.
            let standalone = raw[..start]
                .chars()
                .next_back()
                .is_none_or(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '/'));
            if !standalone {
                continue;
            }
            let key = caps[1].to_ascii_lowercase();
            let Some(slot) = SAFE_ATTRIBUTES.iter().position(|attr| *attr == key) else {
                continue;
            };
            if found[slot].is_some() {
                continue;
            }
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            found[slot] = Some(value);
        }

        SAFE_ATTRIBUTES
            .iter()
            .zip(found)
            .filter_map(|(attr, value)| {
                let value = value?;
                let value = if *attr == "href" {
                    validate_href(value)
                } else {
                    value
                };
                if value.is_empty() {
                    None
                } else {
                    Some(format!(r#"{attr}="{}""#, escape_attribute(value)))
                }
            })
            .collect()
    }
}
