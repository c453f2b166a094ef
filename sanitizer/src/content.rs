//! Per-value sanitization under a content-type policy.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{ContentType, SanitizerConfig};
use crate::error::GuardError;
use crate::html::HtmlScrubber;
use crate::pattern::{compile_all, excerpt};
use crate::validation::{
    FormatCheck, ValidationResult, collapse_whitespace, normalize_email, normalize_slug,
    normalize_title, normalize_url,
};

/// Substrings removed from every value, applied in this order.
const DANGEROUS_PATTERNS: [&str; 12] = [
    r"<script.*?>.*?</script>",
    r"javascript:",
    r"vbscript:",
    r"data:",
    r"on\w+\s*=",
    r"<iframe.*?>",
    r"<object.*?>",
    r"<embed.*?>",
    r"<form.*?>",
    r"<input.*?>",
    r"<meta.*?>",
    r"<link.*?>",
];

const EXCERPT_CHARS: usize = 50;

/// Removal rounds before leftover nested content is escaped instead.
const MAX_ROUNDS: usize = 4;

/// Cleans untrusted values according to a [`SanitizerConfig`].
///
/// Patterns are compiled once in [`ContentSanitizer::new`]; afterwards the
/// sanitizer is read-only and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ContentSanitizer {
    config: SanitizerConfig,
    dangerous: Vec<Regex>,
    scrubber: HtmlScrubber,
}

impl ContentSanitizer {
    pub fn new(config: SanitizerConfig) -> Result<Self, GuardError> {
        config.validate()?;
        let sanitizer = Self {
            dangerous: compile_all(&DANGEROUS_PATTERNS)?,
            scrubber: HtmlScrubber::new()?,
            config,
        };
        debug!(
            allowed_tags = sanitizer.config.allowed_html_tags.len(),
            sanitize_html = sanitizer.config.sanitize_html,
            "Content sanitizer ready"
        );
        Ok(sanitizer)
    }

    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Sanitizes `content` and reports what had to change.
    ///
    /// Never fails: an internal error yields an invalid result holding the
    /// original input.
    pub fn sanitize(&self, content: &str, content_type: ContentType) -> ValidationResult {
        self.try_sanitize(content, content_type)
            .unwrap_or_else(|err| self.fail(content, content_type, &err))
    }

    /// Sanitizes an arbitrary JSON value.
    ///
    /// Strings are sanitized as they are; anything else is first rendered as
    /// JSON text and a warning is added.
    pub fn sanitize_value(&self, content: &Value, content_type: ContentType) -> ValidationResult {
        let text = match content {
            Value::String(text) => return self.sanitize(text, content_type),
            other => match serde_json::to_string(other) {
                Ok(text) => text,
                Err(err) => return self.fail("", content_type, &GuardError::from(err)),
            },
        };

        match self.try_sanitize(&text, content_type) {
            Ok(mut result) => {
                result
                    .warnings
                    .insert(0, "Content was converted to string".to_owned());
                result
            }
            Err(err) => self.fail(&text, content_type, &err),
        }
    }

    fn fail(&self, original: &str, content_type: ContentType, err: &GuardError) -> ValidationResult {
        error!(?err, %content_type, "Content sanitization failed");
        ValidationResult::failure(original.to_owned(), format!("Sanitization failed: {err}"))
    }

    pub(crate) fn try_sanitize(
        &self,
        content: &str,
        content_type: ContentType,
    ) -> Result<ValidationResult, GuardError> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let max_length = self.config.max_length(content_type);
        let mut text = match content.char_indices().nth(max_length) {
            Some((cut, _)) => {
                errors.push(format!(
                    "Content exceeds maximum length of {max_length} characters"
                ));
                warnings.push("Content was truncated to maximum length".to_owned());
                content[..cut].to_owned()
            }
            None => content.to_owned(),
        };

        // `java\0script:` must not slip past the pattern scan.
        text.retain(|c| c != '\0');

        text = self.neutralize(text, &mut errors, &mut warnings);

        let check = match content_type {
            ContentType::Email => Some(normalize_email(&text)),
            ContentType::Url => Some(normalize_url(&text)),
            ContentType::Slug => Some(normalize_slug(&text)),
            ContentType::Title => Some(normalize_title(&text)),
            _ => None,
        };
        if let Some(FormatCheck {
            value,
            errors: format_errors,
            warnings: format_warnings,
        }) = check
        {
            errors.extend(
                format_errors
                    .into_iter()
                    .map(|err| format!("Invalid {content_type}: {err}")),
            );
            warnings.extend(format_warnings);
            text = value;
        }

        let cleaned = collapse_whitespace(&text);
        let result = ValidationResult::new(cleaned, errors, warnings);

        if !result.is_valid {
            warn!(%content_type, errors = ?result.errors, "Content failed validation");
        } else if !result.warnings.is_empty() {
            info!(%content_type, warnings = ?result.warnings, "Content sanitized with warnings");
        }

        Ok(result)
    }

    /// Removes dangerous substrings and disallowed markup.
    ///
    /// Removing one pattern, or dropping a tag, can splice together text that
    /// matches another (`<scr<script></script>ipt>`, `java<b>script:`), so the
    /// scan runs again on its own output, at most [`MAX_ROUNDS`] times.
    /// Anything still dangerous after that is escaped in a single pass.
    fn neutralize(
        &self,
        mut text: String,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> String {
        for round in 0..MAX_ROUNDS {
            for pattern in &self.dangerous {
                let Some(found) = pattern.find(&text) else {
                    continue;
                };
                if round == 0 {
                    errors.push(format!(
                        "Potentially dangerous content detected: {}...",
                        excerpt(found.as_str(), EXCERPT_CHARS)
                    ));
                    warnings.push("Dangerous content was removed".to_owned());
                }
                text = pattern.replace_all(&text, "").into_owned();
            }

            if self.config.sanitize_html {
                text = self
                    .scrubber
                    .scrub(&text, &self.config.allowed_html_tags);
            }

            if !self.is_dangerous(&text) {
                return text;
            }
            if round == 0 {
                errors.push("Nested dangerous content detected".to_owned());
                warnings.push("Nested dangerous content was removed".to_owned());
            }
        }

        warnings.push("Deeply nested content was escaped".to_owned());
        escape_markup(&text)
    }

    fn is_dangerous(&self, text: &str) -> bool {
        self.dangerous.iter().any(|pattern| pattern.is_match(text))
    }
}

/// Replaces the characters every dangerous pattern needs (`<`, `>`, `:`,
/// `=`) with character references, so no pattern can match the result.
fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            ':' => escaped.push_str("&#58;"),
            '=' => escaped.push_str("&#61;"),
            other => escaped.push(other),
        }
    }
    escaped
}
