//! Validation results and the shared format validators.
//!
//! This module provides the building blocks the sanitizer applies per content
//! type: href scheme checking, attribute escaping, and email, URL, slug and
//! title normalization.
//!
//! # Validators
//!
//! - `validate_href`: allow-list URI scheme check for link targets
//! - `escape_attribute`: HTML entity encoding for attribute values
//! - `normalize_email` / `validate_email`: address format checks
//! - `normalize_url` / `validate_url`: absolute http(s) URLs
//! - `normalize_slug` / `validate_slug`: URL slug cleaning
//! - `normalize_title` / `validate_title`: headline checks

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Attributes that survive on allowed tags.
pub const SAFE_ATTRIBUTES: [&str; 3] = ["href", "title", "alt"];

/// Link prefixes accepted by [`validate_href`].
pub const SAFE_SCHEMES: [&str; 5] = ["http:", "https:", "mailto:", "tel:", "#"];

/// Link prefixes always rejected by [`validate_href`].
pub const DANGEROUS_SCHEMES: [&str; 4] = ["javascript:", "vbscript:", "data:", "file:"];

pub const MIN_SLUG_LENGTH: usize = 2;
pub const MIN_TITLE_LENGTH: usize = 5;

/// Outcome of sanitizing a value.
///
/// `cleaned_content` is always populated, even when `is_valid` is false.
/// [`ModelValidator`](crate::ModelValidator) produces results whose content is
/// the whole cleaned record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult<T = String> {
    pub is_valid: bool,
    pub cleaned_content: T,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl<T> ValidationResult<T> {
    /// Builds a result whose validity is derived from `errors`.
    pub fn new(cleaned_content: T, errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            cleaned_content,
            errors,
            warnings,
        }
    }

    /// Conservative result for an internal failure.
    pub fn failure(cleaned_content: T, message: impl Into<String>) -> Self {
        Self::new(cleaned_content, vec![message.into()], Vec::new())
    }
}

/// Validation error types for format check failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Input is shorter than minimum required length.
    TooShort {
        /// Minimum required length.
        min: usize,
        /// Actual length of input.
        actual: usize,
    },
    /// Input does not match expected format.
    InvalidFormat {
        /// Description of expected format.
        expected: String,
    },
    /// URL uses a scheme other than http or https.
    UnsupportedScheme {
        /// The scheme that was found.
        scheme: String,
    },
    /// URL has no host component.
    MissingHost,
    /// Email address contains `..`.
    ConsecutiveDots,
    /// Email address starts or ends with `.`.
    EdgeDot,
    /// Input is empty when a value is required.
    Empty,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TooShort { min, actual } => {
                write!(
                    f,
                    "Input too short: minimum {} characters, got {}",
                    min, actual
                )
            }
            ValidationError::InvalidFormat { expected } => {
                write!(f, "Invalid format: expected {}", expected)
            }
            ValidationError::UnsupportedScheme { scheme } => {
                write!(f, "URL must use http or https protocol, got '{}'", scheme)
            }
            ValidationError::MissingHost => write!(f, "URL must have a valid domain"),
            ValidationError::ConsecutiveDots => write!(f, "Email contains consecutive dots"),
            ValidationError::EdgeDot => write!(f, "Email cannot start or end with a dot"),
            ValidationError::Empty => write!(f, "Input cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A normalized value together with every problem found while producing it.
///
/// Unlike a plain `Result`, the normalized value is kept when checks fail so
/// callers can still return a best-effort cleaned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCheck {
    pub value: String,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl FormatCheck {
    fn new(value: String) -> Self {
        Self {
            value,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapses the check into the first error, if any.
    pub fn into_result(self) -> Result<String, ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Validates a link target against the URI scheme allow-list.
///
/// Returns the href unchanged when it is safe, or an empty string when it
/// uses a dangerous scheme or no recognized safe prefix. Relative paths
/// starting with `/` are accepted.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::validate_href;
///
/// assert_eq!(validate_href("https://example.com"), "https://example.com");
/// assert_eq!(validate_href("/relative/path"), "/relative/path");
/// assert_eq!(validate_href("JavaScript:alert(1)"), "");
/// assert_eq!(validate_href("ftp://example.com"), "");
/// ```
pub fn validate_href(href: &str) -> &str {
    if href.is_empty() {
        return "";
    }

    let lowered = href.trim().to_lowercase();

    if DANGEROUS_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return "";
    }

    let is_safe = SAFE_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme));
    if !is_safe && !href.starts_with('/') {
        return "";
    }

    href
}

/// Escapes a value for use inside a double-quoted HTML attribute.
///
/// Well-formed character references (`&amp;`, `&#39;`, `&#x2F;`) are kept
/// as they are, so escaping an already escaped value is a no-op.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::escape_attribute;
///
/// assert_eq!(escape_attribute(r#"a "quoted" <value>"#), "a &quot;quoted&quot; &lt;value&gt;");
/// assert_eq!(escape_attribute("Tom &amp; Jerry"), "Tom &amp; Jerry");
/// assert_eq!(escape_attribute("Tom & Jerry"), "Tom &amp; Jerry");
/// ```
pub fn escape_attribute(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for (idx, c) in input.char_indices() {
        match c {
            '&' if starts_with_char_reference(&input[idx..]) => result.push('&'),
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

fn starts_with_char_reference(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('&') else {
        return false;
    };
    let Some(end) = rest.find(';') else {
        return false;
    };
    let body = &rest[..end];

    if let Some(numeric) = body.strip_prefix('#') {
        if let Some(hex) = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'))
        {
            return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
        }
        return !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit());
    }

    body.chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Normalizes an email address and checks its format.
///
/// The address is trimmed and lowercased, then must have the shape
/// `local@domain.tld` where the local part uses `[A-Za-z0-9._%+-]`, the domain
/// uses `[A-Za-z0-9.-]` and the TLD is at least two letters. Consecutive dots
/// and a leading or trailing dot are rejected.
pub fn normalize_email(input: &str) -> FormatCheck {
    let mut check = FormatCheck::new(input.trim().to_lowercase());
    let email = check.value.as_str();

    if email.is_empty() {
        check.errors.push(ValidationError::Empty);
        return check;
    }

    if !matches_email_shape(email) {
        check.errors.push(ValidationError::InvalidFormat {
            expected: "valid email address (user@domain.com)".to_string(),
        });
        return check;
    }

    if email.contains("..") {
        check.errors.push(ValidationError::ConsecutiveDots);
    }

    if email.starts_with('.') || email.ends_with('.') {
        check.errors.push(ValidationError::EdgeDot);
    }

    check
}

fn matches_email_shape(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let valid_local = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));

    let valid_domain_chars = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c));

    // The TLD must be the final label: everything after the last dot.
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    valid_local
        && valid_domain_chars
        && !host.is_empty()
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Validates an email address format.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("user.name@domain.co.uk").is_ok());
/// assert!(validate_email("user@domain.com.").is_err());
/// assert!(validate_email("no@domain").is_err());
/// ```
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    normalize_email(input).into_result()
}

/// Parses a URL and re-serializes it in normalized form.
///
/// Only absolute `http` and `https` URLs with a non-empty host are accepted.
/// When parsing fails the trimmed input is kept as the value.
pub fn normalize_url(input: &str) -> FormatCheck {
    let trimmed = input.trim();
    let mut check = FormatCheck::new(trimmed.to_owned());

    if trimmed.is_empty() {
        check.errors.push(ValidationError::Empty);
        return check;
    }

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => {
            check.errors.push(ValidationError::InvalidFormat {
                expected: "absolute URL (https://example.com)".to_string(),
            });
            return check;
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        check.errors.push(ValidationError::UnsupportedScheme {
            scheme: parsed.scheme().to_owned(),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        check.errors.push(ValidationError::MissingHost);
    }

    check.value = parsed.to_string();
    check
}

/// Validates a URL.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::validate_url;
///
/// assert!(validate_url("https://example.com/path?query=value").is_ok());
/// assert!(validate_url("ftp://example.com").is_err());
/// assert!(validate_url("not-a-url").is_err());
/// ```
pub fn validate_url(input: &str) -> Result<String, ValidationError> {
    normalize_url(input).into_result()
}

/// Cleans a slug.
///
/// The input is lowercased, every character outside `[a-z0-9-]` becomes a
/// hyphen, runs of hyphens collapse to one, and leading/trailing hyphens are
/// trimmed. A warning is recorded when the result differs from the lowercased
/// input.
pub fn normalize_slug(input: &str) -> FormatCheck {
    let lowered = input.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }
    let slug = slug.trim_matches('-').to_owned();

    let mut check = FormatCheck::new(slug);

    let length = check.value.chars().count();
    if length < MIN_SLUG_LENGTH {
        check.errors.push(ValidationError::TooShort {
            min: MIN_SLUG_LENGTH,
            actual: length,
        });
    }

    if check.value != lowered {
        check
            .warnings
            .push("Slug was automatically cleaned".to_string());
    }

    check
}

/// Validates and cleans a slug.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::validate_slug;
///
/// assert_eq!(validate_slug("Hello World").unwrap(), "hello-world");
/// assert_eq!(validate_slug("--leading-trailing--").unwrap(), "leading-trailing");
/// assert!(validate_slug("!").is_err());
/// ```
pub fn validate_slug(input: &str) -> Result<String, ValidationError> {
    normalize_slug(input).into_result()
}

/// Collapses whitespace in a title and checks its length and punctuation.
///
/// Titles where more than a fifth of the characters are `!`, `?` or `.`
/// get a warning.
pub fn normalize_title(input: &str) -> FormatCheck {
    let mut check = FormatCheck::new(collapse_whitespace(input));

    let length = check.value.chars().count();
    if length < MIN_TITLE_LENGTH {
        check.errors.push(ValidationError::TooShort {
            min: MIN_TITLE_LENGTH,
            actual: length,
        });
    }

    let punctuation = check
        .value
        .chars()
        .filter(|c| matches!(c, '!' | '?' | '.'))
        .count();
    if punctuation * 5 > length {
        check
            .warnings
            .push("Title contains excessive punctuation".to_string());
    }

    check
}

/// Validates a title.
///
/// # Examples
///
/// ```
/// use sanitizer::validation::validate_title;
///
/// assert_eq!(validate_title("  A   Good   Title ").unwrap(), "A Good Title");
/// assert!(validate_title("Hi").is_err());
/// ```
pub fn validate_title(input: &str) -> Result<String, ValidationError> {
    normalize_title(input).into_result()
}

/// Collapses runs of whitespace to single spaces and trims both ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
