//! Engine configuration and the content-type length table.
//!
//! A [`SanitizerConfig`] is read once, validated, and handed to the engine
//! constructors. Nothing in the engine consults the environment after that.

use std::collections::BTreeSet;
use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;

pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 50_000;
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 200;
pub const DEFAULT_MAX_ANALYSIS_LENGTH: usize = 1_000_000;

const DEFAULT_ALLOWED_TAGS: [&str; 15] = [
    "p", "br", "strong", "em", "u", "a", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Recognized configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    pub max_content_length: usize,
    pub max_title_length: usize,
    pub allowed_html_tags: BTreeSet<String>,
    pub sanitize_html: bool,
    /// Upper bound in bytes on what the analyzer will scan.
    pub max_analysis_length: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
            allowed_html_tags: DEFAULT_ALLOWED_TAGS.iter().map(|t| (*t).to_owned()).collect(),
            sanitize_html: true,
            max_analysis_length: DEFAULT_MAX_ANALYSIS_LENGTH,
        }
    }
}

impl SanitizerConfig {
    /// Builds a configuration from `GUARD_*` environment variables.
    ///
    /// Unset variables fall back to their defaults. A variable that is set
    /// but does not parse is an error rather than a silent default.
    pub fn from_env() -> Result<Self, GuardError> {
        let mut config = Self::default();

        if let Some(value) = read_usize("GUARD_MAX_CONTENT_LENGTH")? {
            config.max_content_length = value;
        }
        if let Some(value) = read_usize("GUARD_MAX_TITLE_LENGTH")? {
            config.max_title_length = value;
        }
        if let Some(value) = read_usize("GUARD_MAX_ANALYSIS_LENGTH")? {
            config.max_analysis_length = value;
        }
        if let Ok(raw) = env::var("GUARD_ALLOWED_HTML_TAGS") {
            config.allowed_html_tags = parse_tag_list(&raw);
        }
        if let Ok(raw) = env::var("GUARD_SANITIZE_HTML") {
            config.sanitize_html = parse_flag("GUARD_SANITIZE_HTML", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.max_content_length == 0 {
            return Err(GuardError::config("max_content_length", "must be positive"));
        }
        if self.max_title_length == 0 {
            return Err(GuardError::config("max_title_length", "must be positive"));
        }
        if self.max_analysis_length == 0 {
            return Err(GuardError::config("max_analysis_length", "must be positive"));
        }
        if let Some(tag) = self
            .allowed_html_tags
            .iter()
            .find(|tag| tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(GuardError::config(
                "allowed_html_tags",
                format!("'{tag}' is not a valid tag name"),
            ));
        }
        Ok(())
    }

    /// Maximum length, in characters, for the given content type.
    pub fn max_length(&self, content_type: ContentType) -> usize {
        match content_type {
            ContentType::Title => self.max_title_length,
            ContentType::Subtitle => self.max_title_length.saturating_mul(2),
            ContentType::Bio => 1000,
            ContentType::Description => 500,
            ContentType::Email => 255,
            ContentType::Url => 2048,
            ContentType::Slug | ContentType::Name => 100,
            ContentType::General | ContentType::ArticleContent => self.max_content_length,
        }
    }

    pub fn is_allowed_tag(&self, name: &str) -> bool {
        self.allowed_html_tags.contains(&name.to_ascii_lowercase())
    }
}

fn read_usize(key: &str) -> Result<Option<usize>, GuardError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| GuardError::config(key, e.to_string())),
        Err(_) => Ok(None),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, GuardError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GuardError::config(key, format!("'{other}' is not a boolean"))),
    }
}

fn parse_tag_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Selects which length and format policy applies to a value.
///
/// Unknown tags deserialize to [`ContentType::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum ContentType {
    #[default]
    General,
    Title,
    Subtitle,
    Bio,
    Description,
    Email,
    Url,
    Slug,
    Name,
    ArticleContent,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Bio => "bio",
            Self::Description => "description",
            Self::Email => "email",
            Self::Url => "url",
            Self::Slug => "slug",
            Self::Name => "name",
            Self::ArticleContent => "article-content",
        }
    }

    /// Lenient lookup used for user-supplied tags.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "title" => Self::Title,
            "subtitle" => Self::Subtitle,
            "bio" => Self::Bio,
            "description" => Self::Description,
            "email" => Self::Email,
            "url" => Self::Url,
            "slug" => Self::Slug,
            "name" => Self::Name,
            "article-content" | "article_content" | "article" => Self::ArticleContent,
            _ => Self::General,
        }
    }
}

impl From<String> for ContentType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
