//! Threat detection and scoring.
//!
//! The analyzer is independent of the sanitizer's verdict: it scans the raw
//! input against a fixed table of attack categories, scores what it finds,
//! predicts Content Security Policy violations, and produces a more
//! aggressively cleaned variant of the content for high-risk input.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::ContentType;
use crate::content::ContentSanitizer;
use crate::error::GuardError;
use crate::pattern::{compile, compile_all, compile_multiline, excerpt};
use crate::report::render_report;

const EXCERPT_CHARS: usize = 100;
const MAX_SCORE: u32 = 100;

/// Severity of a detected threat, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Points subtracted from the score per threat of this level.
    pub fn penalty(self) -> u32 {
        match self {
            Self::Critical => 40,
            Self::High => 25,
            Self::Medium => 15,
            Self::Low => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Critical and high threats make content unsafe to publish.
    pub fn is_blocking(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named class of dangerous markup or script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    ScriptTags,
    EventHandlers,
    JavascriptProtocols,
    EncodedAttacks,
    CssAttacks,
    SvgAttacks,
    ObjectAttacks,
    FormAttacks,
    MetaAttacks,
    PolyglotAttacks,
    DataExfiltration,
}

impl ThreatCategory {
    pub const ALL: [Self; 11] = [
        Self::ScriptTags,
        Self::EventHandlers,
        Self::JavascriptProtocols,
        Self::EncodedAttacks,
        Self::CssAttacks,
        Self::SvgAttacks,
        Self::ObjectAttacks,
        Self::FormAttacks,
        Self::MetaAttacks,
        Self::PolyglotAttacks,
        Self::DataExfiltration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScriptTags => "script_tags",
            Self::EventHandlers => "event_handlers",
            Self::JavascriptProtocols => "javascript_protocols",
            Self::EncodedAttacks => "encoded_attacks",
            Self::CssAttacks => "css_attacks",
            Self::SvgAttacks => "svg_attacks",
            Self::ObjectAttacks => "object_attacks",
            Self::FormAttacks => "form_attacks",
            Self::MetaAttacks => "meta_attacks",
            Self::PolyglotAttacks => "polyglot_attacks",
            Self::DataExfiltration => "data_exfiltration",
        }
    }

    /// The tag with spaces, e.g. `event handlers`.
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }

    pub fn level(self) -> ThreatLevel {
        match self {
            Self::ScriptTags | Self::JavascriptProtocols | Self::DataExfiltration => {
                ThreatLevel::Critical
            }
            Self::EventHandlers | Self::ObjectAttacks | Self::SvgAttacks => ThreatLevel::High,
            Self::CssAttacks | Self::FormAttacks | Self::MetaAttacks => ThreatLevel::Medium,
            Self::EncodedAttacks | Self::PolyglotAttacks => ThreatLevel::Low,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ScriptTags => "Script tags can execute arbitrary JavaScript code",
            Self::EventHandlers => "Event handlers can trigger malicious JavaScript",
            Self::JavascriptProtocols => "JavaScript protocols can execute code in URLs",
            Self::EncodedAttacks => "Encoded content may bypass security filters",
            Self::CssAttacks => "CSS can be used to execute JavaScript or steal data",
            Self::SvgAttacks => "SVG elements can contain executable content",
            Self::ObjectAttacks => "Object/embed tags can load external malicious content",
            Self::FormAttacks => "Form elements can be used for data collection attacks",
            Self::MetaAttacks => "Meta tags can redirect users or modify page behavior",
            Self::PolyglotAttacks => "Sophisticated multi-vector attack patterns",
            Self::DataExfiltration => "Code patterns that may steal user data",
        }
    }

    pub fn remediation(self) -> &'static str {
        match self {
            Self::ScriptTags => "Remove all script tags or encode them as text",
            Self::EventHandlers => "Remove event handler attributes from HTML elements",
            Self::JavascriptProtocols => "Replace with safe HTTP/HTTPS URLs",
            Self::EncodedAttacks => "Decode and re-sanitize content",
            Self::CssAttacks => "Remove dangerous CSS properties and expressions",
            Self::SvgAttacks => "Remove SVG elements or sanitize their contents",
            Self::ObjectAttacks => "Remove object, embed, applet, and iframe elements",
            Self::FormAttacks => "Remove form elements or sanitize their attributes",
            Self::MetaAttacks => "Remove or sanitize meta and link tags",
            Self::PolyglotAttacks => "Apply comprehensive input sanitization",
            Self::DataExfiltration => "Remove data access and network request code",
        }
    }

    /// Detection patterns, matched case-insensitively across lines.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::ScriptTags => &[r"<script[^>]*>.*?</script>", r"<script[^>]*>", r"</script>"],
            Self::EventHandlers => &[
                r#"on\w+\s*=\s*["']?[^"'>\s]*["']?"#,
                r"on(load|click|mouse|focus|blur|change|submit)\s*=",
                r"on(error|abort|resize|scroll|unload)\s*=",
            ],
            Self::JavascriptProtocols => &[
                r"javascript\s*:",
                r"vbscript\s*:",
                r"livescript\s*:",
                r"mocha\s*:",
                r"data\s*:.*script",
            ],
            Self::EncodedAttacks => &[
                r"&#x?[0-9a-f]+;",
                r"%[0-9a-f]{2}",
                r"\\u[0-9a-f]{4}",
                r"\\x[0-9a-f]{2}",
            ],
            Self::CssAttacks => &[
                r"expression\s*\(",
                r"behavior\s*:",
                r"@import\s+",
                r"javascript\s*:.*url\s*\(",
                r#"url\s*\(\s*["']?javascript:"#,
            ],
            Self::SvgAttacks => &[
                r"<svg[^>]*onload[^>]*>",
                r"<svg[^>]*>.*?<script",
                r"<animateTransform[^>]*onbegin",
            ],
            Self::ObjectAttacks => &[
                r"<object[^>]*>",
                r"<embed[^>]*>",
                r"<applet[^>]*>",
                r"<iframe[^>]*>",
            ],
            Self::FormAttacks => &[
                r"<form[^>]*>",
                r"<input[^>]*>",
                r"<textarea[^>]*>",
                r"<select[^>]*>",
            ],
            Self::MetaAttacks => &[
                r"<meta[^>]*http-equiv[^>]*refresh",
                r"<link[^>]*href[^>]*javascript:",
                r"<base[^>]*href",
            ],
            Self::PolyglotAttacks => &[
                r"jaVasCript:.*oNcliCk",
                r"/\*.*\*/.*alert\s*\(",
                r"<!--.*-->.*<script",
                r"</style.*<script",
            ],
            Self::DataExfiltration => &[
                r"new\s+Image\s*\(\s*\)",
                r"fetch\s*\(",
                r"XMLHttpRequest",
                r"\.send\s*\(",
                r"document\.cookie",
                r"localStorage\.",
                r"sessionStorage\.",
            ],
        }
    }

    /// Extra removals applied to the sanitized output when this category
    /// was detected at a blocking level.
    fn aggressive_patterns(self) -> &'static [&'static str] {
        match self {
            Self::ScriptTags => &[r"</?script[^>]*>", r"javascript:"],
            Self::EventHandlers => &[r"\bon\w+\s*=\s*[^>\s]*"],
            Self::ObjectAttacks => &[r"</?(?:object|embed|applet|iframe|frame)[^>]*>"],
            _ => &[],
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte offsets of a match in the analyzed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position {}-{}", self.start, self.end)
    }
}

/// One detected threat. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityThreat {
    threat_type: ThreatCategory,
    threat_level: ThreatLevel,
    description: String,
    pattern: String,
    location: Span,
    remediation: String,
}

impl SecurityThreat {
    fn new(category: ThreatCategory, matched: &str, location: Span) -> Self {
        Self {
            threat_type: category,
            threat_level: category.level(),
            description: category.description().to_owned(),
            pattern: excerpt(matched, EXCERPT_CHARS).to_owned(),
            location,
            remediation: category.remediation().to_owned(),
        }
    }

    pub fn threat_type(&self) -> ThreatCategory {
        self.threat_type
    }

    pub fn threat_level(&self) -> ThreatLevel {
        self.threat_level
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The matched text, at most 100 characters.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn location(&self) -> Span {
        self.location
    }

    pub fn remediation(&self) -> &str {
        &self.remediation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAnalysisResult {
    pub threats: Vec<SecurityThreat>,
    /// 100 minus the penalties of every threat, floored at 0.
    pub score: u8,
    pub recommendations: Vec<String>,
    pub sanitized_content: String,
    pub is_safe: bool,
    pub csp_violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SecurityAnalysisResult {
    /// Conservative result for content that could not be analyzed.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            threats: Vec::new(),
            score: 0,
            recommendations: vec!["Content analysis failed - manual review required".to_owned()],
            sanitized_content: String::new(),
            is_safe: false,
            csp_violations: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn count(&self, level: ThreatLevel) -> usize {
        self.threats
            .iter()
            .filter(|threat| threat.threat_level == level)
            .count()
    }
}

/// Directives recommended for pages that render sanitized content.
pub const RECOMMENDED_CSP: [(&str, &str); 8] = [
    ("script-src", "'self' 'unsafe-inline'"),
    ("style-src", "'self' 'unsafe-inline' fonts.googleapis.com"),
    ("img-src", "'self' data: https:"),
    ("font-src", "'self' fonts.gstatic.com"),
    ("connect-src", "'self'"),
    ("object-src", "'none'"),
    ("base-uri", "'self'"),
    ("frame-ancestors", "'none'"),
];

/// [`RECOMMENDED_CSP`] as a `Content-Security-Policy` header value.
pub fn recommended_csp() -> String {
    RECOMMENDED_CSP
        .iter()
        .map(|(directive, value)| format!("{directive} {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

const CSP_CHECKS: [(&str, &str); 4] = [
    (r"<script[^>]*>", "Inline scripts violate script-src 'self' policy"),
    (r"\bstyle\s*=", "Inline styles may violate style-src policy"),
    (r"data:", "Data URLs may violate img-src policy"),
    (
        r#"src\s*=\s*["']?https?://"#,
        "External resources may violate connect-src policy",
    ),
];

const ATTRIBUTE_CHECKS: [(&str, &str); 4] = [
    ("event_attrs", r"\bon\w+\s*="),
    ("style_attrs", r#"\bstyle\s*=\s*["'][^"']*expression"#),
    ("href_attrs", r#"\bhref\s*=\s*["']?(javascript|vbscript|data):"#),
    ("src_attrs", r#"\bsrc\s*=\s*["']?(javascript|vbscript|data):"#),
];

const STANDING_RECOMMENDATIONS: [&str; 3] = [
    "Implement Content Security Policy (CSP) headers",
    "Consider using a security-focused HTML sanitization library",
    "Regularly audit and test content sanitization",
];

struct CompiledCategory {
    category: ThreatCategory,
    detect: Vec<Regex>,
    strip: Vec<Regex>,
}

impl fmt::Debug for CompiledCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCategory")
            .field("category", &self.category)
            .field("patterns", &self.detect.len())
            .finish()
    }
}

/// Scans content for attack patterns and scores it.
///
/// All pattern tables are compiled in [`SecurityAnalyzer::new`]. The
/// analyzer never decodes entities or percent escapes before scanning:
/// encoded payloads are reported under `encoded_attacks` and stay inert in
/// the sanitized output.
#[derive(Debug)]
pub struct SecurityAnalyzer {
    sanitizer: ContentSanitizer,
    categories: Vec<CompiledCategory>,
    csp_checks: Vec<(Regex, &'static str)>,
    attribute_checks: Vec<(&'static str, Regex)>,
}

impl SecurityAnalyzer {
    pub fn new(sanitizer: ContentSanitizer) -> Result<Self, GuardError> {
        let categories = ThreatCategory::ALL
            .iter()
            .map(|&category| {
                Ok(CompiledCategory {
                    category,
                    detect: category
                        .patterns()
                        .iter()
                        .map(|pattern| compile_multiline(pattern))
                        .collect::<Result<_, GuardError>>()?,
                    strip: compile_all(category.aggressive_patterns())?,
                })
            })
            .collect::<Result<Vec<_>, GuardError>>()?;

        let csp_checks = CSP_CHECKS
            .iter()
            .map(|(pattern, message)| Ok((compile(pattern)?, *message)))
            .collect::<Result<Vec<_>, GuardError>>()?;

        let attribute_checks = ATTRIBUTE_CHECKS
            .iter()
            .map(|(name, pattern)| Ok((*name, compile(pattern)?)))
            .collect::<Result<Vec<_>, GuardError>>()?;

        debug!(categories = categories.len(), "Security analyzer ready");
        Ok(Self {
            sanitizer,
            categories,
            csp_checks,
            attribute_checks,
        })
    }

    pub fn sanitizer(&self) -> &ContentSanitizer {
        &self.sanitizer
    }

    /// Analyzes `content`. Never fails: content that cannot be analyzed,
    /// including content over the configured size bound, yields
    /// [`SecurityAnalysisResult::failure`].
    pub fn analyze(&self, content: &str) -> SecurityAnalysisResult {
        match self.try_analyze(content) {
            Ok(result) => result,
            Err(err) => {
                error!(?err, "Security analysis failed");
                SecurityAnalysisResult::failure(err.to_string())
            }
        }
    }

    pub(crate) fn try_analyze(&self, content: &str) -> Result<SecurityAnalysisResult, GuardError> {
        let max = self.sanitizer.config().max_analysis_length;
        if content.len() > max {
            return Err(GuardError::InputTooLarge {
                max,
                actual: content.len(),
            });
        }

        let threats = self.detect(content);
        let sanitized_content = self.aggressive_sanitize(content, &threats)?;
        let is_safe = !threats
            .iter()
            .any(|threat| threat.threat_level.is_blocking());

        if !threats.is_empty() {
            let summary = threats
                .iter()
                .map(|threat| format!("{}({})", threat.threat_type, threat.threat_level))
                .collect::<Vec<_>>()
                .join(", ");
            warn!(%summary, "Security threats detected");
        }

        Ok(SecurityAnalysisResult {
            score: score(&threats),
            recommendations: recommendations(&threats),
            csp_violations: self.csp_violations(content),
            threats,
            sanitized_content,
            is_safe,
            error: None,
        })
    }

    /// Runs every category over `content`.
    ///
    /// Within one category, a match overlapping an earlier match (from the
    /// same or another pattern) describes the same construct and is not
    /// reported again. Threats are ordered by category, then by position.
    fn detect(&self, content: &str) -> Vec<SecurityThreat> {
        let mut threats = Vec::new();
        for compiled in &self.categories {
            let mut seen = SpanSet::default();
            let mut found = Vec::new();
            for pattern in &compiled.detect {
                for m in pattern.find_iter(content) {
                    if seen.insert(m.start(), m.end()) {
                        let span = Span {
                            start: m.start(),
                            end: m.end(),
                        };
                        found.push(SecurityThreat::new(compiled.category, m.as_str(), span));
                    }
                }
            }
            found.sort_by_key(|threat| threat.location.start);
            threats.extend(found);
        }
        threats
    }

    fn aggressive_sanitize(
        &self,
        content: &str,
        threats: &[SecurityThreat],
    ) -> Result<String, GuardError> {
        let mut sanitized = self
            .sanitizer
            .try_sanitize(content, ContentType::General)?
            .cleaned_content;

        for compiled in &self.categories {
            let blocking = threats.iter().any(|threat| {
                threat.threat_type == compiled.category && threat.threat_level.is_blocking()
            });
            if !blocking {
                continue;
            }
            for strip in &compiled.strip {
                sanitized = strip.replace_all(&sanitized, "").into_owned();
            }
        }
        Ok(sanitized)
    }

    /// Heuristic predictions of which CSP directives `content` would trip.
    pub fn csp_violations(&self, content: &str) -> Vec<String> {
        self.csp_checks
            .iter()
            .filter(|(check, _)| check.is_match(content))
            .map(|(_, message)| (*message).to_owned())
            .collect()
    }

    /// Names of the attribute checks that match `content`.
    pub fn dangerous_attributes(&self, content: &str) -> Vec<&'static str> {
        self.attribute_checks
            .iter()
            .filter(|(_, check)| check.is_match(content))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Analyzes `content` and renders the text report.
    pub fn report(&self, content: &str, content_type: ContentType) -> String {
        render_report(&self.analyze(content), content_type, Utc::now())
    }
}

/// Non-overlapping byte ranges keyed by start offset.
#[derive(Default)]
struct SpanSet(BTreeMap<usize, usize>);

impl SpanSet {
    /// Records `[start, end)` unless it overlaps a recorded range.
    fn insert(&mut self, start: usize, end: usize) -> bool {
        let overlaps = self
            .0
            .range(..end.max(start + 1))
            .next_back()
            .is_some_and(|(_, &prev_end)| prev_end > start);
        if overlaps {
            return false;
        }
        self.0.insert(start, end);
        true
    }
}

fn score(threats: &[SecurityThreat]) -> u8 {
    let penalty: u32 = threats
        .iter()
        .map(|threat| threat.threat_level.penalty())
        .sum();
    u8::try_from(MAX_SCORE.saturating_sub(penalty)).unwrap_or(0)
}

fn recommendations(threats: &[SecurityThreat]) -> Vec<String> {
    if threats.is_empty() {
        return vec!["Content appears secure - no threats detected".to_owned()];
    }

    let mut lines = Vec::new();
    if threats
        .iter()
        .any(|threat| threat.threat_level == ThreatLevel::Critical)
    {
        lines.push(
            "URGENT: Critical security threats detected - immediate action required".to_owned(),
        );
    }

    for category in ThreatCategory::ALL {
        let count = threats
            .iter()
            .filter(|threat| threat.threat_type == category)
            .count();
        if count > 0 {
            lines.push(format!("Address {count} {} issues", category.label()));
        }
    }

    if threats
        .iter()
        .any(|threat| threat.threat_level == ThreatLevel::High)
    {
        lines.push("High-priority security issues require prompt attention".to_owned());
    }

    lines.extend(STANDING_RECOMMENDATIONS.iter().map(|line| (*line).to_owned()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SanitizerConfig;
    use assert_matches::assert_matches;

    fn analyzer() -> SecurityAnalyzer {
        let sanitizer = ContentSanitizer::new(SanitizerConfig::default()).unwrap();
        SecurityAnalyzer::new(sanitizer).unwrap()
    }

    #[test]
    fn test_clean_content_scores_100() {
        let result = analyzer().analyze("<p>A harmless paragraph about gardening.</p>");
        assert!(result.threats.is_empty());
        assert_eq!(result.score, 100);
        assert!(result.is_safe);
        assert_eq!(
            result.recommendations,
            vec!["Content appears secure - no threats detected".to_owned()]
        );
        assert!(result.csp_violations.is_empty());
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_single_script_is_one_critical_threat() {
        let result = analyzer().analyze(r#"Hello <script>alert("XSS")</script> world"#);
        assert_eq!(result.threats.len(), 1);
        let threat = &result.threats[0];
        assert_eq!(threat.threat_type(), ThreatCategory::ScriptTags);
        assert_eq!(threat.threat_level(), ThreatLevel::Critical);
        assert_eq!(threat.location(), Span { start: 6, end: 35 });
        assert_eq!(threat.location().to_string(), "Position 6-35");
        assert_eq!(result.score, 60);
        assert!(!result.is_safe);
        assert!(!result.sanitized_content.to_lowercase().contains("script"));
        assert_eq!(
            result.recommendations[0],
            "URGENT: Critical security threats detected - immediate action required"
        );
        assert_eq!(result.recommendations[1], "Address 1 script tags issues");
        assert_eq!(
            result.csp_violations,
            vec!["Inline scripts violate script-src 'self' policy".to_owned()]
        );
    }

    #[test]
    fn test_onclick_is_one_high_threat() {
        let result = analyzer().analyze(r#"<div onclick="alert(1)">Click</div>"#);
        assert_eq!(result.threats.len(), 1);
        assert_eq!(result.threats[0].threat_type(), ThreatCategory::EventHandlers);
        assert_eq!(result.threats[0].threat_level(), ThreatLevel::High);
        assert!(!result.is_safe);
        assert!(result.score <= 75);
        assert!(
            result
                .recommendations
                .contains(&"High-priority security issues require prompt attention".to_owned())
        );
        assert_eq!(result.sanitized_content, "Click");
    }

    #[test]
    fn test_every_match_is_penalized() {
        let result = analyzer().analyze("<script>a</script> and <script>b</script>");
        assert_eq!(result.count(ThreatLevel::Critical), 2);
        assert_eq!(result.score, 20);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let payload = "<script>x</script>".repeat(5);
        let result = analyzer().analyze(&payload);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_medium_and_low_threats_keep_content_safe() {
        let result = analyzer().analyze("<form action=\"/subscribe\">Sign up</form> 100%25 off");
        assert!(result.is_safe);
        assert_eq!(result.count(ThreatLevel::Medium), 1);
        assert_eq!(result.count(ThreatLevel::Low), 1);
        assert_eq!(result.score, 80);
    }

    #[test]
    fn test_pattern_excerpt_is_capped() {
        let payload = format!("<script>{}</script>", "x".repeat(300));
        let result = analyzer().analyze(&payload);
        assert_eq!(result.threats[0].pattern().chars().count(), 100);
    }

    #[test]
    fn test_threats_are_immutable_values() {
        let result = analyzer().analyze("document.cookie");
        let threat = result.threats[0].clone();
        assert_eq!(threat.threat_type(), ThreatCategory::DataExfiltration);
        assert_eq!(threat.description(), "Code patterns that may steal user data");
        assert_eq!(threat.remediation(), "Remove data access and network request code");
        assert_eq!(threat.pattern(), "document.cookie");
    }

    #[test]
    fn test_encoded_payloads_are_flagged_not_decoded() {
        let result = analyzer().analyze("&#60;script&#62;alert(1)&#60;/script&#62;");
        assert!(
            result
                .threats
                .iter()
                .all(|threat| threat.threat_type() == ThreatCategory::EncodedAttacks)
        );
        assert_eq!(result.count(ThreatLevel::Low), 4);
        assert!(result.is_safe);
        assert!(!result.sanitized_content.contains('<'));
    }

    #[test]
    fn test_csp_checks() {
        let result = analyzer().analyze(
            r#"<img src="https://cdn.example.com/a.png" style="color:red"> data:image/png"#,
        );
        assert_eq!(
            result.csp_violations,
            vec![
                "Inline styles may violate style-src policy".to_owned(),
                "Data URLs may violate img-src policy".to_owned(),
                "External resources may violate connect-src policy".to_owned(),
            ]
        );
    }

    #[test]
    fn test_dangerous_attributes() {
        let analyzer = analyzer();
        assert_eq!(
            analyzer.dangerous_attributes(r#"<a href="javascript:x" onmouseover=y>"#),
            vec!["event_attrs", "href_attrs"]
        );
        assert_eq!(
            analyzer.dangerous_attributes(r#"<div style="width: expression(alert(1))">"#),
            vec!["style_attrs"]
        );
        assert!(analyzer.dangerous_attributes("<p>fine</p>").is_empty());
    }

    #[test]
    fn test_oversized_input_fails_closed() {
        let config = SanitizerConfig {
            max_analysis_length: 16,
            ..Default::default()
        };
        let analyzer = SecurityAnalyzer::new(ContentSanitizer::new(config).unwrap()).unwrap();
        assert_matches!(
            analyzer.try_analyze("this is longer than sixteen bytes"),
            Err(GuardError::InputTooLarge { max: 16, .. })
        );
        let result = analyzer.analyze("this is longer than sixteen bytes");
        assert_eq!(result.score, 0);
        assert!(!result.is_safe);
        assert!(result.threats.is_empty());
        assert_eq!(result.sanitized_content, "");
        assert_eq!(
            result.recommendations,
            vec!["Content analysis failed - manual review required".to_owned()]
        );
    }

    #[test]
    fn test_recommended_csp() {
        let csp = recommended_csp();
        assert!(csp.starts_with("script-src 'self' 'unsafe-inline'; "));
        assert!(csp.contains("object-src 'none'"));
        assert!(csp.ends_with("frame-ancestors 'none'"));
    }

    #[test]
    fn test_span_set_rejects_overlaps() {
        let mut set = SpanSet::default();
        assert!(set.insert(10, 20));
        assert!(!set.insert(15, 25));
        assert!(!set.insert(5, 11));
        assert!(!set.insert(12, 14));
        assert!(set.insert(20, 30));
        assert!(set.insert(0, 10));
    }

    #[test]
    fn test_level_ordering() {
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
        assert!(ThreatLevel::High.is_blocking());
        assert!(!ThreatLevel::Medium.is_blocking());
        assert_eq!(
            serde_json::to_string(&ThreatCategory::EventHandlers).unwrap(),
            r#""event_handlers""#
        );
        assert_eq!(serde_json::to_string(&ThreatLevel::Critical).unwrap(), r#""critical""#);
    }
}
