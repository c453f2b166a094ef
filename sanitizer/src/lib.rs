//! Content sanitization and threat analysis for user-submitted text and HTML.
//!
//! - [`ContentSanitizer`] cleans one value under a [`ContentType`] policy.
//! - [`ModelValidator`] applies the sanitizer across a record's fields.
//! - [`SecurityAnalyzer`] scores content against a table of attack patterns.
//!
//! All three are built once from a [`SanitizerConfig`] and are read-only
//! afterwards, so they can be shared freely between threads.

pub mod config;
mod content;
pub mod error;
mod html;
mod model;
mod pattern;
mod report;
mod security;
pub mod validation;

pub use config::{ContentType, SanitizerConfig};
pub use content::ContentSanitizer;
pub use error::GuardError;
pub use model::{BoundedField, ListField, ModelValidator, Record, RecordSchema};
pub use report::render_report;
pub use security::{
    RECOMMENDED_CSP, SecurityAnalysisResult, SecurityAnalyzer, SecurityThreat, Span,
    ThreatCategory, ThreatLevel, recommended_csp,
};
pub use validation::{ValidationError, ValidationResult};

/// Builds the sanitizer, record validator and analyzer from one configuration.
pub fn build_engines(
    config: SanitizerConfig,
) -> Result<(ModelValidator, SecurityAnalyzer), GuardError> {
    let sanitizer = ContentSanitizer::new(config)?;
    let analyzer = SecurityAnalyzer::new(sanitizer.clone())?;
    Ok((ModelValidator::new(sanitizer), analyzer))
}
