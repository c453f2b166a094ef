//! Plain-text rendering of a [`SecurityAnalysisResult`].

use core::fmt::Write as _;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::config::ContentType;
use crate::security::SecurityAnalysisResult;

/// Renders the human-readable security report.
///
/// Sections appear in a fixed order: header, score, threat summary, CSP
/// violations (omitted when there are none) and recommendations.
pub fn render_report(
    result: &SecurityAnalysisResult,
    content_type: ContentType,
    analyzed_at: DateTime<Utc>,
) -> String {
    let mut report = String::new();
    if let Err(err) = write_report(&mut report, result, content_type, analyzed_at) {
        error!(?err, "Failed to render security report");
    }
    report
}

fn write_report(
    out: &mut String,
    result: &SecurityAnalysisResult,
    content_type: ContentType,
    analyzed_at: DateTime<Utc>,
) -> fmt::Result {
    writeln!(out, "SECURITY ANALYSIS REPORT")?;
    writeln!(out, "========================")?;
    writeln!(out, "Content Type: {}", title_case(content_type.as_str()))?;
    writeln!(out, "Analysis Date: {}", analyzed_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out)?;
    writeln!(out, "SECURITY SCORE: {}/100", result.score)?;
    writeln!(out)?;
    writeln!(out, "THREAT SUMMARY:")?;

    if result.threats.is_empty() {
        writeln!(out, "No security threats detected.")?;
    }
    for threat in &result.threats {
        writeln!(
            out,
            "- {}: {}",
            title_case(&threat.threat_type().label()),
            threat.threat_level().as_str().to_uppercase()
        )?;
        writeln!(out, "  Description: {}", threat.description())?;
        writeln!(out, "  Location: {}", threat.location())?;
        writeln!(out, "  Remediation: {}", threat.remediation())?;
    }

    if !result.csp_violations.is_empty() {
        writeln!(out)?;
        writeln!(out, "CSP VIOLATIONS:")?;
        for violation in &result.csp_violations {
            writeln!(out, "- {violation}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "RECOMMENDATIONS:")?;
    for line in &result.recommendations {
        writeln!(out, "- {line}")?;
    }
    Ok(())
}

/// Upper-cases the first letter of every alphabetic run.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
