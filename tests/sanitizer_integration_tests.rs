use once_cell::sync::Lazy;
use regex::Regex;
use sanitizer::validation::{DANGEROUS_SCHEMES, validate_href};
use sanitizer::{ContentSanitizer, ContentType, SanitizerConfig};
use std::time::{Duration, Instant};

static SANITIZER: Lazy<ContentSanitizer> =
    Lazy::new(|| ContentSanitizer::new(SanitizerConfig::default()).unwrap());

/// Anything a browser would open as an element: `<name ... >`.
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*/?\s*([A-Za-z][A-Za-z0-9]*)[^>]*>").unwrap());

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").unwrap());

/// Payloads that try to survive a single removal pass.
const NESTED_AND_ENCODED: [&str; 12] = [
    "<scr<script>ipt>alert(1)</script>",
    "<<script>script>alert(1)<</script>/script>",
    "<scr<script></script>ipt>alert(1)</script>",
    "java<b>script:alert(1)",
    "<a href=\"java<b>script:alert(1)\">x</a>",
    "jav&#x61;script:alert(1)",
    "<a href=\"jav&#x61;script:alert(1)\">x</a>",
    "<a href=\"%6A%61vascript:alert(1)\">x</a>",
    "<img src=x onerror=alert(1)>",
    "<svg/onload=alert(1)>",
    "<a href=\"java\tscript:alert(1)\">x</a>",
    "<iframe src=\"data:text/html,<script>alert(1)</script>\"></iframe>",
];

fn assert_neutralized(input: &str, output: &str) {
    let config = SanitizerConfig::default();
    for caps in TAG.captures_iter(output) {
        assert!(
            config.is_allowed_tag(&caps[1]),
            "{input:?} left disallowed tag {:?} in {output:?}",
            &caps[1]
        );
    }
    let lowered = output.to_lowercase();
    for needle in ["<script", "javascript:", "vbscript:", "data:"] {
        assert!(
            !lowered.contains(needle),
            "{input:?} left {needle:?} in {output:?}"
        );
    }
    assert!(
        !EVENT_HANDLER.is_match(output),
        "{input:?} left an event handler in {output:?}"
    );
}

#[cfg(test)]
mod sanitizer_integration_tests {

    use super::*;

    // === Scenarios ===

    #[test]
    fn test_script_scenario() {
        let result =
            SANITIZER.sanitize(r#"Hello <script>alert("XSS")</script> world"#, ContentType::General);

        assert!(!result.is_valid);
        assert!(!result.cleaned_content.to_lowercase().contains("script"));
        assert!(!result.errors.is_empty());
        assert!(
            result
                .warnings
                .iter()
                .any(|warning| warning.contains("removed"))
        );
    }

    #[test]
    fn test_truncation_scenario() {
        let result = SANITIZER.sanitize(&"x".repeat(100_000), ContentType::General);

        assert!(!result.is_valid);
        assert_eq!(result.cleaned_content.len(), 50_000);
        assert!(
            result
                .errors
                .iter()
                .any(|err| err.contains("exceeds maximum length"))
        );
        assert!(result.warnings.iter().any(|warning| warning.contains("truncated")));
    }

    #[test]
    fn test_slug_scenarios() {
        assert_eq!(
            SANITIZER.sanitize("Hello World", ContentType::Slug).cleaned_content,
            "hello-world"
        );
        assert_eq!(
            SANITIZER
                .sanitize("--leading-trailing--", ContentType::Slug)
                .cleaned_content,
            "leading-trailing"
        );
    }

    #[test]
    fn test_email_scenarios() {
        assert!(!SANITIZER.sanitize("user@domain.com.", ContentType::Email).is_valid);
        assert!(
            SANITIZER
                .sanitize("user.name@domain.co.uk", ContentType::Email)
                .is_valid
        );
    }

    #[test]
    fn test_url_is_normalized() {
        let result = SANITIZER.sanitize("HTTPS://Example.COM", ContentType::Url);
        assert!(result.is_valid);
        assert_eq!(result.cleaned_content, "https://example.com/");
    }

    #[test]
    fn test_validity_matches_errors() {
        let inputs = [
            ("fine text", ContentType::General),
            ("<script>x</script>", ContentType::General),
            ("Hi", ContentType::Title),
            ("not-an-email", ContentType::Email),
            ("https://ok.example", ContentType::Url),
        ];
        for (input, content_type) in inputs {
            let result = SANITIZER.sanitize(input, content_type);
            assert_eq!(result.is_valid, result.errors.is_empty(), "{input:?}");
        }
    }

    // === Properties ===

    #[test]
    fn test_sanitize_is_idempotent() {
        let corpus = [
            "Plain text with   spacing",
            "<p>Para <em>emph</em></p><ul><li>one</li></ul>",
            r#"<a href="https://example.com/?q=1&x=2">link</a>"#,
            r#"<div onclick="evil()">x</div><iframe src="//evil"></iframe>"#,
            "<scr<script>ipt>alert(1)</script>",
            "<H1 class='big'>Title</H1>\n\n<br/>",
        ];
        for input in corpus {
            let once = SANITIZER.sanitize(input, ContentType::General).cleaned_content;
            let twice = SANITIZER.sanitize(&once, ContentType::General).cleaned_content;
            assert_eq!(once, twice, "{input:?}");
        }
    }

    #[test]
    fn test_output_only_contains_allowed_tags() {
        let corpus = [
            "<div><span>text</span></div>",
            "<table><tr><td>cell</td></tr></table>",
            "<P>upper</P><STRONG>bold</STRONG>",
            "<style>body{}</style><em>ok</em>",
            "<a href='/x' <img src=x>>",
        ];
        for input in corpus.iter().chain(NESTED_AND_ENCODED.iter()) {
            let output = SANITIZER.sanitize(input, ContentType::General).cleaned_content;
            let config = SanitizerConfig::default();
            for caps in TAG.captures_iter(&output) {
                assert!(config.is_allowed_tag(&caps[1]), "{input:?} -> {output:?}");
            }
        }
    }

    #[test]
    fn test_href_validator_never_returns_a_dangerous_scheme() {
        let corpus = [
            "javascript:alert(1)",
            "JAVASCRIPT:alert(1)",
            "  javascript:alert(1)",
            "vbscript:x",
            "data:text/html;base64,PHNjcmlwdD4=",
            "file:///etc/passwd",
            "https://example.com",
            "/relative",
            "#top",
            "mailto:a@b.co",
            "",
        ];
        for href in corpus {
            let out = validate_href(href).trim().to_lowercase();
            for scheme in DANGEROUS_SCHEMES {
                assert!(!out.starts_with(scheme), "{href:?} -> {out:?}");
            }
        }
    }

    // === Nested and encoded payloads ===

    #[test]
    fn test_nested_and_encoded_payloads_are_neutralized() {
        for input in NESTED_AND_ENCODED {
            let result = SANITIZER.sanitize(input, ContentType::General);
            assert_neutralized(input, &result.cleaned_content);
        }
    }

    #[test]
    fn test_nested_payloads_are_reported() {
        for input in [
            "<scr<script>ipt>alert(1)</script>",
            "java<b>script:alert(1)",
            "<img src=x onerror=alert(1)>",
        ] {
            let result = SANITIZER.sanitize(input, ContentType::General);
            assert!(!result.is_valid, "{input:?}");
        }
    }

    #[test]
    fn test_deeply_nested_payload_costs_about_as_much_as_flat_text() {
        let layers = 4_500;
        let nested = format!("{}{}", "java".repeat(layers), "script:".repeat(layers));
        let flat = "x".repeat(nested.len());
        assert!(nested.len() < 50_000);

        let started = Instant::now();
        let flat_result = SANITIZER.sanitize(&flat, ContentType::General);
        let flat_elapsed = started.elapsed();

        let started = Instant::now();
        let nested_result = SANITIZER.sanitize(&nested, ContentType::General);
        let nested_elapsed = started.elapsed();

        assert!(flat_result.is_valid);
        assert_eq!(nested_result.errors.len(), 2, "{:?}", nested_result.errors);
        assert_neutralized(&nested[..40], &nested_result.cleaned_content);
        assert!(
            nested_elapsed < flat_elapsed * 20 + Duration::from_millis(50),
            "nested {nested_elapsed:?} vs flat {flat_elapsed:?}"
        );
    }

    #[test]
    fn test_encoded_schemes_are_dropped_from_links() {
        for input in [
            "<a href=\"jav&#x61;script:alert(1)\">x</a>",
            "<a href=\"%6A%61vascript:alert(1)\">x</a>",
            "<a href=\"java\tscript:alert(1)\">x</a>",
        ] {
            let result = SANITIZER.sanitize(input, ContentType::General);
            assert_eq!(result.cleaned_content, "<a>x</a>", "{input:?}");
        }
    }

    #[test]
    fn test_encoded_text_stays_inert() {
        let result = SANITIZER.sanitize("&lt;script&gt;alert(1)&lt;/script&gt;", ContentType::General);
        assert!(result.is_valid);
        assert_eq!(
            result.cleaned_content,
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    // === Configuration ===

    #[test]
    fn test_custom_allow_list() {
        let config = SanitizerConfig {
            allowed_html_tags: ["p".to_owned()].into_iter().collect(),
            ..Default::default()
        };
        let sanitizer = ContentSanitizer::new(config).unwrap();
        let result = sanitizer.sanitize("<p><strong>bold</strong></p>", ContentType::General);
        assert_eq!(result.cleaned_content, "<p>bold</p>");
    }

    #[test]
    fn test_custom_title_length() {
        let config = SanitizerConfig {
            max_title_length: 10,
            ..Default::default()
        };
        let sanitizer = ContentSanitizer::new(config).unwrap();
        let result = sanitizer.sanitize("A title that is too long", ContentType::Title);
        assert!(!result.is_valid);
        assert_eq!(result.cleaned_content, "A title th");
    }

    // === Concurrency ===

    #[test]
    fn test_shared_sanitizer_across_threads() {
        let expected = SANITIZER
            .sanitize("<b>Hello</b> <script>x</script>", ContentType::General)
            .cleaned_content;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        SANITIZER
                            .sanitize("<b>Hello</b> <script>x</script>", ContentType::General)
                            .cleaned_content
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
