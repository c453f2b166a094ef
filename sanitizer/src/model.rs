//! Record-level validation on top of [`ContentSanitizer`].
//!
//! A [`RecordSchema`] lists which fields of a JSON object are required and
//! which policy each field is cleaned under. [`ModelValidator`] applies a
//! schema and returns the cleaned record with every field's diagnostics
//! merged into one [`ValidationResult`].

use serde_json::{Map, Number, Value};
use tracing::{error, warn};

use crate::config::ContentType;
use crate::content::ContentSanitizer;
use crate::error::GuardError;
use crate::validation::ValidationResult;

pub type Record = Map<String, Value>;

/// An integer field clamped into `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedField {
    pub field: String,
    /// Human-readable name used in messages, e.g. `Read time`.
    pub label: String,
    pub unit: String,
    pub min: i64,
    pub max: i64,
}

/// A list of short values, each cleaned under `entry_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListField {
    pub field: String,
    pub label: String,
    pub entry_type: ContentType,
    pub max_entries: usize,
}

/// Describes how each field of a record is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSchema {
    required: Vec<String>,
    text_fields: Vec<(String, ContentType)>,
    url_fields: Vec<String>,
    bounded_fields: Vec<BoundedField>,
    list_fields: Vec<ListField>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, fields: &[&str]) -> Self {
        self.required
            .extend(fields.iter().map(|field| (*field).to_owned()));
        self
    }

    pub fn text(mut self, field: &str, content_type: ContentType) -> Self {
        self.text_fields.push((field.to_owned(), content_type));
        self
    }

    /// A link that is blanked, not removed, when it fails the URL policy.
    pub fn url(mut self, field: &str) -> Self {
        self.url_fields.push(field.to_owned());
        self
    }

    pub fn bounded(mut self, field: BoundedField) -> Self {
        self.bounded_fields.push(field);
        self
    }

    pub fn list(mut self, field: ListField) -> Self {
        self.list_fields.push(field);
        self
    }

    /// Articles: headline, body, metadata, reading time and up to ten tags.
    pub fn article() -> Self {
        Self::new()
            .require(&["title", "slug", "content", "author_id", "category_id"])
            .text("title", ContentType::Title)
            .text("subtitle", ContentType::Subtitle)
            .text("content", ContentType::ArticleContent)
            .text("meta_description", ContentType::Description)
            .text("slug", ContentType::Slug)
            .bounded(BoundedField {
                field: "read_time".to_owned(),
                label: "Read time".to_owned(),
                unit: "minutes".to_owned(),
                min: 1,
                max: 120,
            })
            .list(ListField {
                field: "tags".to_owned(),
                label: "tags".to_owned(),
                entry_type: ContentType::Name,
                max_entries: 10,
            })
    }

    /// Authors: profile text, contact address and social links.
    pub fn author() -> Self {
        Self::new()
            .require(&["name", "slug"])
            .text("name", ContentType::Name)
            .text("title", ContentType::Name)
            .text("bio", ContentType::Bio)
            .text("location", ContentType::Name)
            .text("expertise", ContentType::Description)
            .text("slug", ContentType::Slug)
            .text("email", ContentType::Email)
            .url("twitter")
            .url("linkedin")
            .url("instagram")
            .url("website")
    }
}

/// Validates whole records.
#[derive(Debug, Clone)]
pub struct ModelValidator {
    sanitizer: ContentSanitizer,
}

impl ModelValidator {
    pub fn new(sanitizer: ContentSanitizer) -> Self {
        Self { sanitizer }
    }

    pub fn sanitizer(&self) -> &ContentSanitizer {
        &self.sanitizer
    }

    pub fn validate_article(&self, record: &Record) -> ValidationResult<Record> {
        self.validate(record, &RecordSchema::article())
    }

    pub fn validate_author(&self, record: &Record) -> ValidationResult<Record> {
        self.validate(record, &RecordSchema::author())
    }

    /// Validates `record` against an ad-hoc field policy map.
    pub fn validate_fields(
        &self,
        record: &Record,
        policies: &[(&str, ContentType)],
        required: &[&str],
    ) -> ValidationResult<Record> {
        let schema = policies
            .iter()
            .fold(RecordSchema::new().require(required), |schema, (field, content_type)| {
                schema.text(field, *content_type)
            });
        self.validate(record, &schema)
    }

    /// Validates `record` against `schema`.
    ///
    /// Fields the schema does not mention are copied through unchanged. An
    /// internal failure yields an invalid result holding the original record.
    pub fn validate(&self, record: &Record, schema: &RecordSchema) -> ValidationResult<Record> {
        match self.try_validate(record, schema) {
            Ok(result) => {
                if !result.is_valid {
                    warn!(errors = ?result.errors, "Record failed validation");
                }
                result
            }
            Err(err) => {
                error!(?err, "Record validation failed");
                ValidationResult::failure(record.clone(), format!("Validation failed: {err}"))
            }
        }
    }

    fn try_validate(
        &self,
        record: &Record,
        schema: &RecordSchema,
    ) -> Result<ValidationResult<Record>, GuardError> {
        let mut cleaned = record.clone();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in &schema.required {
            if record.get(field).is_none_or(is_falsy) {
                errors.push(format!("Required field '{field}' is missing"));
            }
        }

        for (field, content_type) in &schema.text_fields {
            let Some(value) = present(record, field) else {
                continue;
            };
            let result = self.sanitizer.try_sanitize(&text_of(value)?, *content_type)?;
            cleaned.insert(field.clone(), Value::String(result.cleaned_content));
            errors.extend(result.errors);
            warnings.extend(result.warnings);
        }

        for field in &schema.url_fields {
            let Some(value) = present(record, field) else {
                continue;
            };
            let result = self.sanitizer.try_sanitize(&text_of(value)?, ContentType::Url)?;
            let link = if result.is_valid {
                result.cleaned_content
            } else {
                warnings.push(format!("Invalid {field} link was cleared"));
                String::new()
            };
            cleaned.insert(field.clone(), Value::String(link));
            errors.extend(result.errors);
            warnings.extend(result.warnings);
        }

        for bounded in &schema.bounded_fields {
            let Some(value) = record.get(&bounded.field) else {
                continue;
            };
            match as_integer(value) {
                Some(number) => {
                    if number < bounded.min || number > bounded.max {
                        warnings.push(format!(
                            "{} should be between {}-{} {}",
                            bounded.label, bounded.min, bounded.max, bounded.unit
                        ));
                    }
                    let clamped = number.clamp(bounded.min, bounded.max);
                    cleaned.insert(bounded.field.clone(), Value::Number(Number::from(clamped)));
                }
                None => errors.push(format!("{} must be a valid number", bounded.label)),
            }
        }

        for list in &schema.list_fields {
            let Some(value) = record.get(&list.field).filter(|value| !value.is_null()) else {
                continue;
            };
            let Some(entries) = list_entries(value) else {
                errors.push(format!("{} must be a list or a comma-separated string", list.field));
                continue;
            };

            let mut kept = Vec::new();
            let mut dropped = 0;
            for entry in entries.iter().take(list.max_entries) {
                let result = self.sanitizer.try_sanitize(&text_of(entry)?, list.entry_type)?;
                if result.is_valid && !result.cleaned_content.is_empty() {
                    kept.push(Value::String(result.cleaned_content));
                } else {
                    dropped += 1;
                }
            }
            cleaned.insert(list.field.clone(), Value::Array(kept));

            if entries.len() > list.max_entries {
                warnings.push(format!(
                    "Only first {} {} were kept",
                    list.max_entries, list.label
                ));
            }
            if dropped > 0 {
                warnings.push(format!("Dropped {dropped} invalid {}", list.label));
            }
        }

        Ok(ValidationResult::new(cleaned, errors, warnings))
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|value| !is_falsy(value))
}

fn text_of(value: &Value) -> Result<String, GuardError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts an array, a JSON-encoded array string or a comma-separated string.
fn list_entries(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => Some(items),
            _ => Some(
                text.split(',')
                    .map(|entry| Value::String(entry.trim().to_owned()))
                    .collect(),
            ),
        },
        _ => None,
    }
}
