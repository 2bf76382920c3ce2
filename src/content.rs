//! Section content schemas
//!
//! Typed shapes for each generated section, the JSON schema handed to the
//! provider for strict structured output, and the validator that turns a raw
//! provider payload into stored content. Fields outside a section's shape
//! are dropped from the stored content rather than rejected.

use crate::error::ContentRejected;
use crate::types::Section;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewOut {
    pub overview: String,
    #[serde(deserialize_with = "integral")]
    pub reading_time_minutes: i64,
}

/// Integer field that also takes integral floats such as `12.0`.
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => Ok(value as i64),
        _ => Err(D::Error::custom(format!("expected an integer, got {}", number))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyIdeasOut {
    pub key_ideas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterItem {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaptersOut {
    pub chapters: Vec<ChapterItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOut {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub who_should_read: Vec<String>,
}

/// Bounds a parsed section must satisfy beyond its shape.
trait SectionShape: Serialize + DeserializeOwned {
    fn check(&self) -> Result<(), String>;
}

impl SectionShape for OverviewOut {
    fn check(&self) -> Result<(), String> {
        min_chars("overview", &self.overview, 20)?;
        if !(1..=240).contains(&self.reading_time_minutes) {
            return Err(format!(
                "reading_time_minutes must be within 1..=240, got {}",
                self.reading_time_minutes
            ));
        }
        Ok(())
    }
}

impl SectionShape for KeyIdeasOut {
    fn check(&self) -> Result<(), String> {
        item_count("key_ideas", self.key_ideas.len(), 3..=10)
    }
}

impl SectionShape for ChaptersOut {
    fn check(&self) -> Result<(), String> {
        item_count("chapters", self.chapters.len(), 5..=25)?;
        for (index, chapter) in self.chapters.iter().enumerate() {
            min_chars(&format!("chapters[{index}].title"), &chapter.title, 1)?;
            min_chars(&format!("chapters[{index}].summary"), &chapter.summary, 10)?;
        }
        Ok(())
    }
}

impl SectionShape for CritiqueOut {
    fn check(&self) -> Result<(), String> {
        item_count("strengths", self.strengths.len(), 2..=8)?;
        item_count("weaknesses", self.weaknesses.len(), 2..=8)?;
        item_count("who_should_read", self.who_should_read.len(), 2..=8)
    }
}

fn min_chars(field: &str, value: &str, min: usize) -> Result<(), String> {
    let count = value.chars().count();
    if count < min {
        return Err(format!("{field} must have at least {min} characters, got {count}"));
    }
    Ok(())
}

fn item_count(field: &str, len: usize, range: RangeInclusive<usize>) -> Result<(), String> {
    if !range.contains(&len) {
        return Err(format!(
            "{field} must have {}..={} items, got {len}",
            range.start(),
            range.end()
        ));
    }
    Ok(())
}

fn parse_checked<T: SectionShape>(payload: &Value) -> Result<Value, String> {
    let parsed: T = serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
    parsed.check()?;
    serde_json::to_value(&parsed).map_err(|e| e.to_string())
}

/// Checks a parsed provider payload against the schema of its section.
pub trait OutputValidator: Send + Sync {
    /// Returns the normalized content to store, or why it was rejected.
    fn validate(&self, section: Section, payload: &Value) -> Result<Value, ContentRejected>;
}

/// Validator backed by the typed section shapes in this module.
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionSchemaValidator;

impl OutputValidator for SectionSchemaValidator {
    fn validate(&self, section: Section, payload: &Value) -> Result<Value, ContentRejected> {
        let result = match section {
            Section::Overview => parse_checked::<OverviewOut>(payload),
            Section::KeyIdeas => parse_checked::<KeyIdeasOut>(payload),
            Section::Chapters => parse_checked::<ChaptersOut>(payload),
            Section::Critique => parse_checked::<CritiqueOut>(payload),
        };
        result.map_err(|reason| ContentRejected { section, reason })
    }
}

fn string_list(min: usize, max: usize) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "minItems": min,
        "maxItems": max,
    })
}

/// JSON schema describing a section's content.
pub fn section_schema(section: Section) -> Value {
    match section {
        Section::Overview => json!({
            "title": "OverviewOut",
            "type": "object",
            "properties": {
                "overview": { "type": "string", "minLength": 20 },
                "reading_time_minutes": { "type": "integer", "minimum": 1, "maximum": 240 },
            },
            "required": ["overview", "reading_time_minutes"],
        }),
        Section::KeyIdeas => json!({
            "title": "KeyIdeasOut",
            "type": "object",
            "properties": { "key_ideas": string_list(3, 10) },
            "required": ["key_ideas"],
        }),
        Section::Chapters => json!({
            "title": "ChaptersOut",
            "type": "object",
            "properties": {
                "chapters": {
                    "type": "array",
                    "minItems": 5,
                    "maxItems": 25,
                    "items": {
                        "title": "ChapterItem",
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1 },
                            "summary": { "type": "string", "minLength": 10 },
                        },
                        "required": ["title", "summary"],
                    },
                },
            },
            "required": ["chapters"],
        }),
        Section::Critique => json!({
            "title": "CritiqueOut",
            "type": "object",
            "properties": {
                "strengths": string_list(2, 8),
                "weaknesses": string_list(2, 8),
                "who_should_read": string_list(2, 8),
            },
            "required": ["strengths", "weaknesses", "who_should_read"],
        }),
    }
}

/// Section schema in the strict form structured-output providers require.
pub fn strict_section_schema(section: Section) -> Value {
    enforce_no_additional_properties(&section_schema(section))
}

/// Rewrite every object node so it forbids unknown properties and always
/// carries a `required` list. Recurses through all nested values, which
/// covers `properties`, `items`, `$defs` and the combinators.
pub fn enforce_no_additional_properties(schema: &Value) -> Value {
    match schema {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(enforce_no_additional_properties)
                .collect(),
        ),
        Value::Object(node) => {
            let mut normalized: Map<String, Value> = node
                .iter()
                .map(|(key, value)| (key.clone(), enforce_no_additional_properties(value)))
                .collect();
            if normalized.get("type").and_then(Value::as_str) == Some("object") {
                if !normalized.get("properties").is_some_and(Value::is_object) {
                    normalized.insert("properties".to_string(), json!({}));
                }
                normalized
                    .entry("required")
                    .or_insert_with(|| json!([]));
                normalized.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            Value::Object(normalized)
        }
        other => other.clone(),
    }
}
