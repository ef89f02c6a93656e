//! Strict validation of model output
//!
//! Model responses are JSON objects whose fields are checked one by one into
//! [`Checked`]. A field that has the wrong shape becomes `Malformed` and is
//! defaulted to empty by the caller; values are never coerced across types.

use super::ComparisonVerdict;
use crate::text::{extract_year, is_plausible_year, push_unique, scan_emails};
use crate::types::{ParsedFields, PositionalDetails, WorkType};
use serde_json::{Map, Value};
use tracing::warn;

/// Result of validating one output field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checked<T> {
    Valid(T),
    Missing,
    Malformed(String),
}

impl<T: Default> Checked<T> {
    pub fn unwrap_or_default(self) -> T {
        match self {
            Checked::Valid(v) => v,
            Checked::Missing | Checked::Malformed(_) => T::default(),
        }
    }
}

impl<T> Checked<T> {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Checked::Malformed(_))
    }
}

/// Locate the JSON object in a model response
///
/// Tolerates surrounding prose or code fences by taking the outermost braces.
pub fn extract_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub fn check_string(obj: &Map<String, Value>, key: &str) -> Checked<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Checked::Missing,
        Some(Value::String(s)) => Checked::Valid(s.trim().to_string()),
        Some(other) => Checked::Malformed(format!("{} is {}, expected string", key, kind(other))),
    }
}

/// Array of strings; entries are trimmed, blanks and duplicates dropped
pub fn check_string_list(obj: &Map<String, Value>, key: &str) -> Checked<Vec<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Checked::Missing,
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => {
                        push_unique(&mut out, s);
                    }
                    other => {
                        return Checked::Malformed(format!(
                            "{} contains {}, expected strings",
                            key,
                            kind(other)
                        ))
                    }
                }
            }
            Checked::Valid(out)
        }
        Some(other) => Checked::Malformed(format!("{} is {}, expected array", key, kind(other))),
    }
}

/// Year given as a digit string, a number, or the `null` sentinel
pub fn check_year(obj: &Map<String, Value>, key: &str) -> Checked<Option<i32>> {
    match obj.get(key) {
        None | Some(Value::Null) => Checked::Missing,
        Some(Value::String(s)) => {
            if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("null") {
                return Checked::Valid(None);
            }
            match extract_year(s) {
                Some(year) => Checked::Valid(Some(year)),
                None => Checked::Malformed(format!("{} has no plausible year: {:?}", key, s)),
            }
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(year) if is_plausible_year(year) => Checked::Valid(Some(year as i32)),
            _ => Checked::Malformed(format!("{} out of range: {}", key, n)),
        },
        Some(other) => Checked::Malformed(format!("{} is {}, expected year", key, kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collects checked fields, remembering which ones were malformed
struct FieldCollector {
    malformed: Vec<String>,
}

impl FieldCollector {
    fn take<T: Default>(&mut self, field: &str, checked: Checked<T>) -> T {
        if let Checked::Malformed(reason) = &checked {
            warn!("Discarding malformed parser field {}: {}", field, reason);
            self.malformed.push(field.to_string());
        }
        checked.unwrap_or_default()
    }

    fn positional(&mut self, obj: &Map<String, Value>, key: &str) -> PositionalDetails {
        match obj.get(key) {
            None | Some(Value::Null) => PositionalDetails::default(),
            Some(Value::Object(inner)) => PositionalDetails {
                affiliations: self.take(
                    &format!("{}.affiliations", key),
                    check_string_list(inner, "affiliations"),
                ),
                emails: self.take(&format!("{}.emails", key), check_string_list(inner, "emails")),
            },
            Some(other) => {
                self.take::<()>(
                    key,
                    Checked::Malformed(format!("{} is {}, expected object", key, kind(other))),
                );
                PositionalDetails::default()
            }
        }
    }
}

const PARSER_FIELDS: [&str; 4] = ["title", "year", "authors", "emails"];

/// Validate a field-parser response
///
/// Never fails: a response that is not a JSON object yields empty fields with every
/// top-level field marked malformed.
pub fn parse_fields_output(text: &str) -> ParsedFields {
    let Some(obj) = extract_object(text) else {
        warn!("Parser output is not a JSON object; all fields defaulted");
        return ParsedFields {
            malformed: PARSER_FIELDS.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        };
    };

    let mut collector = FieldCollector {
        malformed: Vec::new(),
    };

    let title = collector.take("title", check_string(&obj, "title"));
    let year = collector.take("year", check_year(&obj, "year"));
    let authors = collector.take("authors", check_string_list(&obj, "authors"));
    let emails = collector
        .take("emails", check_string_list(&obj, "emails"))
        .into_iter()
        .filter(|e| !scan_emails(e).is_empty())
        .collect();
    let first_author = collector.positional(&obj, "first_author");
    let last_author = collector.positional(&obj, "last_author");

    ParsedFields {
        title,
        year,
        authors,
        emails,
        first_author,
        last_author,
        malformed: collector.malformed,
    }
}

/// Validate a classifier response (`{"work_type": "..."}` or a bare label)
pub fn parse_work_type_output(text: &str) -> WorkType {
    match extract_object(text) {
        Some(obj) => match check_string(&obj, "work_type") {
            Checked::Valid(label) => WorkType::from_label(&label),
            _ => WorkType::Unknown,
        },
        None => WorkType::from_label(text),
    }
}

/// Validate a comparator response
///
/// Anything unparseable is "no match" with a rationale saying why.
pub fn parse_verdict_output(text: &str) -> ComparisonVerdict {
    let Some(obj) = extract_object(text) else {
        return ComparisonVerdict {
            chosen_id: None,
            rationale: "comparison output unparseable".to_string(),
        };
    };

    let rationale = check_string(&obj, "rationale").unwrap_or_default();
    match check_string(&obj, "chosen_id") {
        Checked::Valid(id) if !id.is_empty() && !id.eq_ignore_ascii_case("none") => {
            ComparisonVerdict {
                chosen_id: Some(id),
                rationale,
            }
        }
        Checked::Valid(_) | Checked::Missing => ComparisonVerdict {
            chosen_id: None,
            rationale,
        },
        Checked::Malformed(reason) => ComparisonVerdict {
            chosen_id: None,
            rationale: format!("comparison output malformed: {}", reason),
        },
    }
}
