use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::pipeline::processing::diagnostics::{DiagnosticKind, Diagnostics};

/// Level of government a representative sits at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Eu,
    National,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Eu => "eu",
            Level::National => "national",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eu" => Ok(Level::Eu),
            "national" => Ok(Level::National),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// The single reconciled representation of one person across all sources.
///
/// Every schema key is always serialized (absent values as `null`); keys an
/// override introduced outside the schema are carried in `extra` and
/// flattened after them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: String,
    pub source_key: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub level: Option<Level>,
    pub institution: Option<String>,
    pub role: Option<String>,
    pub party: Option<String>,
    pub email: Option<String>,
    pub uses_x: bool,
    pub x_handle: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    /// A record holding nothing but its id
    pub fn stub(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// `usesX == false ⇒ xHandle == null` and `xHandle != null ⇒ usesX`
    pub fn x_fields_consistent(&self) -> bool {
        self.uses_x || self.x_handle.is_none()
    }
}

/// A scalar value as supplied by a source adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Text(String),
}

/// A loosely-typed record from one source. No invariants hold here;
/// normalization exists because these are inconsistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for adapters and tests
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn with_text(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, FieldValue::Text(value.into()))
    }

    pub fn with_bool(self, field: impl Into<String>, value: bool) -> Self {
        self.with(field, FieldValue::Bool(value))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Convert a JSON object into a raw record. Numbers become text; nested
    /// arrays and objects are dropped with a diagnostic.
    pub fn from_json_object(object: Map<String, Value>, source: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut record = RawRecord::new();
        for (field, value) in object {
            let converted = match value {
                Value::Null => FieldValue::Null,
                Value::Bool(b) => FieldValue::Bool(b),
                Value::String(s) => FieldValue::Text(s),
                Value::Number(n) => FieldValue::Text(n.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    diagnostics.record(
                        DiagnosticKind::MalformedInput,
                        None,
                        Some(&field),
                        format!("source '{}': field '{}' is not a scalar, treated as absent", source, field),
                    );
                    continue;
                }
            };
            record.fields.insert(field, converted);
        }
        record
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Trimmed, non-empty text value of a field
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(s)) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// First of `fields` carrying a usable text value
    pub fn first_text<'a>(&'a self, fields: &[String]) -> Option<&'a str> {
        fields.iter().find_map(|f| self.text(f))
    }

    /// Tri-state flag: `Some(true)`, `Some(false)` or absent.
    /// Unrecognized text yields `Err` carrying the offending value.
    pub fn flag(&self, field: &str) -> Result<Option<bool>, String> {
        match self.fields.get(field) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Bool(b)) => Ok(Some(*b)),
            Some(FieldValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "1" | "true" | "yes" => Ok(Some(true)),
                "0" | "false" | "no" => Ok(Some(false)),
                _ => Err(s.clone()),
            },
        }
    }

    /// First of `fields` that is present at all, read as a flag
    pub fn first_flag<'f>(&self, fields: &'f [String]) -> (Option<&'f str>, Result<Option<bool>, String>) {
        for field in fields {
            if self.fields.contains_key(field.as_str()) {
                return (Some(field.as_str()), self.flag(field));
            }
        }
        (None, Ok(None))
    }
}
