//! Write-time validation of documents against a record type
//!
//! Values are cast to their declared field type first (numeric strings become
//! numbers, date literals become RFC 3339 strings, ...), then checked for
//! presence and enum membership. Every failed field is reported.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::config::UnknownFieldPolicy;
use crate::error::{Result, SchemaError, Violation, ViolationKind};
use crate::id::RecordId;
use crate::schema::{FieldDef, FieldType, Schema, ID_FIELD};

/// A stored or to-be-stored record: field name to JSON value
pub type Document = Map<String, Value>;

/// Whether a write creates a record or rewrites an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Defaults are applied to omitted fields
    Create,
    /// The document is the full merged record; defaults are not re-applied
    Update,
}

/// Render an instant the way date fields are stored
pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn date_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static pattern"))
}

fn cast_date(value: &Value) -> Option<Value> {
    let at = match value {
        Value::String(s) if date_only_pattern().is_match(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        Value::Number(n) => {
            let millis = match n.as_i64() {
                Some(i) => i,
                None => n.as_f64().filter(|f| f.is_finite())?.trunc() as i64,
            };
            DateTime::from_timestamp_millis(millis)?
        }
        _ => return None,
    };
    // Stored dates must stay four-digit-year RFC 3339
    if !(0..=9999).contains(&at.year()) {
        return None;
    }
    Some(Value::String(format_date(at)))
}

fn cast_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        _ => None,
    }
}

/// Cast a raw value to `field_type`, `None` when it cannot be represented
pub fn cast(field_type: &FieldType, value: &Value) -> Option<Value> {
    match field_type {
        FieldType::String => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Number => cast_number(value),
        FieldType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Date => cast_date(value),
        FieldType::ObjectId => match value {
            Value::String(s) => RecordId::parse(s).ok().map(Value::from),
            _ => None,
        },
        FieldType::Object => value.is_object().then(|| value.clone()),
        FieldType::Array(inner) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| cast(inner, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            scalar => cast(inner, scalar).map(|v| Value::Array(vec![v])),
        },
    }
}

fn is_blank(field: &FieldDef, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => field.field_type == FieldType::String && s.is_empty(),
        _ => false,
    }
}

/// Validates documents for one record type
pub struct Validator<'a> {
    schema: &'a Schema,
    policy: UnknownFieldPolicy,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema, policy: UnknownFieldPolicy) -> Self {
        Self { schema, policy }
    }

    /// Cast and check `doc`, returning the document to store
    ///
    /// `_id` is cast and passed through. The timestamps of timestamped types
    /// are left out; the store sets them.
    pub fn validate(&self, doc: &Document, mode: WriteMode, now: DateTime<Utc>) -> Result<Document> {
        let mut out = Document::new();
        let mut violations = Vec::new();

        for (key, value) in doc {
            if self.schema.is_system_field(key) {
                if key != ID_FIELD || value.is_null() {
                    continue;
                }
                let field_type = FieldType::ObjectId;
                match cast(&field_type, value) {
                    Some(v) => {
                        out.insert(key.clone(), v);
                    }
                    None => violations.push(Violation::new(
                        key.as_str(),
                        ViolationKind::Type,
                        format!("expected {}, got {}", field_type.label(), value),
                    )),
                }
            } else if self.schema.get_field(key).is_none() {
                match self.policy {
                    UnknownFieldPolicy::Drop => {
                        debug!(entity = self.schema.name, field = %key, "dropping undeclared field");
                    }
                    UnknownFieldPolicy::Reject => violations.push(Violation::new(
                        key.as_str(),
                        ViolationKind::Unknown,
                        "field is not declared on this record type",
                    )),
                }
            }
        }

        for field in &self.schema.fields {
            match doc.get(field.name).filter(|v| !v.is_null()) {
                Some(raw) => match cast(&field.field_type, raw) {
                    Some(value) if field.required && is_blank(field, &value) => {
                        violations.push(Violation::new(field.name, ViolationKind::Required, "is required"));
                    }
                    Some(value) => match check_enum(field, &value) {
                        Some(violation) => violations.push(violation),
                        None => {
                            out.insert(field.name.to_string(), value);
                        }
                    },
                    None => violations.push(Violation::new(
                        field.name,
                        ViolationKind::Type,
                        format!("expected {}, got {}", field.field_type.label(), raw),
                    )),
                },
                None => match (&field.default, mode) {
                    (Some(default), WriteMode::Create) => {
                        out.insert(field.name.to_string(), default.resolve(now));
                    }
                    _ if field.required => {
                        violations.push(Violation::new(field.name, ViolationKind::Required, "is required"));
                    }
                    _ => {}
                },
            }
        }

        if violations.is_empty() {
            Ok(out)
        } else {
            Err(SchemaError::ConstraintViolation {
                entity: self.schema.name.to_string(),
                violations,
            })
        }
    }
}

fn check_enum(field: &FieldDef, value: &Value) -> Option<Violation> {
    let allowed = field.enum_values.as_ref()?;
    let accepted = match value {
        Value::String(s) => field.allows(s),
        _ => false,
    };
    (!accepted).then(|| {
        Violation::new(
            field.name,
            ViolationKind::Enum,
            format!("{} is not one of [{}]", value, allowed.join(", ")),
        )
    })
}
