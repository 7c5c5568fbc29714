//! Record type definitions: field types, field constraints and schemas

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::registry::EntityKind;

/// Field holding the generated record identifier
pub const ID_FIELD: &str = "_id";
/// Timestamp set once on insert for timestamped record types
pub const CREATED_AT: &str = "createdAt";
/// Timestamp refreshed on every write for timestamped record types
pub const UPDATED_AT: &str = "updatedAt";

/// Storage type of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Instant in time, stored as an RFC 3339 UTC string
    Date,
    /// Identifier of another record
    ObjectId,
    /// Opaque JSON object, stored as given
    Object,
    Array(Box<FieldType>),
}

impl FieldType {
    /// Short name used in CLI output and error messages
    pub fn label(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::ObjectId => "object_id".to_string(),
            FieldType::Object => "object".to_string(),
            FieldType::Array(inner) => format!("[{}]", inner.label()),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }
}

/// Value filled in when a field is omitted at creation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefault {
    Value(Value),
    /// Creation time of the record
    Now,
    EmptyArray,
}

impl FieldDefault {
    pub fn resolve(&self, now: DateTime<Utc>) -> Value {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Now => Value::String(crate::validate::format_date(now)),
            FieldDefault::EmptyArray => Value::Array(Vec::new()),
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<&'static str>>,
    /// Record type the identifier(s) in this field point at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<EntityKind>,
}

impl FieldDef {
    fn of(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
            unique: false,
            default: None,
            enum_values: None,
            reference: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::of(name, FieldType::String)
    }

    pub fn number(name: &'static str) -> Self {
        Self::of(name, FieldType::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::of(name, FieldType::Boolean)
    }

    pub fn date(name: &'static str) -> Self {
        Self::of(name, FieldType::Date)
    }

    pub fn object(name: &'static str) -> Self {
        Self::of(name, FieldType::Object)
    }

    /// Reference to a single record of `target`
    pub fn reference(name: &'static str, target: EntityKind) -> Self {
        Self {
            reference: Some(target),
            ..Self::of(name, FieldType::ObjectId)
        }
    }

    /// List of references to records of `target`, empty by default
    pub fn references(name: &'static str, target: EntityKind) -> Self {
        Self {
            reference: Some(target),
            default: Some(FieldDefault::EmptyArray),
            ..Self::of(name, FieldType::Array(Box::new(FieldType::ObjectId)))
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(FieldDefault::Value(value));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = Some(values.to_vec());
        self
    }

    pub fn allows(&self, value: &str) -> bool {
        match &self.enum_values {
            Some(values) => values.contains(&value),
            None => true,
        }
    }
}

/// A reference field as seen from its owning record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub field: &'static str,
    pub target: EntityKind,
    pub many: bool,
}

/// Structural contract of one record type
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub name: &'static str,
    #[serde(skip)]
    pub kind: EntityKind,
    pub fields: Vec<FieldDef>,
    /// Maintain `createdAt` / `updatedAt` automatically
    pub timestamps: bool,
}

impl Schema {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            name: kind.name(),
            kind,
            fields: Vec::new(),
            timestamps: false,
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Look up a declared field
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn references(&self) -> Vec<ReferenceField> {
        self.fields
            .iter()
            .filter_map(|f| {
                f.reference.map(|target| ReferenceField {
                    field: f.name,
                    target,
                    many: f.field_type.is_array(),
                })
            })
            .collect()
    }

    /// Fields the store manages rather than the caller
    pub fn is_system_field(&self, name: &str) -> bool {
        name == ID_FIELD || (self.timestamps && (name == CREATED_AT || name == UPDATED_AT))
    }
}
