//! Error types for the schema registry and record store

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Which declared constraint a write broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field was missing, null or empty
    Required,
    /// A unique field collided with an existing record
    Unique,
    /// An enum field held a value outside its variant set
    Enum,
    /// A value could not be cast to the field type
    Type,
    /// A field not declared on the record type (reject policy only)
    Unknown,
    /// An attempt to change a field that is fixed after creation
    Immutable,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::Required => "required",
            ViolationKind::Unique => "unique",
            ViolationKind::Enum => "enum",
            ViolationKind::Type => "type",
            ViolationKind::Unknown => "unknown",
            ViolationKind::Immutable => "immutable",
        };
        f.write_str(s)
    }
}

/// A single failed field constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ({}): {}", self.field, self.kind, self.message)
    }
}

/// Schema registry errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Constraint violation on {entity}: {}", summarize(.violations))]
    ConstraintViolation {
        entity: String,
        violations: Vec<Violation>,
    },

    #[error("Record not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Unknown record type: {0}")]
    UnknownEntity(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl SchemaError {
    /// Build a constraint violation carrying a single failed field
    pub fn violation(
        entity: impl Into<String>,
        field: impl Into<String>,
        kind: ViolationKind,
        message: impl Into<String>,
    ) -> Self {
        SchemaError::ConstraintViolation {
            entity: entity.into(),
            violations: vec![Violation::new(field, kind, message)],
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, SchemaError::ConstraintViolation { .. })
    }

    /// All failed constraints, empty for other error kinds
    pub fn violations(&self) -> &[Violation] {
        match self {
            SchemaError::ConstraintViolation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Kind of the first failed constraint, if this is a violation
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        self.violations().first().map(|v| v.kind)
    }
}
