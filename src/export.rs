//! JSON Schema export
//!
//! Renders every record type as a draft 7 JSON Schema document describing the
//! stored shape, and writes them out with a checksummed manifest:
//!
//! ```text
//! schemas/
//! ├── User.schema.json
//! ├── Product.schema.json
//! ├── ...
//! └── manifest.json
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use jsonschema::{Draft, JSONSchema};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::checksum::Checksum;
use crate::config::OutputFormat;
use crate::error::{Result, SchemaError};
use crate::registry::{EntityKind, SchemaRegistry};
use crate::schema::{FieldDef, FieldDefault, FieldType, Schema, CREATED_AT, ID_FIELD, UPDATED_AT};

const DRAFT_7: &str = "http://json-schema.org/draft-07/schema#";
const OBJECT_ID_PATTERN: &str = "^[0-9a-fA-F]{24}$";
const SCHEMA_BASE_URL: &str = "https://schemas.storefront.dev/";

fn type_schema(field_type: &FieldType) -> Value {
    match field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::ObjectId => json!({ "type": "string", "pattern": OBJECT_ID_PATTERN }),
        FieldType::Object => json!({ "type": "object" }),
        FieldType::Array(inner) => json!({ "type": "array", "items": type_schema(inner) }),
    }
}

fn field_schema(field: &FieldDef) -> Value {
    let mut out = type_schema(&field.field_type);
    let Some(obj) = out.as_object_mut() else {
        return out;
    };

    if field.required && field.field_type == FieldType::String {
        obj.insert("minLength".to_string(), json!(1));
    }
    if let Some(values) = &field.enum_values {
        obj.insert("enum".to_string(), json!(values));
    }
    match &field.default {
        Some(FieldDefault::Value(v)) => {
            obj.insert("default".to_string(), v.clone());
        }
        Some(FieldDefault::EmptyArray) => {
            obj.insert("default".to_string(), json!([]));
        }
        Some(FieldDefault::Now) => {
            obj.insert("x-default".to_string(), json!("now"));
        }
        None => {}
    }
    if field.unique {
        obj.insert("x-unique".to_string(), json!(true));
    }
    if let Some(target) = field.reference {
        obj.insert("x-ref".to_string(), json!(target.name()));
    }
    out
}

/// JSON Schema document for one record type
pub fn json_schema(schema: &Schema) -> Value {
    let mut properties = Map::new();
    properties.insert(ID_FIELD.to_string(), type_schema(&FieldType::ObjectId));
    for field in &schema.fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    if schema.timestamps {
        for stamp in [CREATED_AT, UPDATED_AT] {
            properties.insert(stamp.to_string(), type_schema(&FieldType::Date));
        }
    }

    let required: Vec<&str> = schema.required_fields().map(|f| f.name).collect();

    json!({
        "$schema": DRAFT_7,
        "$id": format!("{}{}", SCHEMA_BASE_URL, file_name(schema.kind)),
        "title": schema.name,
        "type": "object",
        "x-collection": schema.kind.collection_name(),
        "x-timestamps": schema.timestamps,
        "properties": properties,
        "required": required,
    })
}

pub fn file_name(kind: EntityKind) -> String {
    format!("{}.schema.json", kind.name())
}

/// One exported record type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub collection: String,
    pub file: String,
    pub checksum: Checksum,
}

/// Index of an export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: Version,
    pub generated_at: DateTime<Utc>,
    pub entities: Vec<ManifestEntry>,
    /// Checksum over the entity checksums, in registry order
    pub manifest_checksum: Checksum,
}

impl Manifest {
    pub fn build(registry: &SchemaRegistry) -> Self {
        let entities: Vec<ManifestEntry> = registry
            .iter()
            .map(|schema| ManifestEntry {
                name: schema.name.to_string(),
                collection: schema.kind.collection_name(),
                file: file_name(schema.kind),
                checksum: Checksum::from_json(&json_schema(schema)),
            })
            .collect();
        let manifest_checksum = Checksum::combine(entities.iter().map(|e| &e.checksum));

        Self {
            version: registry_version(),
            generated_at: Utc::now(),
            entities,
            manifest_checksum,
        }
    }

    /// Names of entries whose checksum no longer matches `registry`
    pub fn stale_entries(&self, registry: &SchemaRegistry) -> Vec<String> {
        self.entities
            .iter()
            .filter(|entry| match registry.get_by_name(&entry.name) {
                Ok(schema) => !entry.checksum.verify_json(&json_schema(schema)),
                Err(_) => true,
            })
            .map(|entry| entry.name.clone())
            .collect()
    }
}

/// Version of the record type set, tied to the crate release
pub fn registry_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Write every record type and, optionally, the manifest to `output_dir`
pub fn export_all(
    registry: &SchemaRegistry,
    output_dir: impl AsRef<Path>,
    format: OutputFormat,
    include_manifest: bool,
) -> Result<Manifest> {
    let output = output_dir.as_ref();
    fs::create_dir_all(output)?;

    for schema in registry.iter() {
        let content = format.render(&json_schema(schema))?;
        fs::write(output.join(file_name(schema.kind)), content)?;
    }

    let manifest = Manifest::build(registry);
    if include_manifest {
        let content = format.render(&serde_json::to_value(&manifest)?)?;
        fs::write(output.join("manifest.json"), content)?;
    }

    info!(
        dir = %output.display(),
        schemas = manifest.entities.len(),
        checksum = %manifest.manifest_checksum,
        "exported record schemas"
    );
    Ok(manifest)
}

/// Validate a stored-shape document against the exported JSON Schema
///
/// Returns every validation message; an empty list means the document is valid.
pub fn check_document(kind: EntityKind, document: &Value) -> Result<Vec<String>> {
    let schema = json_schema(kind.schema());
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| SchemaError::InvalidFormat(format!("{} schema does not compile: {}", kind, e)))?;

    let messages = match compiled.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect(),
    };
    Ok(messages)
}
