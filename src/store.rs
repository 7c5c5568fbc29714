//! In-memory record store
//!
//! The persistence layer the registry's write-time contract is enforced by.
//! One collection per record type, keyed by [`RecordId`], with a unique index
//! per unique field. References between records are weak: nothing is checked
//! on write and nothing cascades on delete.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{StoreConfig, StorefrontConfig, UnknownFieldPolicy};
use crate::entities::Entity;
use crate::error::{Result, SchemaError, ViolationKind};
use crate::graph::{Link, ReferenceGraph};
use crate::id::RecordId;
use crate::registry::{EntityKind, SchemaRegistry};
use crate::schema::{FieldType, Schema, CREATED_AT, ID_FIELD, UPDATED_AT};
use crate::validate::{cast, format_date, Document, Validator, WriteMode};

#[derive(Debug, Default)]
struct Collection {
    records: BTreeMap<RecordId, Document>,
    /// field -> rendered value -> owner
    unique: HashMap<&'static str, HashMap<String, RecordId>>,
}

fn index_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Collection {
    fn conflicts(&self, schema: &Schema, doc: &Document, except: Option<&RecordId>) -> Option<&'static str> {
        schema.unique_fields().find_map(|field| {
            let value = doc.get(field.name)?;
            let owner = self.unique.get(field.name)?.get(&index_key(value))?;
            (Some(owner) != except).then_some(field.name)
        })
    }

    fn index(&mut self, schema: &Schema, id: &RecordId, doc: &Document) {
        for field in schema.unique_fields() {
            if let Some(value) = doc.get(field.name) {
                self.unique
                    .entry(field.name)
                    .or_default()
                    .insert(index_key(value), id.clone());
            }
        }
    }

    fn unindex(&mut self, schema: &Schema, doc: &Document) {
        for field in schema.unique_fields() {
            if let (Some(value), Some(index)) = (doc.get(field.name), self.unique.get_mut(field.name)) {
                index.remove(&index_key(value));
            }
        }
    }
}

/// A reference field resolved to the records it names
#[derive(Debug, PartialEq)]
pub enum Populated<'a> {
    /// Single reference; `None` when unset or dangling
    One(Option<&'a Document>),
    /// List reference; dangling identifiers are skipped
    Many(Vec<&'a Document>),
}

/// The record store
#[derive(Debug)]
pub struct Store {
    registry: &'static SchemaRegistry,
    graph: ReferenceGraph,
    policy: UnknownFieldPolicy,
    collections: HashMap<EntityKind, Collection>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        let registry = SchemaRegistry::global();
        Self {
            registry,
            graph: ReferenceGraph::build(registry),
            policy: config.unknown_fields,
            collections: HashMap::new(),
        }
    }

    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self::new(config.store.clone())
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    fn schema(&self, kind: EntityKind) -> &'static Schema {
        self.registry.get(kind)
    }

    fn collection(&self, kind: EntityKind) -> Option<&Collection> {
        self.collections.get(&kind)
    }

    /// Validate and store a new record, returning it as stored
    pub fn insert(&mut self, kind: EntityKind, doc: Document) -> Result<Document> {
        let schema = self.schema(kind);
        let now = Utc::now();
        let mut record = Validator::new(schema, self.policy).validate(&doc, WriteMode::Create, now)?;

        let id = match record.get(ID_FIELD).and_then(Value::as_str) {
            Some(given) => RecordId::parse(given)?,
            None => RecordId::generate(),
        };

        let collection = self.collections.entry(kind).or_default();
        if collection.records.contains_key(&id) {
            return Err(SchemaError::violation(
                schema.name,
                ID_FIELD,
                ViolationKind::Unique,
                format!("a record with id {} already exists", id),
            ));
        }
        if let Some(field) = collection.conflicts(schema, &record, None) {
            return Err(duplicate(schema, field, &record));
        }

        record.insert(ID_FIELD.to_string(), id.clone().into());
        if schema.timestamps {
            let stamp = Value::String(format_date(now));
            record.insert(CREATED_AT.to_string(), stamp.clone());
            record.insert(UPDATED_AT.to_string(), stamp);
        }

        collection.index(schema, &id, &record);
        collection.records.insert(id.clone(), record.clone());
        debug!(entity = schema.name, id = %id, "record inserted");
        Ok(record)
    }

    pub fn find_by_id(&self, kind: EntityKind, id: &RecordId) -> Option<&Document> {
        self.collection(kind)?.records.get(id)
    }

    /// Records whose fields equal every entry of `filter`
    ///
    /// Filter values are cast to the field type first; a list field matches
    /// when it contains the value.
    pub fn find(&self, kind: EntityKind, filter: &Document) -> Vec<&Document> {
        let Some(collection) = self.collection(kind) else {
            return Vec::new();
        };
        let schema = self.schema(kind);
        let filter: Vec<(&str, Value)> = filter
            .iter()
            .map(|(key, value)| (key.as_str(), normalize_filter(schema, key, value)))
            .collect();

        collection
            .records
            .values()
            .filter(|record| {
                filter.iter().all(|(key, wanted)| match record.get(*key) {
                    Some(Value::Array(items)) if !wanted.is_array() => items.contains(wanted),
                    Some(actual) => actual == wanted,
                    None => wanted.is_null(),
                })
            })
            .collect()
    }

    pub fn find_one(&self, kind: EntityKind, filter: &Document) -> Option<&Document> {
        self.find(kind, filter).into_iter().next()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.collection(kind).map_or(0, |c| c.records.len())
    }

    /// Apply `patch` to an existing record
    ///
    /// A `null` in the patch unsets the field. `createdAt` is kept from the
    /// stored record; changing `_id` is rejected.
    pub fn update(&mut self, kind: EntityKind, id: &RecordId, patch: Document) -> Result<Document> {
        let schema = self.schema(kind);
        let existing = self
            .collection(kind)
            .and_then(|c| c.records.get(id))
            .ok_or_else(|| not_found(schema, id))?;

        if let Some(new_id) = patch.get(ID_FIELD) {
            if new_id.as_str().map(str::to_ascii_lowercase).as_deref() != Some(id.as_str()) {
                return Err(SchemaError::violation(
                    schema.name,
                    ID_FIELD,
                    ViolationKind::Immutable,
                    "the identifier of a record cannot change",
                ));
            }
        }

        let mut merged = existing.clone();
        for (key, value) in patch {
            if schema.timestamps && (key == CREATED_AT || key == UPDATED_AT) {
                continue;
            }
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }

        let now = Utc::now();
        let mut record = Validator::new(schema, self.policy).validate(&merged, WriteMode::Update, now)?;
        record.insert(ID_FIELD.to_string(), id.clone().into());
        if schema.timestamps {
            if let Some(created) = existing.get(CREATED_AT) {
                record.insert(CREATED_AT.to_string(), created.clone());
            }
            record.insert(UPDATED_AT.to_string(), Value::String(format_date(now)));
        }

        let collection = self.collections.entry(kind).or_default();
        if let Some(field) = collection.conflicts(schema, &record, Some(id)) {
            return Err(duplicate(schema, field, &record));
        }

        if let Some(previous) = collection.records.remove(id) {
            collection.unindex(schema, &previous);
        }
        collection.index(schema, id, &record);
        collection.records.insert(id.clone(), record.clone());
        debug!(entity = schema.name, id = %id, "record updated");
        Ok(record)
    }

    /// Remove a record, returning it
    ///
    /// Records elsewhere that still hold its identifier are left as they are.
    pub fn delete(&mut self, kind: EntityKind, id: &RecordId) -> Result<Document> {
        let schema = self.schema(kind);
        let collection = self.collections.get_mut(&kind).ok_or_else(|| not_found(schema, id))?;
        let record = collection.records.remove(id).ok_or_else(|| not_found(schema, id))?;
        collection.unindex(schema, &record);
        debug!(entity = schema.name, id = %id, "record deleted");

        for (link, holders) in self.dangling_references(kind, id) {
            warn!(
                entity = schema.name,
                id = %id,
                referrer = link.kind.name(),
                field = link.field,
                holders,
                "deleted record is still referenced"
            );
        }

        Ok(record)
    }

    /// Reference fields still holding `id`, with the number of records holding it
    fn dangling_references(&self, kind: EntityKind, id: &RecordId) -> Vec<(Link, usize)> {
        self.graph
            .referenced_by(kind)
            .into_iter()
            .map(|link| {
                let holders = self.referencing(link.kind, link.field, id);
                (link, holders)
            })
            .filter(|(_, holders)| *holders > 0)
            .collect()
    }

    fn referencing(&self, kind: EntityKind, field: &str, id: &RecordId) -> usize {
        let Some(collection) = self.collection(kind) else {
            return 0;
        };
        collection
            .records
            .values()
            .filter(|record| match record.get(field) {
                Some(Value::String(s)) => s == id.as_str(),
                Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(id.as_str())),
                _ => false,
            })
            .count()
    }

    /// Resolve the reference held in `field` of `record`
    pub fn populate<'a>(&'a self, kind: EntityKind, record: &Document, field: &str) -> Result<Populated<'a>> {
        let schema = self.schema(kind);
        let (def, target) = schema
            .get_field(field)
            .and_then(|f| f.reference.map(|target| (f, target)))
            .ok_or_else(|| {
                SchemaError::InvalidFormat(format!("{}.{} is not a reference field", schema.name, field))
            })?;

        let lookup = |value: &Value| -> Option<&'a Document> {
            let id = RecordId::parse(value.as_str()?).ok()?;
            self.find_by_id(target, &id)
        };

        Ok(if def.field_type.is_array() {
            let items = record.get(field).and_then(Value::as_array);
            Populated::Many(items.into_iter().flatten().filter_map(lookup).collect())
        } else {
            Populated::One(record.get(field).and_then(lookup))
        })
    }

    /// Insert a typed record
    pub fn create<E: Entity>(&mut self, entity: &E) -> Result<E> {
        let stored = self.insert(E::KIND, to_document(entity)?)?;
        from_document(stored)
    }

    /// Fetch a typed record by identifier
    pub fn get<E: Entity>(&self, id: &RecordId) -> Result<Option<E>> {
        self.find_by_id(E::KIND, id)
            .map(|doc| from_document(doc.clone()))
            .transpose()
    }

    /// All records of a type, in identifier order
    pub fn all<E: Entity>(&self) -> Result<Vec<E>> {
        self.collection(E::KIND)
            .map(|c| {
                c.records
                    .values()
                    .map(|doc| from_document(doc.clone()))
                    .collect::<Result<Vec<E>>>()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn normalize_filter(schema: &Schema, key: &str, value: &Value) -> Value {
    let field_type = match schema.get_field(key) {
        Some(field) => &field.field_type,
        None => return value.clone(),
    };
    let scalar_type = match field_type {
        FieldType::Array(inner) if !value.is_array() => inner.as_ref(),
        other => other,
    };
    cast(scalar_type, value).unwrap_or_else(|| value.clone())
}

fn not_found(schema: &Schema, id: &RecordId) -> SchemaError {
    SchemaError::NotFound {
        entity: schema.name.to_string(),
        id: id.to_string(),
    }
}

fn duplicate(schema: &Schema, field: &str, record: &Document) -> SchemaError {
    let value = record.get(field).map(index_key).unwrap_or_default();
    SchemaError::violation(
        schema.name,
        field,
        ViolationKind::Unique,
        format!("duplicate value '{}'", value),
    )
}

/// Serialize a typed record into a document
pub fn to_document<E: Entity>(entity: &E) -> Result<Document> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::InvalidFormat(format!(
            "{} did not serialize to an object: {}",
            E::KIND,
            other
        ))),
    }
}

pub fn from_document<E: Entity>(doc: Document) -> Result<E> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
