//! Storefront Record Schemas
//!
//! Record types persisted by the storefront booking platform, and the
//! write-time constraints every record must satisfy.
//!
//! ## Features
//!
//! - **Schema Registry**: 12 record types (users, products, categories, stores,
//!   packages, coupons, orders, newsletters, carts, bookings, unavailable
//!   slots and days), addressable by kind or name
//! - **Constraint Checking**: required, unique, enum and type constraints
//!   enforced on every write, reported as `ConstraintViolation`
//! - **Record Store**: in-memory collections with generated identifiers,
//!   defaults, timestamps and reference resolution
//! - **JSON Schema Export**: draft 7 documents plus a checksummed manifest
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use storefront_schemas::{EntityKind, Store};
//!
//! let mut store = Store::default();
//! let order = json!({ "totalAmount": 100, "status": "pending" });
//! let stored = store.insert(EntityKind::Order, order.as_object().unwrap().clone()).unwrap();
//! assert!(stored.contains_key("_id"));
//!
//! let missing = json!({ "status": "pending" });
//! let err = store.insert(EntityKind::Order, missing.as_object().unwrap().clone()).unwrap_err();
//! assert!(err.is_constraint_violation());
//! ```

pub mod checksum;
pub mod config;
pub mod entities;
pub mod error;
pub mod export;
pub mod graph;
pub mod id;
pub mod registry;
pub mod schema;
pub mod store;
pub mod validate;

pub use checksum::Checksum;
pub use config::{OutputFormat, StoreConfig, StorefrontConfig, UnknownFieldPolicy};
pub use entities::{Entity, Role};
pub use error::{Result, SchemaError, Violation, ViolationKind};
pub use export::{check_document, export_all, json_schema, Manifest};
pub use graph::ReferenceGraph;
pub use id::RecordId;
pub use registry::{EntityKind, SchemaRegistry};
pub use schema::{FieldDef, FieldDefault, FieldType, Schema};
pub use store::{Populated, Store};
pub use validate::{Document, Validator, WriteMode};
