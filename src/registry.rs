//! Schema Registry
//!
//! The static table of record types persisted by the storefront, addressable by
//! [`EntityKind`] or by name.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Serialize, Serializer};
use serde_json::json;

use crate::entities::Role;
use crate::error::{Result, SchemaError};
use crate::schema::{FieldDef, Schema};

/// One of the persisted record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    User,
    Product,
    Category,
    Store,
    Package,
    DiscountCoupon,
    Order,
    Newsletter,
    Cart,
    Booking,
    UnavailableSlot,
    UnavailableDay,
}

const ALL_KINDS: [EntityKind; 12] = [
    EntityKind::User,
    EntityKind::Product,
    EntityKind::Category,
    EntityKind::Store,
    EntityKind::Package,
    EntityKind::DiscountCoupon,
    EntityKind::Order,
    EntityKind::Newsletter,
    EntityKind::Cart,
    EntityKind::Booking,
    EntityKind::UnavailableSlot,
    EntityKind::UnavailableDay,
];

impl EntityKind {
    pub fn all() -> &'static [EntityKind] {
        &ALL_KINDS
    }

    /// Record type name, as exported to consumers
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Product => "Product",
            EntityKind::Category => "Category",
            EntityKind::Store => "Store",
            EntityKind::Package => "Package",
            EntityKind::DiscountCoupon => "DiscountCoupon",
            EntityKind::Order => "Order",
            EntityKind::Newsletter => "Newsletter",
            EntityKind::Cart => "Cart",
            EntityKind::Booking => "Booking",
            EntityKind::UnavailableSlot => "UnavailableSlot",
            EntityKind::UnavailableDay => "UnavailableDay",
        }
    }

    /// Collection the records live in: lowercased name, pluralized
    pub fn collection_name(&self) -> String {
        format!("{}s", self.name().to_lowercase())
    }

    pub fn schema(&self) -> &'static Schema {
        SchemaRegistry::global().get(*self)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = SchemaError;

    /// Accepts the record type name or its collection name, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s) || k.collection_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchemaError::UnknownEntity(s.to_string()))
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The registry of all record types
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: Vec<Schema>,
}

impl SchemaRegistry {
    /// The process-wide registry, built on first use
    pub fn global() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SchemaRegistry::build)
    }

    fn build() -> Self {
        let schemas: Vec<Schema> = ALL_KINDS.iter().map(|kind| define(*kind)).collect();
        debug_assert!(schemas.iter().enumerate().all(|(i, s)| s.kind.index() == i));
        Self { schemas }
    }

    pub fn get(&self, kind: EntityKind) -> &Schema {
        &self.schemas[kind.index()]
    }

    pub fn get_by_name(&self, name: &str) -> Result<&Schema> {
        let kind = name.parse::<EntityKind>()?;
        Ok(self.get(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Search record types by name (fuzzy), best match first
    pub fn search(&self, query: &str, limit: usize) -> Vec<EntityKind> {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, EntityKind)> = self
            .schemas
            .iter()
            .filter_map(|s| matcher.fuzzy_match(s.name, query).map(|score| (score, s.kind)))
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0));
        results.into_iter().take(limit).map(|(_, kind)| kind).collect()
    }
}

fn define(kind: EntityKind) -> Schema {
    let schema = Schema::new(kind);
    match kind {
        EntityKind::User => schema
            .field(FieldDef::string("name").required())
            .field(FieldDef::string("lastName").required())
            .field(FieldDef::date("dob").required())
            .field(FieldDef::string("email").required().unique())
            .field(FieldDef::string("password").required())
            .field(FieldDef::string("phone").required())
            .field(FieldDef::string("address"))
            .field(FieldDef::string("selectedMode"))
            .field(FieldDef::boolean("newsletter").default_value(json!(false)))
            .field(FieldDef::references("couponUsage", EntityKind::DiscountCoupon))
            .field(
                FieldDef::string("role")
                    .one_of(Role::NAMES)
                    .default_value(json!(Role::User.as_str())),
            )
            .with_timestamps(),
        EntityKind::Product => schema
            .field(FieldDef::string("name").required())
            .field(FieldDef::string("description"))
            .field(FieldDef::number("price").required())
            .field(FieldDef::string("imageUrl"))
            .field(FieldDef::reference("category", EntityKind::Category).required())
            .field(FieldDef::date("createdAt").default_now()),
        EntityKind::Category => schema
            .field(FieldDef::string("name").required().unique())
            .field(FieldDef::string("description"))
            .field(FieldDef::date("createdAt").default_now()),
        EntityKind::Store => schema
            .field(FieldDef::string("name").required())
            .field(FieldDef::string("address").required())
            .field(FieldDef::string("phone").required())
            .field(FieldDef::references("staff", EntityKind::User)),
        EntityKind::Package => schema
            .field(FieldDef::string("name").required())
            .field(FieldDef::string("description"))
            .field(FieldDef::number("minutes").required())
            .field(FieldDef::number("price").required())
            .field(FieldDef::string("imageUrl"))
            .field(FieldDef::date("createdAt").default_now()),
        EntityKind::DiscountCoupon => schema
            .field(FieldDef::string("couponCode").required().unique())
            .field(FieldDef::number("percentage").required())
            .field(FieldDef::number("maxUsage").required())
            .field(FieldDef::date("expiry").required()),
        EntityKind::Order => schema
            .field(FieldDef::reference("userRef", EntityKind::User))
            .field(FieldDef::reference("productRef", EntityKind::Product))
            .field(FieldDef::reference("packageRef", EntityKind::Package))
            .field(FieldDef::number("totalAmount").required())
            .field(FieldDef::string("status").required())
            .field(FieldDef::object("detailsFromStripe"))
            .field(FieldDef::string("paymentMethod"))
            .with_timestamps(),
        EntityKind::Newsletter => schema
            .field(FieldDef::reference("userRef", EntityKind::User))
            .field(FieldDef::date("subscribedAt").default_now())
            .field(FieldDef::string("email").required())
            .field(FieldDef::string("phone")),
        EntityKind::Cart => schema
            .field(FieldDef::reference("userRef", EntityKind::User))
            .field(FieldDef::reference("productRef", EntityKind::Product))
            .field(FieldDef::reference("packageRef", EntityKind::Package))
            .field(FieldDef::number("cartTotal").required()),
        EntityKind::Booking => schema
            .field(FieldDef::reference("userRef", EntityKind::User))
            .field(FieldDef::reference("storeRef", EntityKind::Store))
            .field(FieldDef::date("date").required())
            .field(FieldDef::string("timeSlot").required())
            .field(FieldDef::reference("packageRef", EntityKind::Package)),
        EntityKind::UnavailableSlot => schema
            .field(FieldDef::reference("storeRef", EntityKind::Store))
            .field(FieldDef::date("date").required())
            .field(FieldDef::string("startTime").required())
            .field(FieldDef::string("endTime").required())
            .field(FieldDef::string("reason")),
        EntityKind::UnavailableDay => schema
            .field(FieldDef::reference("storeRef", EntityKind::Store))
            .field(FieldDef::date("date").required())
            .field(FieldDef::string("reason")),
    }
}
