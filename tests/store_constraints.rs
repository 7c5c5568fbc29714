//! Write-time constraint tests across every record type
//!
//! Uses rstest to run the same checks against each registry schema.

use rstest::{fixture, rstest};
use serde_json::{json, Value};
use storefront_schemas::{
    Document, EntityKind, Populated, RecordId, SchemaError, Store, StoreConfig, UnknownFieldPolicy,
    ViolationKind,
};

const SOME_ID: &str = "65a1b2c3d4e5f60718293a4b";

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn id_of(record: &Document) -> RecordId {
    RecordId::parse(record["_id"].as_str().unwrap()).unwrap()
}

/// A document satisfying every required field of `kind`
fn valid_document(kind: EntityKind) -> Document {
    doc(match kind {
        EntityKind::User => json!({
            "name": "Ada",
            "lastName": "Lovelace",
            "dob": "1990-04-01",
            "email": "a@x.com",
            "password": "hunter2",
            "phone": "555-0100"
        }),
        EntityKind::Product => json!({ "name": "Oil", "price": 12.5, "category": SOME_ID }),
        EntityKind::Category => json!({ "name": "Massage" }),
        EntityKind::Store => json!({ "name": "Downtown", "address": "1 Main St", "phone": "555-0101" }),
        EntityKind::Package => json!({ "name": "Relax", "minutes": 30, "price": 45 }),
        EntityKind::DiscountCoupon => json!({
            "couponCode": "SPRING",
            "percentage": 15,
            "maxUsage": 100,
            "expiry": "2030-01-01T00:00:00Z"
        }),
        EntityKind::Order => json!({ "totalAmount": 100, "status": "pending" }),
        EntityKind::Newsletter => json!({ "email": "news@x.com" }),
        EntityKind::Cart => json!({ "cartTotal": 20 }),
        EntityKind::Booking => json!({ "date": "2024-06-01", "timeSlot": "10:00 AM - 10:15 AM" }),
        EntityKind::UnavailableSlot => json!({
            "date": "2024-06-01",
            "startTime": "10:00 AM",
            "endTime": "11:00 AM"
        }),
        EntityKind::UnavailableDay => json!({ "date": "2024-12-25" }),
    })
}

#[fixture]
fn store() -> Store {
    Store::default()
}

#[rstest]
fn valid_documents_are_accepted(
    mut store: Store,
    #[values(
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
        EntityKind::UnavailableDay
    )]
    kind: EntityKind,
) {
    let stored = store.insert(kind, valid_document(kind)).unwrap();
    let id = id_of(&stored);
    assert_eq!(store.find_by_id(kind, &id), Some(&stored));
}

#[rstest]
fn missing_required_field_is_rejected(
    mut store: Store,
    #[values(
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
        EntityKind::UnavailableDay
    )]
    kind: EntityKind,
) {
    for field in kind.schema().required_fields() {
        let mut document = valid_document(kind);
        document.remove(field.name);

        let err = store.insert(kind, document).unwrap_err();
        assert_eq!(err.violation_kind(), Some(ViolationKind::Required), "{}.{}", kind, field.name);
        assert_eq!(err.violations()[0].field, field.name);
    }
    assert_eq!(store.count(kind), 0);
}

#[rstest]
#[case(EntityKind::User, "email")]
#[case(EntityKind::Category, "name")]
#[case(EntityKind::DiscountCoupon, "couponCode")]
fn duplicate_unique_value_fails_on_second_insert(mut store: Store, #[case] kind: EntityKind, #[case] field: &str) {
    store.insert(kind, valid_document(kind)).unwrap();

    let err = store.insert(kind, valid_document(kind)).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Unique));
    assert_eq!(err.violations()[0].field, field);
    assert_eq!(store.count(kind), 1);
}

#[rstest]
fn second_user_with_other_email_succeeds(mut store: Store) {
    store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();

    let mut same = valid_document(EntityKind::User);
    same.insert("email".to_string(), json!("a@x.com"));
    assert!(store.insert(EntityKind::User, same).is_err());

    let mut other = valid_document(EntityKind::User);
    other.insert("email".to_string(), json!("b@x.com"));
    assert!(store.insert(EntityKind::User, other).is_ok());
    assert_eq!(store.count(EntityKind::User), 2);
}

#[rstest]
#[case("admin")]
#[case("user")]
#[case("staff")]
fn role_accepts_declared_variants(mut store: Store, #[case] role: &str) {
    let mut user = valid_document(EntityKind::User);
    user.insert("role".to_string(), json!(role));
    let stored = store.insert(EntityKind::User, user).unwrap();
    assert_eq!(stored["role"], json!(role));
}

#[rstest]
#[case(json!("owner"))]
#[case(json!("Admin"))]
#[case(json!(""))]
#[case(json!(1))]
fn role_rejects_other_values(mut store: Store, #[case] role: Value) {
    let mut user = valid_document(EntityKind::User);
    user.insert("role".to_string(), role);
    let err = store.insert(EntityKind::User, user).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Enum));
}

#[rstest]
fn defaults_are_filled_on_create(mut store: Store) {
    let user = store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();
    assert_eq!(user["newsletter"], json!(false));
    assert_eq!(user["role"], json!("user"));
    assert_eq!(user["couponUsage"], json!([]));
    assert!(user["createdAt"].is_string());
    assert!(user["updatedAt"].is_string());

    for kind in [EntityKind::Product, EntityKind::Category, EntityKind::Package] {
        let record = store.insert(kind, valid_document(kind)).unwrap();
        assert!(record["createdAt"].is_string(), "{} createdAt", kind);
    }
    let newsletter = store
        .insert(EntityKind::Newsletter, valid_document(EntityKind::Newsletter))
        .unwrap();
    assert!(newsletter["subscribedAt"].is_string());

    let store_record = store.insert(EntityKind::Store, valid_document(EntityKind::Store)).unwrap();
    assert_eq!(store_record["staff"], json!([]));
}

#[rstest]
fn supplied_values_win_over_defaults(mut store: Store) {
    let mut user = valid_document(EntityKind::User);
    user.insert("newsletter".to_string(), json!(true));
    user.insert("role".to_string(), json!("staff"));
    let stored = store.insert(EntityKind::User, user).unwrap();
    assert_eq!(stored["newsletter"], json!(true));
    assert_eq!(stored["role"], json!("staff"));
}

#[rstest]
fn order_example(mut store: Store) {
    let err = store
        .insert(EntityKind::Order, doc(json!({ "status": "pending" })))
        .unwrap_err();
    assert!(matches!(err, SchemaError::ConstraintViolation { .. }));

    let order = store
        .insert(EntityKind::Order, doc(json!({ "totalAmount": 100, "status": "pending" })))
        .unwrap();
    let fetched = store.find_by_id(EntityKind::Order, &id_of(&order)).unwrap();
    assert_eq!(fetched["totalAmount"], json!(100));
    assert_eq!(fetched["status"], json!("pending"));
}

#[rstest]
fn update_cannot_clear_required_field(mut store: Store) {
    let order = store
        .insert(EntityKind::Order, valid_document(EntityKind::Order))
        .unwrap();
    let id = id_of(&order);

    let err = store
        .update(EntityKind::Order, &id, doc(json!({ "totalAmount": null })))
        .unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Required));
    assert_eq!(store.find_by_id(EntityKind::Order, &id), Some(&order));
}

#[rstest]
fn update_checks_uniqueness_against_other_records(mut store: Store) {
    let first = store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();
    let mut second = valid_document(EntityKind::User);
    second.insert("email".to_string(), json!("b@x.com"));
    let second = store.insert(EntityKind::User, second).unwrap();

    let err = store
        .update(EntityKind::User, &id_of(&second), doc(json!({ "email": "a@x.com" })))
        .unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Unique));

    let same = store
        .update(EntityKind::User, &id_of(&first), doc(json!({ "email": "a@x.com", "phone": "555-0199" })))
        .unwrap();
    assert_eq!(same["phone"], json!("555-0199"));

    let moved = store
        .update(EntityKind::User, &id_of(&first), doc(json!({ "email": "c@x.com" })))
        .unwrap();
    assert_eq!(moved["email"], json!("c@x.com"));

    // The old address is free again
    let mut third = valid_document(EntityKind::User);
    third.insert("email".to_string(), json!("a@x.com"));
    assert!(store.insert(EntityKind::User, third).is_ok());
}

#[rstest]
fn update_refreshes_updated_at_only(mut store: Store) {
    let order = store
        .insert(EntityKind::Order, valid_document(EntityKind::Order))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    let updated = store
        .update(
            EntityKind::Order,
            &id_of(&order),
            doc(json!({ "status": "completed", "createdAt": "2000-01-01T00:00:00Z" })),
        )
        .unwrap();
    assert_eq!(updated["status"], json!("completed"));
    assert_eq!(updated["createdAt"], order["createdAt"]);
    assert_ne!(updated["updatedAt"], order["updatedAt"]);
}

#[rstest]
fn update_missing_record_is_not_found(mut store: Store) {
    let err = store
        .update(EntityKind::Cart, &RecordId::generate(), doc(json!({ "cartTotal": 5 })))
        .unwrap_err();
    assert!(matches!(err, SchemaError::NotFound { .. }));
}

#[rstest]
fn delete_frees_unique_key(mut store: Store) {
    let category = store
        .insert(EntityKind::Category, valid_document(EntityKind::Category))
        .unwrap();
    let removed = store.delete(EntityKind::Category, &id_of(&category)).unwrap();
    assert_eq!(removed, category);
    assert_eq!(store.count(EntityKind::Category), 0);

    assert!(store
        .insert(EntityKind::Category, valid_document(EntityKind::Category))
        .is_ok());
}

#[rstest]
fn delete_does_not_cascade(mut store: Store) {
    let user = store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();
    let user_id = id_of(&user);

    let mut booking = valid_document(EntityKind::Booking);
    booking.insert("userRef".to_string(), json!(user_id.as_str()));
    let booking = store.insert(EntityKind::Booking, booking).unwrap();

    store.delete(EntityKind::User, &user_id).unwrap();

    let kept = store.find_by_id(EntityKind::Booking, &id_of(&booking)).unwrap();
    assert_eq!(kept["userRef"], json!(user_id.as_str()));
    assert_eq!(
        store.populate(EntityKind::Booking, kept, "userRef").unwrap(),
        Populated::One(None)
    );
}

#[rstest]
fn references_are_not_checked_on_write(mut store: Store) {
    // Product.category names a category that does not exist
    let product = store
        .insert(EntityKind::Product, valid_document(EntityKind::Product))
        .unwrap();
    assert_eq!(product["category"], json!(SOME_ID));
}

#[rstest]
fn populate_resolves_single_and_list_references(mut store: Store) {
    let category = store
        .insert(EntityKind::Category, valid_document(EntityKind::Category))
        .unwrap();
    let mut product = valid_document(EntityKind::Product);
    product.insert("category".to_string(), category["_id"].clone());
    let product = store.insert(EntityKind::Product, product).unwrap();

    assert_eq!(
        store.populate(EntityKind::Product, &product, "category").unwrap(),
        Populated::One(Some(&category))
    );

    let staff = store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();
    let mut shop = valid_document(EntityKind::Store);
    shop.insert("staff".to_string(), json!([staff["_id"], SOME_ID]));
    let shop = store.insert(EntityKind::Store, shop).unwrap();

    assert_eq!(
        store.populate(EntityKind::Store, &shop, "staff").unwrap(),
        Populated::Many(vec![&staff])
    );
}

#[rstest]
fn find_matches_list_membership(mut store: Store) {
    let user = store.insert(EntityKind::User, valid_document(EntityKind::User)).unwrap();
    let mut shop = valid_document(EntityKind::Store);
    shop.insert("staff".to_string(), json!([user["_id"]]));
    store.insert(EntityKind::Store, shop).unwrap();
    store.insert(EntityKind::Store, valid_document(EntityKind::Store)).unwrap();

    let found = store.find(EntityKind::Store, &doc(json!({ "staff": user["_id"] })));
    assert_eq!(found.len(), 1);
    assert!(store
        .find_one(EntityKind::Store, &doc(json!({ "staff": SOME_ID })))
        .is_none());
}

#[rstest]
fn unknown_fields_follow_policy() {
    let mut lenient = Store::default();
    let mut cart = valid_document(EntityKind::Cart);
    cart.insert("giftWrap".to_string(), json!(true));
    let stored = lenient.insert(EntityKind::Cart, cart.clone()).unwrap();
    assert!(!stored.contains_key("giftWrap"));

    let mut strict = Store::new(StoreConfig {
        unknown_fields: UnknownFieldPolicy::Reject,
    });
    let err = strict.insert(EntityKind::Cart, cart).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Unknown));
    assert_eq!(err.violations()[0].field, "giftWrap");
}

#[rstest]
fn values_are_cast_to_field_types(mut store: Store) {
    let package = store
        .insert(
            EntityKind::Package,
            doc(json!({ "name": "Relax", "minutes": "30", "price": "44.5" })),
        )
        .unwrap();
    assert_eq!(package["minutes"], json!(30));
    assert_eq!(package["price"], json!(44.5));

    let day = store
        .insert(EntityKind::UnavailableDay, doc(json!({ "date": "2024-12-25" })))
        .unwrap();
    assert_eq!(day["date"], json!("2024-12-25T00:00:00.000Z"));

    let err = store
        .insert(EntityKind::UnavailableDay, doc(json!({ "date": "Christmas" })))
        .unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::Type));
}

#[rstest]
#[case(json!(253_402_300_800_000i64))]
#[case(json!(-62_198_755_200_000i64))]
fn dates_outside_four_digit_years_are_rejected(mut store: Store, #[case] date: Value) {
    let err = store
        .insert(EntityKind::UnavailableDay, doc(json!({ "date": date })))
        .unwrap_err();
    let violations = err.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "date");
    assert_eq!(violations[0].kind, ViolationKind::Type);
    assert_eq!(store.count(EntityKind::UnavailableDay), 0);
}

#[rstest]
fn last_representable_day_survives_update(mut store: Store) {
    let day = store
        .insert(EntityKind::UnavailableDay, doc(json!({ "date": "9999-12-31" })))
        .unwrap();
    assert_eq!(day["date"], json!("9999-12-31T00:00:00.000Z"));

    let updated = store
        .update(EntityKind::UnavailableDay, &id_of(&day), doc(json!({ "reason": "closed" })))
        .unwrap();
    assert_eq!(updated["date"], day["date"]);
    assert_eq!(updated["reason"], json!("closed"));
}

#[rstest]
fn supplied_timestamps_are_ignored_on_insert(mut store: Store) {
    let mut order = valid_document(EntityKind::Order);
    order.insert("createdAt".to_string(), json!("garbage"));
    order.insert("updatedAt".to_string(), json!("2000-01-01T00:00:00Z"));

    let stored = store.insert(EntityKind::Order, order).unwrap();
    assert_ne!(stored["createdAt"], json!("garbage"));
    assert_ne!(stored["updatedAt"], json!("2000-01-01T00:00:00.000Z"));
    assert_eq!(stored["createdAt"], stored["updatedAt"]);
}
