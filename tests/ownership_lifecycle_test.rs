use marketplace_ledger::domain::{normalize, BookingStatus, RawDocument, TimeMs};
use marketplace_ledger::engine::identity::{build_alias_set, ProviderIdentity};
use marketplace_ledger::engine::lifecycle::{last_write_wins, partition_bookings, StatusChange};
use serde_json::json;

fn provider() -> ProviderIdentity {
    ProviderIdentity::new(Some("SP-1"), ["a@x.com", "b@x.com"])
}

fn booking_doc(id: &str, fields: serde_json::Value) -> RawDocument {
    RawDocument::new(id, fields)
}

#[test]
fn test_matching_across_field_spellings() {
    let identity = provider();
    let cases = [
        (json!({"providerEmail": "A@X.com"}), true),
        (json!({"provider_email": "b@x.com"}), true),
        (json!({"providerId": "sp-1"}), true),
        (json!({"provider": "SP-1"}), true),
        (json!({"serviceProviderId": " Sp-1 "}), true),
        (json!({"providerEmail": "c@x.com", "providerId": "sp-2"}), false),
        (json!({}), false),
    ];
    for (i, (fields, expected)) in cases.into_iter().enumerate() {
        let booking = normalize::booking(&booking_doc(&format!("b{}", i), fields.clone()));
        assert_eq!(identity.matches(&booking.owner), expected, "fields={}", fields);
    }
}

#[test]
fn test_same_predicate_for_services_and_notifications() {
    let identity = provider();
    let listing = normalize::service_listing(&RawDocument::new(
        "s1",
        json!({"serviceName": "Tiling", "providerEmail": "A@x.com"}),
    ));
    let note = normalize::notification(&RawDocument::new(
        "n1",
        json!({"subject": "Payout", "providerId": "SP-1", "channel": "In-App"}),
    ));
    assert!(identity.matches(&listing.owner));
    assert!(identity.matches(&note.target));
}

#[test]
fn test_identity_from_profile_record() {
    let record = json!({
        "email": "Owner@Shop.com",
        "contactEmail": "help@shop.com",
        "ownerEmail": "owner@shop.com"
    });
    let aliases = build_alias_set(record.as_object().unwrap());
    assert_eq!(aliases.len(), 2);

    let identity = ProviderIdentity::from_record(record.as_object().unwrap(), Some("SP-9"));
    let booking = normalize::booking(&RawDocument::new(
        "b1",
        json!({"ownerEmail": "HELP@shop.com"}),
    ));
    assert!(identity.matches(&booking.owner));
}

#[test]
fn test_partitions_from_raw_statuses() {
    let docs = [
        booking_doc("blank", json!({"status": "", "createdAt": 1})),
        booking_doc("requested", json!({"status": "Requested", "createdAt": 2})),
        booking_doc("done", json!({"status": "Completed", "createdAt": 3})),
        booking_doc("working", json!({"status": "in_progress", "createdAt": 4})),
        booking_doc("weird", json!({"status": "weirdstatus", "createdAt": 5})),
        booking_doc("declined", json!({"status": "Declined", "createdAt": 6})),
    ];
    let bookings: Vec<_> = docs.iter().map(normalize::booking).collect();
    let partitions = partition_bookings(&bookings);

    let ids = |list: &[marketplace_ledger::Booking]| -> Vec<String> {
        list.iter().map(|b| b.id.as_str().to_string()).collect()
    };
    assert_eq!(ids(&partitions.new), vec!["requested", "blank"]);
    assert_eq!(ids(&partitions.managed), vec!["working", "done"]);
    assert_eq!(ids(&partitions.uncategorized), vec!["declined", "weird"]);

    for b in &partitions.new {
        assert!(!partitions.managed.iter().any(|m| m.id == b.id));
    }
}

#[test]
fn test_permissive_transitions_and_last_write_wins() {
    let original = normalize::booking(&booking_doc("b1", json!({"status": "Completed"})));

    let mut provider_copy = original.clone();
    StatusChange::demote(TimeMs::new(100)).apply(&mut provider_copy);
    assert_eq!(provider_copy.status, BookingStatus::New);

    let mut admin_copy = original;
    StatusChange::cancel(TimeMs::new(200)).apply(&mut admin_copy);

    let merged = last_write_wins(admin_copy, provider_copy);
    assert_eq!(merged.status, BookingStatus::Cancelled);
}
