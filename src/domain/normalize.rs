//! Boundary normalization: loosely-typed store documents into canonical records.
//!
//! Every field-name fallback chain lives here. Business logic downstream only
//! ever sees `Booking`, `ServiceListing`, `Notification` and `ProviderProfile`.

use crate::domain::{
    Booking, BookingStatus, Channel, Decimal, ListingStatus, Notification, OwnerRef,
    ProviderProfile, RecordId, ServiceListing, TimeMs,
};
use crate::engine::identity::build_alias_set;
use crate::engine::money::parse_price;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as delivered by the live-collection source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            data,
        }
    }
}

// Candidate field names, oldest spelling first.
pub const PROVIDER_EMAIL_FIELDS: &[&str] = &[
    "providerEmail",
    "provider_email",
    "serviceProviderEmail",
    "ownerEmail",
];
pub const PROVIDER_ID_FIELDS: &[&str] = &[
    "providerId",
    "provider_id",
    "provider",
    "serviceProviderId",
    "ownerId",
];
/// Alias-bearing fields on a provider's own identity record.
pub const IDENTITY_EMAIL_FIELDS: &[&str] = &[
    "email",
    "authEmail",
    "profileEmail",
    "providerEmail",
    "provider_email",
    "ownerEmail",
    "contactEmail",
    "contact_email",
];

const SERVICE_FIELDS: &[&str] = &["service", "serviceName", "service_name", "title"];
const CUSTOMER_NAME_FIELDS: &[&str] = &["customerName", "customer_name", "fullName"];
const CUSTOMER_EMAIL_FIELDS: &[&str] = &["customerEmail", "customer_email", "userEmail"];
const CITY_FIELDS: &[&str] = &["city", "location"];
const BASE_PRICE_FIELDS: &[&str] = &["basePrice", "base_price", "price", "amount"];
const RATE_FIELDS: &[&str] = &["commissionRate", "commission_rate"];
const COMMISSION_FIELDS: &[&str] = &["commissionAmount", "commission_amount", "commission"];
const TOTAL_FIELDS: &[&str] = &["totalPrice", "total_price", "total"];
const SHARE_FIELDS: &[&str] = &["providerShare", "provider_share", "providerAmount"];
const STATUS_FIELDS: &[&str] = &["status", "bookingStatus", "state"];
const CREATED_FIELDS: &[&str] = &["createdAt", "created_at", "requestedAt", "timestamp"];
const UPDATED_FIELDS: &[&str] = &["updatedAt", "updated_at"];

const LISTING_NAME_FIELDS: &[&str] = &["serviceName", "service_name", "name", "title", "service"];
const LISTING_PRICE_FIELDS: &[&str] = &["price", "basePrice", "base_price", "rate"];
const AVAILABLE_FIELDS: &[&str] = &["available", "isAvailable"];
const LISTING_STATUS_FIELDS: &[&str] = &["status", "approvalStatus"];
const CATEGORY_FIELDS: &[&str] = &["category", "categoryName"];

const AUDIENCE_FIELDS: &[&str] = &["audience", "recipientGroup", "recipients"];
const CHANNEL_FIELDS: &[&str] = &["channel", "deliveryMethod", "type"];
const SUBJECT_FIELDS: &[&str] = &["subject", "title"];
const MESSAGE_FIELDS: &[&str] = &["message", "body", "content"];
const SENT_AT_FIELDS: &[&str] = &["sentAt", "sent_at", "createdAt", "timestamp"];
const TARGET_EMAIL_FIELDS: &[&str] = &[
    "providerEmail",
    "provider_email",
    "recipientEmail",
    "targetEmail",
];
const TARGET_ID_FIELDS: &[&str] = &[
    "providerId",
    "provider_id",
    "recipientId",
    "targetProviderId",
];

const DISPLAY_NAME_FIELDS: &[&str] = &["businessName", "displayName", "name", "fullName"];

/// Epoch values below this are taken to be seconds rather than milliseconds.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

/// First non-empty string among the candidate fields.
///
/// Numbers are accepted and rendered as strings, since ids sometimes arrive
/// numeric.
pub fn first_str(data: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match data.get(*field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Every non-empty string among the candidate fields, in field order.
pub fn all_strs(data: &Map<String, Value>, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|field| match data.get(*field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

fn first_value<'a>(data: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .find_map(|field| data.get(*field).filter(|v| !v.is_null()))
}

fn optional_price(data: &Map<String, Value>, fields: &[&str]) -> Option<Decimal> {
    first_value(data, fields).map(parse_price)
}

fn optional_rate(data: &Map<String, Value>) -> Option<Decimal> {
    match first_value(data, RATE_FIELDS)? {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        Value::String(s) => Decimal::from_str_canonical(s.trim()).ok(),
        _ => None,
    }
}

fn owner_of(data: &Map<String, Value>, email_fields: &[&str], id_fields: &[&str]) -> OwnerRef {
    OwnerRef::new(
        first_str(data, email_fields).as_deref(),
        first_str(data, id_fields).as_deref(),
    )
}

/// Parse an instant from epoch numbers, RFC 3339 / ISO date strings, or
/// store timestamp objects (`{seconds, nanoseconds}`).
pub fn parse_timestamp(value: &Value) -> Option<TimeMs> {
    match value {
        Value::Number(n) => {
            let raw = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            epoch_to_ms(raw)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(raw) = s.parse::<i64>() {
                return epoch_to_ms(raw);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(TimeMs::new(dt.timestamp_millis()));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| TimeMs::new(dt.and_utc().timestamp_millis()))
        }
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            seconds
                .checked_mul(1000)
                .and_then(|ms| ms.checked_add(nanos / 1_000_000))
                .map(TimeMs::new)
        }
        _ => None,
    }
}

/// Store form of an instant that [`parse_timestamp`] reads back exactly.
///
/// Bare numbers are ambiguous between seconds and milliseconds, so writes use
/// RFC 3339 with millisecond precision.
pub fn timestamp_value(at: TimeMs) -> Value {
    Value::String(at.to_rfc3339())
}

/// `None` when a seconds value cannot be represented in milliseconds.
fn epoch_to_ms(raw: i64) -> Option<TimeMs> {
    match raw.checked_abs() {
        Some(magnitude) if magnitude < SECONDS_CUTOFF => raw.checked_mul(1000).map(TimeMs::new),
        _ => Some(TimeMs::new(raw)),
    }
}

fn timestamp(data: &Map<String, Value>, fields: &[&str]) -> Option<TimeMs> {
    fields
        .iter()
        .find_map(|field| data.get(*field).and_then(parse_timestamp))
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

pub fn booking(doc: &RawDocument) -> Booking {
    let data = &doc.data;
    Booking {
        id: RecordId::new(doc.id.clone()),
        service: first_str(data, SERVICE_FIELDS).unwrap_or_default(),
        customer_name: first_str(data, CUSTOMER_NAME_FIELDS),
        customer_email: first_str(data, CUSTOMER_EMAIL_FIELDS),
        owner: owner_of(data, PROVIDER_EMAIL_FIELDS, PROVIDER_ID_FIELDS),
        city: first_str(data, CITY_FIELDS),
        base_price: optional_price(data, BASE_PRICE_FIELDS).unwrap_or_default(),
        commission_rate: optional_rate(data),
        commission_amount: optional_price(data, COMMISSION_FIELDS),
        total_price: optional_price(data, TOTAL_FIELDS),
        provider_share: optional_price(data, SHARE_FIELDS),
        status: BookingStatus::parse(&first_str(data, STATUS_FIELDS).unwrap_or_default()),
        created_at: timestamp(data, CREATED_FIELDS),
        updated_at: timestamp(data, UPDATED_FIELDS),
    }
}

pub fn service_listing(doc: &RawDocument) -> ServiceListing {
    let data = &doc.data;
    ServiceListing {
        id: RecordId::new(doc.id.clone()),
        service_name: first_str(data, LISTING_NAME_FIELDS).unwrap_or_default(),
        description: first_str(data, &["description"]),
        price: optional_price(data, LISTING_PRICE_FIELDS).unwrap_or_default(),
        duration: first_str(data, &["duration"]),
        category: first_str(data, CATEGORY_FIELDS),
        owner: owner_of(data, PROVIDER_EMAIL_FIELDS, PROVIDER_ID_FIELDS),
        available: first_value(data, AVAILABLE_FIELDS)
            .and_then(parse_bool)
            .unwrap_or(true),
        status: ListingStatus::parse(&first_str(data, LISTING_STATUS_FIELDS).unwrap_or_default()),
        created_at: timestamp(data, CREATED_FIELDS),
    }
}

pub fn notification(doc: &RawDocument) -> Notification {
    let data = &doc.data;
    let id = if doc.id.trim().is_empty() {
        None
    } else {
        Some(RecordId::new(doc.id.clone()))
    };
    Notification {
        id,
        audience: first_str(data, AUDIENCE_FIELDS).unwrap_or_default(),
        channel: Channel::parse(&first_str(data, CHANNEL_FIELDS).unwrap_or_default()),
        subject: first_str(data, SUBJECT_FIELDS).unwrap_or_default(),
        message: first_str(data, MESSAGE_FIELDS).unwrap_or_default(),
        status: first_str(data, &["status"]),
        sent_at: timestamp(data, SENT_AT_FIELDS).unwrap_or_default(),
        target: owner_of(data, TARGET_EMAIL_FIELDS, TARGET_ID_FIELDS),
        read_at: timestamp(data, &["readAt", "read_at"]),
    }
}

pub fn provider_profile(doc: &RawDocument) -> ProviderProfile {
    let data = &doc.data;
    ProviderProfile {
        id: RecordId::new(doc.id.clone()),
        display_name: first_str(data, DISPLAY_NAME_FIELDS),
        aliases: build_alias_set(data),
        status: ListingStatus::parse(&first_str(data, LISTING_STATUS_FIELDS).unwrap_or_default()),
        category: first_str(data, CATEGORY_FIELDS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_booking_field_fallbacks() {
        let doc = RawDocument::new(
            "b1",
            json!({
                "serviceName": "Deep Clean",
                "provider_email": "Pro@Example.com",
                "provider": "SP-9",
                "price": "$120.00",
                "status": "Requested",
                "createdAt": {"seconds": 1700000000, "nanoseconds": 500000000}
            }),
        );
        let b = booking(&doc);
        assert_eq!(b.service, "Deep Clean");
        assert_eq!(b.owner.email.as_deref(), Some("pro@example.com"));
        assert_eq!(b.owner.provider_id.as_deref(), Some("sp-9"));
        assert_eq!(b.base_price, d("120"));
        assert_eq!(b.status, BookingStatus::New);
        assert_eq!(b.created_at, Some(TimeMs::new(1_700_000_000_500)));
        assert_eq!(b.total_price, None);
        assert_eq!(b.commission_amount, None);
    }

    #[test]
    fn test_booking_first_non_empty_candidate_wins() {
        let doc = RawDocument::new(
            "b2",
            json!({"providerEmail": "  ", "provider_email": "second@x.com"}),
        );
        assert_eq!(booking(&doc).owner.email.as_deref(), Some("second@x.com"));
    }

    #[test]
    fn test_booking_garbage_price_clamps_to_zero() {
        let doc = RawDocument::new("b3", json!({"basePrice": "abc", "totalPrice": -5}));
        let b = booking(&doc);
        assert_eq!(b.base_price, Decimal::zero());
        assert_eq!(b.total_price, Some(Decimal::zero()));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp(&json!(1_700_000_000)), Some(TimeMs::new(1_700_000_000_000)));
        assert_eq!(
            parse_timestamp(&json!(1_700_000_000_123_i64)),
            Some(TimeMs::new(1_700_000_000_123))
        );
        assert_eq!(
            parse_timestamp(&json!("1970-01-01T00:00:01Z")),
            Some(TimeMs::new(1000))
        );
        assert_eq!(parse_timestamp(&json!("1970-01-02")), Some(TimeMs::new(86_400_000)));
        assert_eq!(
            parse_timestamp(&json!({"_seconds": 2, "_nanoseconds": 0})),
            Some(TimeMs::new(2000))
        );
        assert_eq!(parse_timestamp(&json!("not a date")), None);
        assert_eq!(parse_timestamp(&json!(i64::MIN)), Some(TimeMs::new(i64::MIN)));
        assert_eq!(parse_timestamp(&json!({"seconds": i64::MAX})), None);
        assert_eq!(parse_timestamp(&json!({"seconds": i64::MIN, "nanoseconds": 5})), None);
        assert_eq!(
            parse_timestamp(&json!({"seconds": i64::MAX / 1000, "nanoseconds": 999_999_999})),
            None
        );
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_written_timestamps_read_back_exactly() {
        for ms in [0, 5, 999, 1_000, 99_999_999_999, 1_700_000_000_123, -86_400_001] {
            let at = TimeMs::new(ms);
            assert_eq!(parse_timestamp(&timestamp_value(at)), Some(at), "ms={}", ms);
        }
    }

    #[test]
    fn test_service_listing_defaults() {
        let doc = RawDocument::new("s1", json!({"name": "Tutoring", "available": "no"}));
        let s = service_listing(&doc);
        assert_eq!(s.service_name, "Tutoring");
        assert!(!s.available);
        assert_eq!(s.status, ListingStatus::Pending);
        assert!(s.visible());
    }

    #[test]
    fn test_notification_targeting() {
        let doc = RawDocument::new(
            "n1",
            json!({
                "audience": "Service Providers",
                "channel": "In-App",
                "subject": "Payout",
                "message": "Sent",
                "sentAt": "2024-01-01T00:00:00Z",
                "providerId": "SP-1"
            }),
        );
        let n = notification(&doc);
        assert!(!n.is_broadcast());
        assert_eq!(n.target.provider_id.as_deref(), Some("sp-1"));
        assert_eq!(n.channel, Channel::InApp);
        assert_eq!(n.id, Some(RecordId::new("n1")));
    }

    #[test]
    fn test_provider_profile_aliases() {
        let doc = RawDocument::new(
            "SP-1",
            json!({
                "email": "A@x.com",
                "contactEmail": "b@x.com",
                "ownerEmail": "a@X.com",
                "businessName": "Acme Repairs",
                "status": "Approved"
            }),
        );
        let p = provider_profile(&doc);
        assert_eq!(p.aliases.len(), 2);
        assert!(p.aliases.contains("a@x.com"));
        assert_eq!(p.display_name.as_deref(), Some("Acme Repairs"));
        assert_eq!(p.status, ListingStatus::Approved);
    }
}
