//! Booking (service request) record and its status vocabulary.

use crate::domain::{Decimal, OwnerRef, RecordId, TimeMs};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a booking.
///
/// Raw store values are matched case-insensitively; anything not recognized
/// is kept verbatim in `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    /// Blank, "pending", "new", "request" or "requested".
    New,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    /// Administrative rejection ("rejected" or "declined").
    Rejected,
    Unrecognized(String),
}

impl BookingStatus {
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "" | "pending" | "new" | "request" | "requested" => BookingStatus::New,
            "accepted" => BookingStatus::Accepted,
            "in progress" | "in-progress" | "in_progress" | "inprogress" => {
                BookingStatus::InProgress
            }
            "completed" => BookingStatus::Completed,
            "cancelled" | "canceled" => BookingStatus::Cancelled,
            "rejected" | "declined" => BookingStatus::Rejected,
            _ => BookingStatus::Unrecognized(raw.trim().to_string()),
        }
    }

    /// The value written back to the store.
    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::New => "Pending",
            BookingStatus::Accepted => "Accepted",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Unrecognized(raw) => raw,
        }
    }

    /// Conventional forward step used by "advance" actions. Advisory only:
    /// any status may be written regardless of what this returns.
    pub fn next_step(&self) -> Option<BookingStatus> {
        match self {
            BookingStatus::New => Some(BookingStatus::Accepted),
            BookingStatus::Accepted => Some(BookingStatus::InProgress),
            BookingStatus::InProgress => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, BookingStatus::Unrecognized(_))
    }
}

impl From<String> for BookingStatus {
    fn from(value: String) -> Self {
        BookingStatus::parse(&value)
    }
}

impl From<BookingStatus> for String {
    fn from(value: BookingStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One customer request for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: RecordId,
    pub service: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub owner: OwnerRef,
    pub city: Option<String>,
    pub base_price: Decimal,
    pub commission_rate: Option<Decimal>,
    pub commission_amount: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub provider_share: Option<Decimal>,
    pub status: BookingStatus,
    pub created_at: Option<TimeMs>,
    pub updated_at: Option<TimeMs>,
}

impl Booking {
    /// A bare booking in the `New` state; used by tests and fixtures.
    pub fn new(id: impl Into<String>, service: impl Into<String>, base_price: Decimal) -> Self {
        Self {
            id: RecordId::new(id),
            service: service.into(),
            customer_name: None,
            customer_email: None,
            owner: OwnerRef::default(),
            city: None,
            base_price,
            commission_rate: None,
            commission_amount: None,
            total_price: None,
            provider_share: None,
            status: BookingStatus::New,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, at: TimeMs) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Most recent mutation time, falling back to creation time.
    pub fn last_touched(&self) -> Option<TimeMs> {
        self.updated_at.or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_aliases() {
        for raw in ["", "  ", "pending", "NEW", "Request", "requested"] {
            assert_eq!(BookingStatus::parse(raw), BookingStatus::New, "raw={raw:?}");
        }
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(BookingStatus::parse("In Progress"), BookingStatus::InProgress);
        assert_eq!(BookingStatus::parse("in_progress"), BookingStatus::InProgress);
        assert_eq!(BookingStatus::parse("Canceled"), BookingStatus::Cancelled);
        assert_eq!(BookingStatus::parse("Declined"), BookingStatus::Rejected);
        assert_eq!(
            BookingStatus::parse(" weirdstatus "),
            BookingStatus::Unrecognized("weirdstatus".to_string())
        );
    }

    #[test]
    fn test_status_serializes_as_store_value() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let back: BookingStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, BookingStatus::Completed);
    }

    #[test]
    fn test_next_step_chain() {
        assert_eq!(BookingStatus::New.next_step(), Some(BookingStatus::Accepted));
        assert_eq!(
            BookingStatus::InProgress.next_step(),
            Some(BookingStatus::Completed)
        );
        assert_eq!(BookingStatus::Completed.next_step(), None);
    }
}
