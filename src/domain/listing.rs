//! Service listings and provider directory entries.

use crate::domain::{Decimal, OwnerRef, RecordId, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Moderation status of a listing or a provider profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ListingStatus {
    /// Blank or "pending".
    Pending,
    /// "approved", "active", "published" or "live".
    Approved,
    Rejected,
    Suspended,
    Unrecognized(String),
}

impl ListingStatus {
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "" | "pending" => ListingStatus::Pending,
            "approved" | "active" | "published" | "live" => ListingStatus::Approved,
            "rejected" => ListingStatus::Rejected,
            "suspended" => ListingStatus::Suspended,
            _ => ListingStatus::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ListingStatus::Pending => "Pending",
            ListingStatus::Approved => "Approved",
            ListingStatus::Rejected => "Rejected",
            ListingStatus::Suspended => "Suspended",
            ListingStatus::Unrecognized(raw) => raw,
        }
    }

    /// Pending listings are shown unless explicitly suspended or rejected.
    pub fn is_visible(&self) -> bool {
        matches!(self, ListingStatus::Pending | ListingStatus::Approved)
    }
}

impl From<String> for ListingStatus {
    fn from(value: String) -> Self {
        ListingStatus::parse(&value)
    }
}

impl From<ListingStatus> for String {
    fn from(value: ListingStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provider's published offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListing {
    pub id: RecordId,
    pub service_name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration: Option<String>,
    pub category: Option<String>,
    pub owner: OwnerRef,
    pub available: bool,
    pub status: ListingStatus,
    pub created_at: Option<TimeMs>,
}

impl ServiceListing {
    pub fn new(id: impl Into<String>, service_name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: RecordId::new(id),
            service_name: service_name.into(),
            description: None,
            price,
            duration: None,
            category: None,
            owner: OwnerRef::default(),
            available: true,
            status: ListingStatus::Pending,
            created_at: None,
        }
    }

    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_status(mut self, status: ListingStatus) -> Self {
        self.status = status;
        self
    }

    /// Derived from status; never stored independently.
    pub fn visible(&self) -> bool {
        self.status.is_visible()
    }
}

/// A provider directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub id: RecordId,
    pub display_name: Option<String>,
    /// Lower-cased email aliases found on the profile.
    pub aliases: BTreeSet<String>,
    pub status: ListingStatus,
    pub category: Option<String>,
}
