//! Canonical marketplace records.
//!
//! This module provides:
//! - Money-safe numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, RecordId, OwnerRef
//! - Booking, ServiceListing, ProviderProfile and Notification records
//! - Boundary normalization from raw store documents

pub mod booking;
pub mod decimal;
pub mod listing;
pub mod normalize;
pub mod notification;
pub mod primitives;

pub use booking::{Booking, BookingStatus};
pub use decimal::Decimal;
pub use listing::{ListingStatus, ProviderProfile, ServiceListing};
pub use normalize::RawDocument;
pub use notification::{Channel, Notification};
pub use primitives::{normalize_key, OwnerRef, RecordId, TimeMs};
