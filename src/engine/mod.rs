//! Pure marketplace logic: money, ownership, booking lifecycle, notification
//! feeds and dashboard summaries. Nothing in here performs I/O.

pub mod identity;
pub mod lifecycle;
pub mod money;
pub mod notifications;
pub mod summary;

pub use identity::{belongs_to_provider, build_alias_set, OwnershipCache, ProviderIdentity};
pub use lifecycle::{partition_bookings, BookingPartitions, StatusChange, Triage};
pub use money::{
    calculate_commission, default_commission_rate, format_currency, parse_price, parse_price_str,
    summarize_bookings, BookingSummary, CommissionBreakdown, CurrencyFormat,
};
pub use notifications::{
    FeedEntry, FeedUpdate, NotificationAggregator, Recipient, Role, Watermarks,
};
pub use summary::{BookingCounts, DashboardSummary, ModerationCounts, ProviderSummary};
