//! Dashboard counters derived from in-memory collections.

use crate::domain::{Booking, BookingStatus, Decimal, ListingStatus, ProviderProfile, ServiceListing};
use crate::engine::money::{summarize_bookings, BookingSummary, CurrencyFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationCounts {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub suspended: usize,
    pub other: usize,
}

impl ModerationCounts {
    pub fn tally<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a ListingStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            match status {
                ListingStatus::Pending => counts.pending += 1,
                ListingStatus::Approved => counts.approved += 1,
                ListingStatus::Rejected => counts.rejected += 1,
                ListingStatus::Suspended => counts.suspended += 1,
                ListingStatus::Unrecognized(_) => counts.other += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCounts {
    pub total: usize,
    pub new: usize,
    pub accepted: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub rejected: usize,
    pub other: usize,
}

impl BookingCounts {
    pub fn tally<'a, I>(bookings: I) -> Self
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        let mut counts = Self::default();
        for booking in bookings {
            counts.total += 1;
            match booking.status {
                BookingStatus::New => counts.new += 1,
                BookingStatus::Accepted => counts.accepted += 1,
                BookingStatus::InProgress => counts.in_progress += 1,
                BookingStatus::Completed => counts.completed += 1,
                BookingStatus::Cancelled => counts.cancelled += 1,
                BookingStatus::Rejected => counts.rejected += 1,
                BookingStatus::Unrecognized(_) => counts.other += 1,
            }
        }
        counts
    }

    /// Percentage of bookings completed; zero when there are none.
    pub fn completion_rate(&self) -> Decimal {
        ratio(self.completed, self.total)
    }

    pub fn cancellation_rate(&self) -> Decimal {
        ratio(self.cancelled, self.total)
    }
}

fn ratio(part: usize, whole: usize) -> Decimal {
    Decimal::from(part).percent_of(Decimal::from(whole))
}

/// Money totals rendered for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedTotals {
    pub admin_total: String,
    pub provider_total: String,
    pub total_volume: String,
}

impl FormattedTotals {
    pub fn new(summary: &BookingSummary, format: &CurrencyFormat) -> Self {
        Self {
            admin_total: format.format(summary.admin_total),
            provider_total: format.format(summary.provider_total),
            total_volume: format.format(summary.total_volume),
        }
    }
}

/// Platform-wide administrator dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub providers: ModerationCounts,
    pub services: ModerationCounts,
    pub services_visible: usize,
    pub bookings: BookingCounts,
    pub totals: BookingSummary,
    pub completion_rate: Decimal,
    pub cancellation_rate: Decimal,
    pub formatted: FormattedTotals,
}

impl DashboardSummary {
    pub fn compute(
        providers: &[ProviderProfile],
        services: &[ServiceListing],
        bookings: &[Booking],
        format: &CurrencyFormat,
    ) -> Self {
        let booking_counts = BookingCounts::tally(bookings);
        let totals = summarize_bookings(bookings);
        Self {
            providers: ModerationCounts::tally(providers.iter().map(|p| &p.status)),
            services: ModerationCounts::tally(services.iter().map(|s| &s.status)),
            services_visible: services.iter().filter(|s| s.visible()).count(),
            bookings: booking_counts,
            totals,
            completion_rate: booking_counts.completion_rate(),
            cancellation_rate: booking_counts.cancellation_rate(),
            formatted: FormattedTotals::new(&totals, format),
        }
    }
}

/// One provider's dashboard header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub bookings: BookingCounts,
    pub services: ModerationCounts,
    pub services_visible: usize,
    pub totals: BookingSummary,
    /// Provider share of completed bookings only.
    pub earnings: Decimal,
    pub completion_rate: Decimal,
    pub formatted: FormattedTotals,
    pub formatted_earnings: String,
}

impl ProviderSummary {
    /// Inputs must already be restricted to the provider's own records.
    pub fn compute(
        services: &[ServiceListing],
        bookings: &[Booking],
        format: &CurrencyFormat,
    ) -> Self {
        let booking_counts = BookingCounts::tally(bookings);
        let totals = summarize_bookings(bookings);
        let earnings = summarize_bookings(
            bookings
                .iter()
                .filter(|b| b.status == BookingStatus::Completed),
        )
        .provider_total;
        Self {
            bookings: booking_counts,
            services: ModerationCounts::tally(services.iter().map(|s| &s.status)),
            services_visible: services.iter().filter(|s| s.visible()).count(),
            totals,
            earnings,
            completion_rate: booking_counts.completion_rate(),
            formatted: FormattedTotals::new(&totals, format),
            formatted_earnings: format.format(earnings),
        }
    }
}
