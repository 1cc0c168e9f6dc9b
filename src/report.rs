//! CSV export of bookings for administrators.

use crate::domain::Booking;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct BookingRow<'a> {
    id: &'a str,
    service: &'a str,
    customer: &'a str,
    provider_email: &'a str,
    provider_id: &'a str,
    city: &'a str,
    status: &'a str,
    base_price: String,
    commission: String,
    total_price: String,
    provider_share: String,
    created_at: String,
}

impl<'a> BookingRow<'a> {
    fn from_booking(b: &'a Booking) -> Self {
        Self {
            id: b.id.as_str(),
            service: &b.service,
            customer: b
                .customer_name
                .as_deref()
                .or(b.customer_email.as_deref())
                .unwrap_or(""),
            provider_email: b.owner.email.as_deref().unwrap_or(""),
            provider_id: b.owner.provider_id.as_deref().unwrap_or(""),
            city: b.city.as_deref().unwrap_or(""),
            status: b.status.as_str(),
            base_price: b.base_price.round_currency().to_string(),
            commission: b.commission_amount.unwrap_or_default().round_currency().to_string(),
            total_price: b
                .total_price
                .unwrap_or(b.base_price)
                .round_currency()
                .to_string(),
            provider_share: b
                .provider_share
                .unwrap_or(b.base_price)
                .round_currency()
                .to_string(),
            created_at: b.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        }
    }
}

/// Write one header row plus one row per booking. Returns rows written.
pub fn write_bookings_csv<'a, I, W>(bookings: I, writer: W) -> Result<usize, ReportError>
where
    I: IntoIterator<Item = &'a Booking>,
    W: Write,
{
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    let mut rows = 0;
    for booking in bookings {
        csv_writer.serialize(BookingRow::from_booking(booking))?;
        rows += 1;
    }
    csv_writer.flush()?;
    Ok(rows)
}
