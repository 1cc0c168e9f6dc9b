//! Booking status transitions and provider triage partitions.
//!
//! Transitions are permissive: any status may be written over any other and
//! concurrent writers resolve by last write wins on `updatedAt`.

use crate::domain::normalize::timestamp_value;
use crate::domain::{Booking, BookingStatus, TimeMs};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Which triage queue a booking belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Triage {
    New,
    Managed,
    Uncategorized,
}

pub fn triage(status: &BookingStatus) -> Triage {
    match status {
        BookingStatus::New => Triage::New,
        BookingStatus::Accepted
        | BookingStatus::InProgress
        | BookingStatus::Completed
        | BookingStatus::Cancelled => Triage::Managed,
        BookingStatus::Rejected | BookingStatus::Unrecognized(_) => Triage::Uncategorized,
    }
}

/// A provider's bookings split into mutually exclusive queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPartitions {
    pub new: Vec<Booking>,
    pub managed: Vec<Booking>,
    /// Administrative or unrecognized statuses, kept out of both queues.
    pub uncategorized: Vec<Booking>,
}

impl BookingPartitions {
    pub fn len(&self) -> usize {
        self.new.len() + self.managed.len() + self.uncategorized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition bookings, newest first within each queue.
pub fn partition_bookings<'a, I>(bookings: I) -> BookingPartitions
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut partitions = BookingPartitions::default();
    for booking in bookings {
        match triage(&booking.status) {
            Triage::New => partitions.new.push(booking.clone()),
            Triage::Managed => partitions.managed.push(booking.clone()),
            Triage::Uncategorized => {
                if let BookingStatus::Unrecognized(raw) = &booking.status {
                    warn!(
                        booking_id = %booking.id,
                        status = %raw,
                        "Booking has unrecognized status; excluded from new and managed queues"
                    );
                }
                partitions.uncategorized.push(booking.clone());
            }
        }
    }

    for queue in [
        &mut partitions.new,
        &mut partitions.managed,
        &mut partitions.uncategorized,
    ] {
        queue.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    partitions
}

/// A status write: the new status stamped with the time it was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: BookingStatus,
    pub updated_at: TimeMs,
}

impl StatusChange {
    pub fn new(status: BookingStatus, updated_at: TimeMs) -> Self {
        Self { status, updated_at }
    }

    /// Explicit demotion back to the new queue.
    pub fn demote(updated_at: TimeMs) -> Self {
        Self::new(BookingStatus::New, updated_at)
    }

    pub fn cancel(updated_at: TimeMs) -> Self {
        Self::new(BookingStatus::Cancelled, updated_at)
    }

    /// The conventional next step for `current`, if any.
    pub fn advance(current: &BookingStatus, updated_at: TimeMs) -> Option<Self> {
        current
            .next_step()
            .map(|status| Self::new(status, updated_at))
    }

    /// Patch document written to the store.
    pub fn to_patch(&self) -> Map<String, Value> {
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(self.status.as_str()));
        patch.insert("updatedAt".to_string(), timestamp_value(self.updated_at));
        patch
    }

    /// Record the change on a booking. Never refuses.
    pub fn apply(&self, booking: &mut Booking) {
        booking.status = self.status.clone();
        booking.updated_at = Some(self.updated_at);
    }
}

/// Last-write-wins merge of two versions of the same booking.
pub fn last_write_wins(a: Booking, b: Booking) -> Booking {
    if b.last_touched() >= a.last_touched() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    fn booking(id: &str, status: &str, created: i64) -> Booking {
        Booking::new(id, "Repair", Decimal::zero())
            .with_status(BookingStatus::parse(status))
            .with_created_at(TimeMs::new(created))
    }

    #[test]
    fn test_triage_rules() {
        assert_eq!(triage(&BookingStatus::parse("")), Triage::New);
        assert_eq!(triage(&BookingStatus::parse("requested")), Triage::New);
        assert_eq!(triage(&BookingStatus::parse("Accepted")), Triage::Managed);
        assert_eq!(triage(&BookingStatus::parse("in progress")), Triage::Managed);
        assert_eq!(triage(&BookingStatus::parse("Cancelled")), Triage::Managed);
        assert_eq!(triage(&BookingStatus::parse("Rejected")), Triage::Uncategorized);
        assert_eq!(triage(&BookingStatus::parse("weird")), Triage::Uncategorized);
    }

    #[test]
    fn test_partitions_sorted_newest_first() {
        let bookings = vec![
            booking("old", "pending", 1),
            booking("new", "pending", 3),
            booking("mid", "pending", 2),
        ];
        let p = partition_bookings(&bookings);
        let ids: Vec<_> = p.new.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_status_change_apply_and_patch() {
        let mut b = booking("b1", "pending", 1);
        let change = StatusChange::new(BookingStatus::InProgress, TimeMs::new(99));
        change.apply(&mut b);
        assert_eq!(b.status, BookingStatus::InProgress);
        assert_eq!(b.updated_at, Some(TimeMs::new(99)));

        let patch = change.to_patch();
        assert_eq!(patch["status"], "In Progress");
        assert_eq!(patch["updatedAt"], "1970-01-01T00:00:00.099+00:00");
    }

    #[test]
    fn test_any_transition_is_recorded() {
        let mut b = booking("b1", "completed", 1);
        StatusChange::demote(TimeMs::new(5)).apply(&mut b);
        assert_eq!(b.status, BookingStatus::New);
        StatusChange::cancel(TimeMs::new(6)).apply(&mut b);
        assert_eq!(b.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_advance_follows_next_step() {
        let change = StatusChange::advance(&BookingStatus::Accepted, TimeMs::new(1)).unwrap();
        assert_eq!(change.status, BookingStatus::InProgress);
        assert!(StatusChange::advance(&BookingStatus::Cancelled, TimeMs::new(1)).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut a = booking("b1", "accepted", 1);
        a.updated_at = Some(TimeMs::new(10));
        let mut b = booking("b1", "cancelled", 1);
        b.updated_at = Some(TimeMs::new(20));
        assert_eq!(last_write_wins(a.clone(), b.clone()).status, BookingStatus::Cancelled);
        assert_eq!(last_write_wins(b, a).status, BookingStatus::Cancelled);
    }
}
