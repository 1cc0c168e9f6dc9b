//! Optimistic local writes awaiting (or having failed) remote confirmation.
//!
//! A write is applied to the local view immediately and tracked here until a
//! snapshot from the source agrees with it, a newer remote write supersedes
//! it, or the caller discards it.

use crate::datasource::Collection;
use crate::domain::{Booking, ListingStatus, RecordId, ServiceListing, TimeMs};
use crate::engine::lifecycle::StatusChange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum PendingOp {
    BookingStatus { change: StatusChange },
    ListingStatus { status: ListingStatus },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum WriteState {
    /// Issued, no answer yet.
    Pending,
    /// Acknowledged by the source; waiting for a snapshot to reflect it.
    Confirmed,
    /// Rejected by the source. Still applied locally.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWrite {
    pub collection: Collection,
    pub id: RecordId,
    pub op: PendingOp,
    pub state: WriteState,
    pub issued_at: TimeMs,
    /// Issue order within this session; distinguishes writes made in the same millisecond.
    pub seq: u64,
}

impl PendingWrite {
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self.state, WriteState::Failed { .. })
    }
}

/// At most one outstanding write per record; a newer write replaces it.
#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    entries: HashMap<(Collection, RecordId), PendingWrite>,
    next_seq: u64,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new write, replacing any older one for the record. Returns the
    /// sequence number that `confirm` and `fail` expect.
    pub fn begin(&mut self, collection: Collection, id: RecordId, op: PendingOp, now: TimeMs) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let write = PendingWrite {
            collection,
            id: id.clone(),
            op,
            state: WriteState::Pending,
            issued_at: now,
            seq,
        };
        self.entries.insert((collection, id), write);
        seq
    }

    /// Mark write `seq` as acknowledged. A newer write to the same record is
    /// left alone.
    pub fn confirm(&mut self, collection: Collection, id: &RecordId, seq: u64) {
        if let Some(write) = self.current(collection, id, seq) {
            write.state = WriteState::Confirmed;
        }
    }

    pub fn fail(&mut self, collection: Collection, id: &RecordId, seq: u64, error: String) {
        if let Some(write) = self.current(collection, id, seq) {
            write.state = WriteState::Failed { error };
        }
    }

    fn current(&mut self, collection: Collection, id: &RecordId, seq: u64) -> Option<&mut PendingWrite> {
        self.entries
            .get_mut(&(collection, id.clone()))
            .filter(|write| write.seq == seq)
    }

    /// Drop a write without further reconciliation; the next snapshot wins.
    pub fn discard(&mut self, collection: Collection, id: &RecordId) -> Option<PendingWrite> {
        self.entries.remove(&(collection, id.clone()))
    }

    pub fn get(&self, collection: Collection, id: &RecordId) -> Option<&PendingWrite> {
        self.entries.get(&(collection, id.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failed writes, oldest first.
    pub fn needs_reconciliation(&self) -> Vec<PendingWrite> {
        let mut failed: Vec<PendingWrite> = self
            .entries
            .values()
            .filter(|w| w.needs_reconciliation())
            .cloned()
            .collect();
        failed.sort_by_key(|w| (w.issued_at, w.seq));
        failed
    }

    /// Retire booking writes the latest snapshot agrees with or supersedes.
    pub fn settle_bookings(&mut self, snapshot: &[Booking]) {
        let by_id: HashMap<&RecordId, &Booking> = snapshot.iter().map(|b| (&b.id, b)).collect();
        self.entries.retain(|(collection, id), write| {
            if *collection != Collection::Bookings {
                return true;
            }
            let remote = by_id.get(id);
            match (&write.op, remote) {
                (PendingOp::Delete, None) => false,
                (PendingOp::Delete, Some(_)) => true,
                (PendingOp::BookingStatus { change }, Some(remote)) => {
                    let agrees = remote.status == change.status;
                    let superseded = remote
                        .updated_at
                        .is_some_and(|remote_at| remote_at > change.updated_at);
                    !(agrees || superseded)
                }
                // The record vanished remotely; nothing left to overlay.
                (_, None) => false,
                (PendingOp::ListingStatus { .. }, Some(_)) => false,
            }
        });
    }

    /// Retire listing writes the latest snapshot agrees with.
    pub fn settle_services(&mut self, snapshot: &[ServiceListing]) {
        let by_id: HashMap<&RecordId, &ServiceListing> =
            snapshot.iter().map(|s| (&s.id, s)).collect();
        self.entries.retain(|(collection, id), write| {
            if *collection != Collection::Services {
                return true;
            }
            match (&write.op, by_id.get(id)) {
                (PendingOp::Delete, remote) => remote.is_some(),
                (PendingOp::ListingStatus { status }, Some(remote)) => remote.status != *status,
                _ => false,
            }
        });
    }

    pub fn overlay_bookings(&self, bookings: &mut Vec<Booking>) {
        bookings.retain(|b| {
            !matches!(
                self.get(Collection::Bookings, &b.id).map(|w| &w.op),
                Some(PendingOp::Delete)
            )
        });
        for booking in bookings.iter_mut() {
            if let Some(PendingOp::BookingStatus { change }) =
                self.get(Collection::Bookings, &booking.id).map(|w| &w.op)
            {
                change.apply(booking);
            }
        }
    }

    pub fn overlay_services(&self, services: &mut Vec<ServiceListing>) {
        services.retain(|s| {
            !matches!(
                self.get(Collection::Services, &s.id).map(|w| &w.op),
                Some(PendingOp::Delete)
            )
        });
        for listing in services.iter_mut() {
            if let Some(PendingOp::ListingStatus { status }) =
                self.get(Collection::Services, &listing.id).map(|w| &w.op)
            {
                listing.status = status.clone();
            }
        }
    }
}
