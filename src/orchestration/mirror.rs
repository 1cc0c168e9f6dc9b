//! Latest normalized contents of every collection, with local writes on top.

use super::pending::{PendingOp, PendingWrites};
use crate::datasource::Collection;
use crate::domain::{
    normalize, Booking, Notification, ProviderProfile, RawDocument, RecordId, ServiceListing,
};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CollectionMirror {
    bookings: Vec<Booking>,
    services: Vec<ServiceListing>,
    notifications: Vec<Notification>,
    providers: Vec<ProviderProfile>,
    pending: PendingWrites,
    versions: HashMap<Collection, u64>,
}

impl CollectionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection with a fresh snapshot and retire any local writes
    /// it settles.
    pub fn apply_snapshot(&mut self, collection: Collection, snapshot: &[RawDocument]) {
        match collection {
            Collection::Bookings => {
                self.bookings = snapshot.iter().map(normalize::booking).collect();
                self.pending.settle_bookings(&self.bookings);
            }
            Collection::Services => {
                self.services = snapshot.iter().map(normalize::service_listing).collect();
                self.pending.settle_services(&self.services);
            }
            Collection::Notifications => {
                self.notifications = snapshot.iter().map(normalize::notification).collect();
            }
            Collection::Providers => {
                self.providers = snapshot.iter().map(normalize::provider_profile).collect();
            }
        }
        let version = self.versions.entry(collection).or_insert(0);
        *version += 1;
        debug!(
            %collection,
            docs = snapshot.len(),
            version = *version,
            pending = self.pending.len(),
            "Applied snapshot"
        );
    }

    /// Number of snapshots applied to `collection` so far.
    pub fn version(&self, collection: Collection) -> u64 {
        self.versions.get(&collection).copied().unwrap_or(0)
    }

    pub fn bookings(&self) -> Vec<Booking> {
        let mut bookings = self.bookings.clone();
        self.pending.overlay_bookings(&mut bookings);
        bookings
    }

    pub fn services(&self) -> Vec<ServiceListing> {
        let mut services = self.services.clone();
        self.pending.overlay_services(&mut services);
        services
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn providers(&self) -> &[ProviderProfile] {
        &self.providers
    }

    /// Booking as currently shown, i.e. with local writes applied.
    pub fn booking(&self, id: &RecordId) -> Option<Booking> {
        if matches!(
            self.pending.get(Collection::Bookings, id).map(|w| &w.op),
            Some(PendingOp::Delete)
        ) {
            return None;
        }
        let mut booking = self.bookings.iter().find(|b| &b.id == id)?.clone();
        if let Some(PendingOp::BookingStatus { change }) =
            self.pending.get(Collection::Bookings, id).map(|w| &w.op)
        {
            change.apply(&mut booking);
        }
        Some(booking)
    }

    pub fn service(&self, id: &RecordId) -> Option<ServiceListing> {
        self.services().into_iter().find(|s| &s.id == id)
    }

    /// Locally known notifications not yet present in a snapshot.
    pub fn push_notification(&mut self, notification: Notification) {
        let key = notification.key();
        if !self.notifications.iter().any(|n| n.key() == key) {
            self.notifications.push(notification);
        }
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingWrites {
        &mut self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookingStatus, TimeMs};
    use crate::engine::lifecycle::StatusChange;
    use serde_json::json;

    #[test]
    fn test_apply_snapshot_normalizes_and_versions() {
        let mut mirror = CollectionMirror::new();
        assert_eq!(mirror.version(Collection::Bookings), 0);

        mirror.apply_snapshot(
            Collection::Bookings,
            &[RawDocument::new(
                "b1",
                json!({"serviceName": "Cleaning", "status": "requested", "price": "$40"}),
            )],
        );
        assert_eq!(mirror.version(Collection::Bookings), 1);

        let bookings = mirror.bookings();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].service, "Cleaning");
        assert_eq!(bookings[0].status, BookingStatus::New);
    }

    #[test]
    fn test_overlay_survives_disagreeing_snapshot() {
        let mut mirror = CollectionMirror::new();
        let doc = RawDocument::new("b1", json!({"status": "pending"}));
        mirror.apply_snapshot(Collection::Bookings, std::slice::from_ref(&doc));

        let id = RecordId::new("b1");
        mirror.pending_mut().begin(
            Collection::Bookings,
            id.clone(),
            PendingOp::BookingStatus {
                change: StatusChange::new(BookingStatus::Accepted, TimeMs::new(5)),
            },
            TimeMs::new(5),
        );
        mirror.apply_snapshot(Collection::Bookings, &[doc]);
        assert_eq!(mirror.booking(&id).unwrap().status, BookingStatus::Accepted);

        mirror.apply_snapshot(
            Collection::Bookings,
            &[RawDocument::new("b1", json!({"status": "Accepted"}))],
        );
        assert!(mirror.pending().is_empty());
    }

    #[test]
    fn test_push_notification_dedupes() {
        let mut mirror = CollectionMirror::new();
        let n = normalize::notification(&RawDocument::new("n1", json!({"subject": "hi"})));
        mirror.push_notification(n.clone());
        mirror.push_notification(n);
        assert_eq!(mirror.notifications().len(), 1);
    }
}
