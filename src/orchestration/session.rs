//! The hosting session: live collections, per-viewer derived state and
//! optimistic commands.

use super::mirror::CollectionMirror;
use super::pending::{PendingOp, PendingWrite};
use crate::datasource::{Collection, DataSourceError, LiveCollectionSource};
use crate::db::{load_watermarks, save_watermarks, WatermarkStore};
use crate::domain::normalize::timestamp_value;
use crate::domain::{
    Booking, BookingStatus, Decimal, ListingStatus, Notification, OwnerRef, RawDocument,
    RecordId, ServiceListing, TimeMs,
};
use crate::engine::identity::{OwnershipCache, ProviderIdentity};
use crate::engine::lifecycle::{partition_bookings, BookingPartitions, StatusChange};
use crate::engine::money::{calculate_commission, CommissionBreakdown, CurrencyFormat};
use crate::engine::notifications::{FeedUpdate, NotificationAggregator, Recipient, Watermarks};
use crate::engine::summary::{DashboardSummary, ProviderSummary};
use moka::future::Cache;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Per-viewer state unused for this long is dropped.
const VIEWER_IDLE: Duration = Duration::from_secs(30 * 60);

/// Money, display and cache settings for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSettings {
    pub commission_rate: Decimal,
    pub currency: CurrencyFormat,
    /// Max cached notification feeds, and separately max ownership memos.
    pub viewer_cache_capacity: u64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            commission_rate: crate::engine::money::default_commission_rate(),
            currency: CurrencyFormat::default(),
            viewer_cache_capacity: 1_024,
        }
    }
}

/// Who is issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// May only touch records it owns.
    Provider(ProviderIdentity),
    Administrator,
}

impl Actor {
    fn may_touch(&self, owner: &OwnerRef) -> bool {
        match self {
            Actor::Provider(identity) => identity.matches(owner),
            Actor::Administrator => true,
        }
    }
}

/// The source refused a write. Any optimistic local change stays applied and
/// is listed by [`Marketplace::needs_reconciliation`].
#[derive(Debug, Error)]
#[error(
    "write to {collection} {} rejected: {source}",
    .id.as_ref().map(RecordId::as_str).unwrap_or("(new)")
)]
pub struct WriteRejected {
    pub collection: Collection,
    pub id: Option<RecordId>,
    #[source]
    pub source: DataSourceError,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{collection}/{id} not found")]
    UnknownRecord { collection: Collection, id: RecordId },
    #[error("{id} does not belong to the acting provider")]
    NotOwner { id: RecordId },
    #[error(transparent)]
    Rejected(#[from] WriteRejected),
}

pub struct Marketplace {
    source: Arc<dyn LiveCollectionSource>,
    watermarks: Arc<dyn WatermarkStore>,
    settings: MarketSettings,
    mirror: RwLock<CollectionMirror>,
    /// Keyed by recipient key, which is also the watermark key.
    feeds: Cache<String, Arc<Mutex<NotificationAggregator>>>,
    ownership: Cache<(String, Collection), Arc<Mutex<OwnershipCache>>>,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("source", &self.source)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    pub fn new(
        source: Arc<dyn LiveCollectionSource>,
        watermarks: Arc<dyn WatermarkStore>,
        settings: MarketSettings,
    ) -> Self {
        let feeds = Cache::builder()
            .max_capacity(settings.viewer_cache_capacity)
            .time_to_idle(VIEWER_IDLE)
            .build();
        let ownership = Cache::builder()
            .max_capacity(settings.viewer_cache_capacity)
            .time_to_idle(VIEWER_IDLE)
            .build();
        Self {
            source,
            watermarks,
            settings,
            mirror: RwLock::new(CollectionMirror::new()),
            feeds,
            ownership,
        }
    }

    pub fn source(&self) -> Arc<dyn LiveCollectionSource> {
        Arc::clone(&self.source)
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    pub async fn apply_snapshot(&self, collection: Collection, snapshot: &[RawDocument]) {
        self.mirror.write().await.apply_snapshot(collection, snapshot);
    }

    /// Snapshots applied to `collection` so far.
    pub async fn version(&self, collection: Collection) -> u64 {
        self.mirror.read().await.version(collection)
    }

    // ----- views -----

    /// Commission quote at the session's default rate unless one is given.
    pub fn quote(&self, base_price: Decimal, rate: Option<Decimal>) -> CommissionBreakdown {
        calculate_commission(base_price, Some(rate.unwrap_or(self.settings.commission_rate)))
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.mirror.read().await.bookings()
    }

    pub async fn all_services(&self) -> Vec<ServiceListing> {
        self.mirror.read().await.services()
    }

    /// Listings a customer may browse.
    pub async fn catalog(&self) -> Vec<ServiceListing> {
        let mut services = self.all_services().await;
        services.retain(|s| s.visible());
        services
    }

    pub async fn provider_bookings(&self, identity: &ProviderIdentity) -> BookingPartitions {
        let bookings = self.owned_bookings(identity).await;
        partition_bookings(&bookings)
    }

    pub async fn provider_services(&self, identity: &ProviderIdentity) -> Vec<ServiceListing> {
        let services = self.all_services().await;
        let memo = self.ownership_cache(identity, Collection::Services).await;
        let mut cache = memo.lock().await;
        cache.retain_ids(services.iter().map(|s| &s.id));
        services
            .into_iter()
            .filter(|s| cache.owns(identity, &s.id, &s.owner))
            .collect()
    }

    pub async fn provider_summary(&self, identity: &ProviderIdentity) -> ProviderSummary {
        let bookings = self.owned_bookings(identity).await;
        let services = self.provider_services(identity).await;
        ProviderSummary::compute(&services, &bookings, &self.settings.currency)
    }

    pub async fn admin_summary(&self) -> DashboardSummary {
        let mirror = self.mirror.read().await;
        DashboardSummary::compute(
            mirror.providers(),
            &mirror.services(),
            &mirror.bookings(),
            &self.settings.currency,
        )
    }

    async fn owned_bookings(&self, identity: &ProviderIdentity) -> Vec<Booking> {
        let bookings = self.all_bookings().await;
        let memo = self.ownership_cache(identity, Collection::Bookings).await;
        let mut cache = memo.lock().await;
        cache.retain_ids(bookings.iter().map(|b| &b.id));
        bookings
            .into_iter()
            .filter(|b| cache.owns(identity, &b.id, &b.owner))
            .collect()
    }

    async fn ownership_cache(
        &self,
        identity: &ProviderIdentity,
        collection: Collection,
    ) -> Arc<Mutex<OwnershipCache>> {
        self.ownership
            .get_with((cache_key(identity), collection), async {
                Arc::new(Mutex::new(OwnershipCache::new()))
            })
            .await
    }

    /// Cached feeds plus ownership memos, after pending evictions settle.
    pub async fn viewer_state_len(&self) -> u64 {
        self.feeds.run_pending_tasks().await;
        self.ownership.run_pending_tasks().await;
        self.feeds.entry_count() + self.ownership.entry_count()
    }

    /// Failed optimistic writes still applied locally, oldest first.
    pub async fn needs_reconciliation(&self) -> Vec<PendingWrite> {
        self.mirror.read().await.pending().needs_reconciliation()
    }

    /// Drop a local write so the next snapshot shows the remote value.
    pub async fn discard(&self, collection: Collection, id: &RecordId) -> bool {
        self.mirror
            .write()
            .await
            .pending_mut()
            .discard(collection, id)
            .is_some()
    }

    // ----- notifications -----

    pub async fn notification_feed(&self, recipient: &Recipient) -> FeedUpdate {
        let notifications = self.mirror.read().await.notifications().to_vec();
        let aggregator = self.aggregator(recipient).await;
        let update = aggregator.lock().await.recompute(&notifications);
        update
    }

    pub async fn mark_notifications_seen(&self, recipient: &Recipient, now: TimeMs) -> Watermarks {
        let aggregator = self.aggregator(recipient).await;
        let watermarks = aggregator.lock().await.mark_seen(now);
        self.persist_watermarks(recipient, &watermarks).await;
        watermarks
    }

    pub async fn clear_notifications(&self, recipient: &Recipient, now: TimeMs) -> Watermarks {
        let aggregator = self.aggregator(recipient).await;
        let watermarks = aggregator.lock().await.clear(now);
        self.persist_watermarks(recipient, &watermarks).await;
        watermarks
    }

    /// The recipient's aggregator, re-targeted at the caller's current
    /// identity so newly added aliases take effect.
    async fn aggregator(&self, recipient: &Recipient) -> Arc<Mutex<NotificationAggregator>> {
        let key = recipient.key();
        let aggregator = self
            .feeds
            .get_with(key.clone(), async {
                let watermarks = match load_watermarks(self.watermarks.as_ref(), &key).await {
                    Ok(watermarks) => watermarks,
                    Err(e) => {
                        warn!(recipient = %key, error = %e, "Failed to load watermarks; starting unread");
                        Watermarks::default()
                    }
                };
                Arc::new(Mutex::new(NotificationAggregator::with_watermarks(
                    recipient.clone(),
                    watermarks,
                )))
            })
            .await;
        aggregator.lock().await.retarget(recipient.clone());
        aggregator
    }

    async fn persist_watermarks(&self, recipient: &Recipient, watermarks: &Watermarks) {
        let key = recipient.key();
        if let Err(e) = save_watermarks(self.watermarks.as_ref(), &key, watermarks).await {
            warn!(recipient = %key, error = %e, "Failed to persist watermarks");
        }
    }

    /// Create a notification. It shows up in feeds immediately and again (de-duplicated)
    /// once the source delivers it. A refused create leaves nothing behind, so
    /// there is nothing to reconcile.
    pub async fn send_notification(&self, notification: Notification) -> Result<RecordId, DataSourceError> {
        let document = notification_document(&notification);
        match self.source.create(Collection::Notifications, document).await {
            Ok(id) => {
                info!(id = %id, audience = %notification.audience, "Notification sent");
                self.mirror
                    .write()
                    .await
                    .push_notification(notification.with_id(id.as_str()));
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create notification");
                Err(e)
            }
        }
    }

    // ----- booking and listing commands -----

    pub async fn update_booking_status(
        &self,
        actor: &Actor,
        id: &RecordId,
        status: BookingStatus,
        now: TimeMs,
    ) -> Result<Booking, CommandError> {
        let mut booking = self.authorize_booking(actor, id).await?;
        let change = StatusChange::new(status, now);
        change.apply(&mut booking);
        self.commit(
            Collection::Bookings,
            id,
            PendingOp::BookingStatus { change },
            now,
        )
        .await?;
        Ok(booking)
    }

    pub async fn delete_booking(
        &self,
        actor: &Actor,
        id: &RecordId,
        now: TimeMs,
    ) -> Result<(), CommandError> {
        self.authorize_booking(actor, id).await?;
        self.commit(Collection::Bookings, id, PendingOp::Delete, now)
            .await?;
        Ok(())
    }

    pub async fn update_listing_status(
        &self,
        actor: &Actor,
        id: &RecordId,
        status: ListingStatus,
        now: TimeMs,
    ) -> Result<ServiceListing, CommandError> {
        let mut listing = self.authorize_listing(actor, id).await?;
        listing.status = status.clone();
        self.commit(
            Collection::Services,
            id,
            PendingOp::ListingStatus { status },
            now,
        )
        .await?;
        Ok(listing)
    }

    pub async fn delete_listing(
        &self,
        actor: &Actor,
        id: &RecordId,
        now: TimeMs,
    ) -> Result<(), CommandError> {
        self.authorize_listing(actor, id).await?;
        self.commit(Collection::Services, id, PendingOp::Delete, now)
            .await?;
        Ok(())
    }

    async fn authorize_booking(&self, actor: &Actor, id: &RecordId) -> Result<Booking, CommandError> {
        let booking = self
            .mirror
            .read()
            .await
            .booking(id)
            .ok_or_else(|| CommandError::UnknownRecord {
                collection: Collection::Bookings,
                id: id.clone(),
            })?;
        if !actor.may_touch(&booking.owner) {
            return Err(CommandError::NotOwner { id: id.clone() });
        }
        Ok(booking)
    }

    async fn authorize_listing(
        &self,
        actor: &Actor,
        id: &RecordId,
    ) -> Result<ServiceListing, CommandError> {
        let listing = self
            .mirror
            .read()
            .await
            .service(id)
            .ok_or_else(|| CommandError::UnknownRecord {
                collection: Collection::Services,
                id: id.clone(),
            })?;
        if !actor.may_touch(&listing.owner) {
            return Err(CommandError::NotOwner { id: id.clone() });
        }
        Ok(listing)
    }

    /// Apply locally, then write remotely. The local change is kept either way.
    async fn commit(
        &self,
        collection: Collection,
        id: &RecordId,
        op: PendingOp,
        now: TimeMs,
    ) -> Result<(), WriteRejected> {
        let seq = self
            .mirror
            .write()
            .await
            .pending_mut()
            .begin(collection, id.clone(), op.clone(), now);

        let result = match &op {
            PendingOp::BookingStatus { change } => {
                self.source.write(collection, id, change.to_patch()).await
            }
            PendingOp::ListingStatus { status } => {
                self.source
                    .write(collection, id, listing_status_patch(status, now))
                    .await
            }
            PendingOp::Delete => self.source.delete(collection, id).await,
        };

        let mut mirror = self.mirror.write().await;
        match result {
            Ok(()) => {
                mirror.pending_mut().confirm(collection, id, seq);
                debug!(%collection, id = %id, "Write confirmed");
                Ok(())
            }
            Err(e) => {
                warn!(
                    %collection,
                    id = %id,
                    error = %e,
                    "Write failed; local change kept for reconciliation"
                );
                mirror
                    .pending_mut()
                    .fail(collection, id, seq, e.to_string());
                Err(WriteRejected {
                    collection,
                    id: Some(id.clone()),
                    source: e,
                })
            }
        }
    }
}

/// Ownership decisions depend on every alias, not just the provider id.
fn cache_key(identity: &ProviderIdentity) -> String {
    let aliases: Vec<&str> = identity.aliases.iter().map(String::as_str).collect();
    format!("{}#{}", identity.key(), aliases.join(","))
}

fn listing_status_patch(status: &ListingStatus, now: TimeMs) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("status".to_string(), json!(status.as_str()));
    patch.insert("updatedAt".to_string(), timestamp_value(now));
    patch
}

/// Store document for a new notification.
pub fn notification_document(n: &Notification) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("audience".to_string(), json!(n.audience));
    doc.insert("channel".to_string(), json!(n.channel.as_str()));
    doc.insert("subject".to_string(), json!(n.subject));
    doc.insert("message".to_string(), json!(n.message));
    doc.insert(
        "status".to_string(),
        json!(n.status.as_deref().unwrap_or("Sent")),
    );
    doc.insert("sentAt".to_string(), timestamp_value(n.sent_at));
    if let Some(email) = &n.target.email {
        doc.insert("providerEmail".to_string(), json!(email));
    }
    if let Some(provider_id) = &n.target.provider_id {
        doc.insert("providerId".to_string(), json!(provider_id));
    }
    doc
}
