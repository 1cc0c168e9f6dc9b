//! Background task feeding live snapshots into a [`Marketplace`].

use super::session::Marketplace;
use crate::datasource::{Collection, DataSourceError};
use futures::stream::{select_all, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the subscriptions. Stopping or dropping the handle unsubscribes.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribe to every collection and apply each snapshot as it arrives.
///
/// Fails only if a subscription cannot be opened.
pub async fn spawn_sync(marketplace: Arc<Marketplace>) -> Result<SyncHandle, DataSourceError> {
    let source = marketplace.source();
    let mut streams = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        let stream = source.subscribe(collection, None).await?;
        streams.push(stream.map(move |snapshot| (collection, snapshot)).boxed());
    }

    let task = tokio::spawn(async move {
        let mut merged = select_all(streams);
        while let Some((collection, snapshot)) = merged.next().await {
            marketplace.apply_snapshot(collection, &snapshot).await;
        }
        warn!("All collection subscriptions ended");
    });

    info!(collections = Collection::ALL.len(), "Live sync started");
    Ok(SyncHandle { task })
}
