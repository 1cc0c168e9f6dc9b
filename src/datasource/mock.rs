//! In-process live-collection source for tests and offline runs.

use super::{Collection, DataSourceError, FieldFilter, LiveCollectionSource, Snapshot, SnapshotStream};
use crate::domain::{RawDocument, RecordId};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct State {
    documents: HashMap<Collection, Vec<RawDocument>>,
    channels: HashMap<Collection, watch::Sender<Snapshot>>,
}

impl State {
    fn publish(&mut self, collection: Collection) {
        let snapshot = self.documents.get(&collection).cloned().unwrap_or_default();
        self.channels
            .entry(collection)
            .or_insert_with(|| watch::channel(Vec::new()).0)
            .send_replace(snapshot);
    }
}

/// Collections held in memory, broadcast to subscribers on every change.
///
/// Documents keep insertion order. Writes can be made to fail to exercise
/// optimistic-update paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollectionSource {
    state: Arc<Mutex<State>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryCollectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document.
    pub fn with_document(self, collection: Collection, doc: RawDocument) -> Self {
        self.insert(collection, doc);
        self
    }

    /// Seed multiple documents.
    pub fn with_documents(self, collection: Collection, docs: Vec<RawDocument>) -> Self {
        for doc in docs {
            self.insert(collection, doc);
        }
        self
    }

    /// Insert or replace a document and notify subscribers.
    pub fn insert(&self, collection: Collection, doc: RawDocument) {
        let mut state = self.lock();
        let docs = state.documents.entry(collection).or_default();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        state.publish(collection);
    }

    /// Make every subsequent write, create and delete fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn documents(&self, collection: Collection) -> Vec<RawDocument> {
        self.lock()
            .documents
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<RawDocument> {
        self.documents(collection).into_iter().find(|d| d.id == id)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self, collection: Collection) -> Result<(), DataSourceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DataSourceError::PermissionDenied(format!(
                "writes to {} are disabled",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LiveCollectionSource for InMemoryCollectionSource {
    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<FieldFilter>,
    ) -> Result<SnapshotStream, DataSourceError> {
        let rx = {
            let mut state = self.lock();
            if !state.channels.contains_key(&collection) {
                state.publish(collection);
            }
            state
                .channels
                .get(&collection)
                .map(|tx| tx.subscribe())
                .ok_or_else(|| DataSourceError::Other(format!("no channel for {}", collection)))?
        };

        let stream = futures::stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, (rx, false)))
        })
        .map(move |snapshot| match &filter {
            Some(filter) => snapshot.into_iter().filter(|d| filter.matches(d)).collect(),
            None => snapshot,
        });

        Ok(stream.boxed())
    }

    async fn write(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> Result<(), DataSourceError> {
        self.check_writable(collection)?;
        let mut state = self.lock();
        let doc = state
            .documents
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id.as_str()))
            .ok_or_else(|| DataSourceError::NotFound(format!("{}/{}", collection, id)))?;
        doc.data.extend(patch);
        state.publish(collection);
        Ok(())
    }

    async fn create(
        &self,
        collection: Collection,
        record: Map<String, Value>,
    ) -> Result<RecordId, DataSourceError> {
        self.check_writable(collection)?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut state = self.lock();
        state
            .documents
            .entry(collection)
            .or_default()
            .push(RawDocument {
                id: id.clone(),
                data: record,
            });
        state.publish(collection);
        Ok(RecordId::new(id))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), DataSourceError> {
        self.check_writable(collection)?;
        let mut state = self.lock();
        let docs = state.documents.entry(collection).or_default();
        let before = docs.len();
        docs.retain(|d| d.id != id.as_str());
        if docs.len() == before {
            return Err(DataSourceError::NotFound(format!("{}/{}", collection, id)));
        }
        state.publish(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_yields_current_then_changes() {
        let source = InMemoryCollectionSource::new()
            .with_document(Collection::Bookings, RawDocument::new("b1", json!({"status": "new"})));

        let mut stream = source.subscribe(Collection::Bookings, None).await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 1);

        source.insert(Collection::Bookings, RawDocument::new("b2", json!({})));
        let second = stream.next().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_applies_filter() {
        let source = InMemoryCollectionSource::new()
            .with_document(Collection::Services, RawDocument::new("s1", json!({"providerId": "a"})))
            .with_document(Collection::Services, RawDocument::new("s2", json!({"providerId": "b"})));

        let mut stream = source
            .subscribe(Collection::Services, Some(FieldFilter::new("providerId", "b")))
            .await
            .unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "s2");
    }

    #[tokio::test]
    async fn test_write_merges_patch() {
        let source = InMemoryCollectionSource::new().with_document(
            Collection::Bookings,
            RawDocument::new("b1", json!({"status": "new", "service": "x"})),
        );
        let mut patch = Map::new();
        patch.insert("status".into(), json!("Accepted"));
        source
            .write(Collection::Bookings, &RecordId::new("b1"), patch)
            .await
            .unwrap();

        let doc = source.get(Collection::Bookings, "b1").unwrap();
        assert_eq!(doc.data["status"], "Accepted");
        assert_eq!(doc.data["service"], "x");
    }

    #[tokio::test]
    async fn test_write_missing_is_not_found() {
        let source = InMemoryCollectionSource::new();
        let err = source
            .write(Collection::Bookings, &RecordId::new("nope"), Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let source = InMemoryCollectionSource::new();
        source.set_fail_writes(true);
        let err = source
            .create(Collection::Notifications, Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::PermissionDenied(_)));

        source.set_fail_writes(false);
        let id = source.create(Collection::Notifications, Map::new()).await.unwrap();
        assert!(source.get(Collection::Notifications, id.as_str()).is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let source = InMemoryCollectionSource::new()
            .with_document(Collection::Bookings, RawDocument::new("b1", json!({})));
        source
            .delete(Collection::Bookings, &RecordId::new("b1"))
            .await
            .unwrap();
        assert!(source.documents(Collection::Bookings).is_empty());
        assert!(source
            .delete(Collection::Bookings, &RecordId::new("b1"))
            .await
            .is_err());
    }
}
