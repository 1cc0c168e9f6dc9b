//! REST document-API client implementation.
//!
//! Expects `GET/POST {base}/{collection}` and `PATCH/DELETE
//! {base}/{collection}/{id}`. Subscriptions are emulated by polling.

use super::{Collection, DataSourceError, FieldFilter, LiveCollectionSource, Snapshot, SnapshotStream};
use crate::domain::{RawDocument, RecordId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use futures::StreamExt;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Document store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCollectionSource {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_retry_elapsed: Duration,
}

impl HttpCollectionSource {
    pub fn new(base_url: String, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
            max_retry_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_retry_elapsed(mut self, max: Duration) -> Self {
        self.max_retry_elapsed = max;
        self
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.as_str())
    }

    fn document_url(&self, collection: Collection, id: &RecordId) -> String {
        format!("{}/{}/{}", self.base_url, collection.as_str(), id.as_str())
    }

    /// One request, with the failure classified for the retry policy.
    async fn attempt(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Map<String, Value>>,
    ) -> Result<Option<Value>, backoff::Error<DataSourceError>> {
        let mut request = self.client.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
        })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => {
                return Err(backoff::Error::permanent(DataSourceError::NotFound(
                    url.to_string(),
                )))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(backoff::Error::permanent(DataSourceError::PermissionDenied(
                    url.to_string(),
                )))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Rate limited".to_string(),
                }))
            }
            _ => {}
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            }));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Client error".to_string(),
            }));
        }

        let text = response
            .text()
            .await
            .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
    }

    /// Idempotent request, retried with exponential backoff on transient errors.
    async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Map<String, Value>>,
    ) -> Result<Option<Value>, DataSourceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };
        retry(backoff, || self.attempt(method.clone(), url, query, body)).await
    }

    async fn fetch_snapshot(
        &self,
        collection: Collection,
        filter: Option<&FieldFilter>,
    ) -> Result<Snapshot, DataSourceError> {
        let query: Vec<(String, String)> = filter
            .map(|f| {
                let value = match &f.equals {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                vec![(f.field.clone(), value)]
            })
            .unwrap_or_default();

        let url = self.collection_url(collection);
        let body = self
            .request_with_retry(Method::GET, &url, &query, None)
            .await?
            .unwrap_or(Value::Array(Vec::new()));
        let mut docs = parse_documents(&body)?;
        if let Some(filter) = filter {
            docs.retain(|d| filter.matches(d));
        }
        Ok(docs)
    }
}

/// Accepts `[{id, ...fields}]`, `[{id, data: {...}}]` or `{documents: [...]}`.
pub fn parse_documents(body: &Value) -> Result<Vec<RawDocument>, DataSourceError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("documents") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(DataSourceError::ParseError(
                    "Expected array or {documents: [...]}".to_string(),
                ))
            }
        },
        _ => return Err(DataSourceError::ParseError("Expected array response".to_string())),
    };

    let mut docs = Vec::with_capacity(items.len());
    for item in items {
        let Some(object) = item.as_object() else {
            warn!("Skipping non-object document in collection response");
            continue;
        };
        let id = match object.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                warn!("Skipping document without id");
                continue;
            }
        };
        let data = match object.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => {
                let mut data = object.clone();
                data.remove("id");
                data
            }
        };
        docs.push(RawDocument { id, data });
    }
    Ok(docs)
}

fn into_inner(err: backoff::Error<DataSourceError>) -> DataSourceError {
    match err {
        backoff::Error::Permanent(e) => e,
        backoff::Error::Transient { err, .. } => err,
    }
}

#[async_trait]
impl LiveCollectionSource for HttpCollectionSource {
    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<FieldFilter>,
    ) -> Result<SnapshotStream, DataSourceError> {
        let initial = self.fetch_snapshot(collection, filter.as_ref()).await?;
        let source = self.clone();

        let polls = futures::stream::unfold(
            (source, filter, initial.clone()),
            move |(source, filter, last)| async move {
                let mut last = last;
                loop {
                    tokio::time::sleep(source.poll_interval).await;
                    match source.fetch_snapshot(collection, filter.as_ref()).await {
                        Ok(snapshot) if snapshot != last => {
                            debug!(%collection, docs = snapshot.len(), "Collection changed");
                            last = snapshot.clone();
                            return Some((snapshot, (source, filter, last)));
                        }
                        Ok(_) => {}
                        Err(e) => warn!(%collection, "Poll failed: {}", e),
                    }
                }
            },
        );

        Ok(futures::stream::once(async move { initial })
            .chain(polls)
            .boxed())
    }

    async fn write(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> Result<(), DataSourceError> {
        let url = self.document_url(collection, id);
        self.request_with_retry(Method::PATCH, &url, &[], Some(&patch))
            .await
            .map(|_| ())
    }

    async fn create(
        &self,
        collection: Collection,
        record: Map<String, Value>,
    ) -> Result<RecordId, DataSourceError> {
        // Not retried: a repeated POST could create a duplicate.
        let url = self.collection_url(collection);
        let body = self
            .attempt(Method::POST, &url, &[], Some(&record))
            .await
            .map_err(into_inner)?;
        match body.as_ref().and_then(|b| b.get("id")) {
            Some(Value::String(id)) => Ok(RecordId::new(id.clone())),
            Some(Value::Number(n)) => Ok(RecordId::new(n.to_string())),
            _ => Err(DataSourceError::ParseError(
                "create response missing id".to_string(),
            )),
        }
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), DataSourceError> {
        let url = self.document_url(collection, id);
        self.request_with_retry(Method::DELETE, &url, &[], None)
            .await
            .map(|_| ())
    }
}
