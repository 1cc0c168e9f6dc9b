//! Live-collection data source abstraction.
//!
//! The engine never talks to a database directly; it consumes snapshot
//! streams and issues writes through [`LiveCollectionSource`].

use crate::domain::{RawDocument, RecordId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpCollectionSource;
pub use mock::InMemoryCollectionSource;

/// The collections this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Bookings,
    Services,
    Notifications,
    Providers,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Bookings,
        Collection::Services,
        Collection::Notifications,
        Collection::Providers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Bookings => "bookings",
            Collection::Services => "services",
            Collection::Notifications => "notifications",
            Collection::Providers => "serviceProviders",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Equality predicate pushed down to the source on subscribe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn matches(&self, doc: &RawDocument) -> bool {
        doc.data.get(&self.field) == Some(&self.equals)
    }
}

/// One full record set as of some moment.
pub type Snapshot = Vec<RawDocument>;

/// Snapshots in delivery order. Dropping the stream unsubscribes.
pub type SnapshotStream = BoxStream<'static, Snapshot>;

/// Source of live document collections.
///
/// No consistency is promised between a write and the next snapshot.
#[async_trait]
pub trait LiveCollectionSource: Send + Sync + fmt::Debug {
    /// Subscribe to a collection. The first item is the current contents.
    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<FieldFilter>,
    ) -> Result<SnapshotStream, DataSourceError>;

    /// Merge `patch` into an existing document.
    async fn write(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> Result<(), DataSourceError>;

    /// Create a document; the source assigns the id.
    async fn create(
        &self,
        collection: Collection,
        record: Map<String, Value>,
    ) -> Result<RecordId, DataSourceError>;

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// The caller may not perform this operation
    PermissionDenied(String),
    /// The target document does not exist
    NotFound(String),
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            DataSourceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
