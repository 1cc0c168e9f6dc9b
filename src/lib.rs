pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod report;

pub use config::Config;
pub use datasource::{
    Collection, DataSourceError, HttpCollectionSource, InMemoryCollectionSource,
    LiveCollectionSource,
};
pub use db::{init_db, InMemoryWatermarkStore, SqliteWatermarkStore, WatermarkStore};
pub use domain::{
    Booking, BookingStatus, Channel, Decimal, ListingStatus, Notification, OwnerRef,
    ProviderProfile, RawDocument, RecordId, ServiceListing, TimeMs,
};
pub use engine::{ProviderIdentity, Recipient};
pub use error::AppError;
pub use orchestration::{spawn_sync, Actor, MarketSettings, Marketplace};
