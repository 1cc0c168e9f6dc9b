//! Durable key-value storage for per-recipient notification watermarks.
//!
//! This module provides:
//! - The `WatermarkStore` collaborator contract
//! - A SQLite-backed store with migrations and pragma configuration
//! - An in-memory store for tests and ephemeral sessions

pub mod memory;
pub mod migrations;
pub mod watermarks;

pub use memory::InMemoryWatermarkStore;
pub use migrations::init_db;
pub use watermarks::SqliteWatermarkStore;

use crate::domain::TimeMs;
use crate::engine::notifications::{watermark_keys, Watermarks};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("watermark store unavailable: {0}")]
    Unavailable(String),
}

/// Durable `key -> instant` storage.
#[async_trait]
pub trait WatermarkStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<TimeMs>, WatermarkError>;

    async fn set(&self, key: &str, at: TimeMs) -> Result<(), WatermarkError>;
}

/// Load both watermarks for a recipient.
pub async fn load_watermarks(
    store: &dyn WatermarkStore,
    recipient_key: &str,
) -> Result<Watermarks, WatermarkError> {
    let (seen_key, hidden_key) = watermark_keys(recipient_key);
    Ok(Watermarks {
        last_seen: store.get(&seen_key).await?,
        hidden_before: store.get(&hidden_key).await?,
    })
}

/// Persist whichever watermarks are set.
pub async fn save_watermarks(
    store: &dyn WatermarkStore,
    recipient_key: &str,
    watermarks: &Watermarks,
) -> Result<(), WatermarkError> {
    let (seen_key, hidden_key) = watermark_keys(recipient_key);
    if let Some(at) = watermarks.last_seen {
        store.set(&seen_key, at).await?;
    }
    if let Some(at) = watermarks.hidden_before {
        store.set(&hidden_key, at).await?;
    }
    Ok(())
}
