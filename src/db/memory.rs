//! Process-local watermark store.

use super::{WatermarkError, WatermarkStore};
use crate::domain::TimeMs;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Watermarks kept in memory; lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWatermarkStore {
    entries: Arc<Mutex<HashMap<String, TimeMs>>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<TimeMs>, WatermarkError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| WatermarkError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).copied())
    }

    async fn set(&self, key: &str, at: TimeMs) -> Result<(), WatermarkError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| WatermarkError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{load_watermarks, save_watermarks};
    use crate::engine::Watermarks;

    #[test]
    fn test_get_set() {
        let store = InMemoryWatermarkStore::new();
        tokio_test::block_on(async {
            assert_eq!(store.get("k").await.unwrap(), None);
            store.set("k", TimeMs::new(5)).await.unwrap();
            assert_eq!(store.get("k").await.unwrap(), Some(TimeMs::new(5)));
        });
    }

    #[test]
    fn test_save_and_load_watermarks() {
        let store = InMemoryWatermarkStore::new();
        tokio_test::block_on(async {
            let marks = Watermarks {
                last_seen: Some(TimeMs::new(10)),
                hidden_before: None,
            };
            save_watermarks(&store, "role:administrator", &marks)
                .await
                .unwrap();
            assert_eq!(store.len(), 1);
            let loaded = load_watermarks(&store, "role:administrator").await.unwrap();
            assert_eq!(loaded, marks);
        });
    }
}
