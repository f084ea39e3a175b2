use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{RecordStore, StoreEntries};
use crate::error::Result;

/// Process-local [`RecordStore`], used by tests and embedders that bring
/// their own persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<StoreEntries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: StoreEntries) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Copy of everything currently stored.
    pub async fn snapshot(&self) -> StoreEntries {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, keys: Option<&[String]>) -> Result<StoreEntries> {
        let entries = self.entries.read().await;
        let found = match keys {
            None => entries.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|key| {
                    entries.get(key).map(|value| (key.clone(), value.clone()))
                })
                .collect(),
        };
        debug!("Store GET: {} entries", found.len());
        Ok(found)
    }

    async fn set(&self, items: StoreEntries) -> Result<()> {
        debug!("Store SET: {} entries", items.len());
        self.entries.write().await.extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        debug!("Store REMOVE: {:?}", keys);
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_none_returns_everything() {
        let store = MemoryStore::new();
        store.set_one("a", json!(1)).await.unwrap();
        store.set_one("b", json!(2)).await.unwrap();

        let all = store.get(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let some = store
            .get(Some(&["b".to_string(), "missing".to_string()]))
            .await
            .unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some["b"], json!(2));

        store.remove(&["a".to_string()]).await.unwrap();
        assert_eq!(store.get_one("a").await.unwrap(), None);
    }
}
