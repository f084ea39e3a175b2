//! Contract over the external key-value store.
//!
//! The store is an opaque asynchronous map from string keys to JSON values,
//! shaped like a browser extension's local storage area: bulk `get`, `set`
//! and `remove`, no transactions and no compare-and-swap. Progress records,
//! the key index, the telemetry log and user settings all share one
//! namespace, separated only by the reserved keys below.

mod index;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use index::KeyIndex;
pub use memory::MemoryStore;

/// Key holding the ordered list of live content keys.
pub const INDEX_KEY: &str = "progress_index";
/// Key holding the detector telemetry array.
pub const TELEMETRY_KEY: &str = "detector_telemetry";
/// Key holding the user settings object.
pub const SETTINGS_KEY: &str = "settings";

/// Entries returned from or written to a [`RecordStore`].
pub type StoreEntries = BTreeMap<String, Value>;

/// Whether `key` belongs to bookkeeping rather than to a progress record.
pub fn is_reserved_key(key: &str) -> bool {
    matches!(key, INDEX_KEY | TELEMETRY_KEY | SETTINGS_KEY)
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the given keys, or every entry when `keys` is `None`. Missing
    /// keys are simply absent from the result.
    async fn get(&self, keys: Option<&[String]>) -> Result<StoreEntries>;

    /// Write every entry in `items`, replacing existing values.
    async fn set(&self, items: StoreEntries) -> Result<()>;

    /// Delete the given keys. Unknown keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    async fn get_one(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.get(Some(&[key.to_string()])).await?;
        Ok(entries.remove(key))
    }

    async fn set_one(&self, key: &str, value: Value) -> Result<()> {
        let mut items = StoreEntries::new();
        items.insert(key.to_string(), value);
        self.set(items).await
    }
}
