use serde_json::Value;
use tracing::debug;

use reelmark_model::ContentKey;

use super::{INDEX_KEY, RecordStore};
use crate::error::Result;

/// Snapshot of the ordered list of live content keys.
///
/// The index is the only way to enumerate progress records without scanning
/// the whole store. Each snapshot is loaded, edited and written back; there is
/// no locking, so a concurrent writer can clobber an edit and the next write
/// re-adds whatever went missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIndex {
    keys: Vec<ContentKey>,
}

impl KeyIndex {
    pub fn new(keys: Vec<ContentKey>) -> Self {
        Self { keys }
    }

    /// Reads the index, ignoring anything in it that isn't a content key.
    pub async fn load<S>(store: &S) -> Result<Self>
    where
        S: RecordStore + ?Sized,
    {
        let keys = match store.get_one(INDEX_KEY).await? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(raw) => ContentKey::parse(raw).ok(),
                    _ => None,
                })
                .collect(),
            Some(other) => {
                debug!("Ignoring malformed key index: {other}");
                Vec::new()
            }
            None => Vec::new(),
        };
        Ok(Self { keys })
    }

    pub async fn persist<S>(&self, store: &S) -> Result<()>
    where
        S: RecordStore + ?Sized,
    {
        store.set_one(INDEX_KEY, self.to_value()).await
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.keys
                .iter()
                .map(|key| Value::String(key.to_string()))
                .collect(),
        )
    }

    pub fn keys(&self) -> &[ContentKey] {
        &self.keys
    }

    pub fn raw_keys(&self) -> Vec<String> {
        self.keys.iter().map(ContentKey::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.keys.contains(key)
    }

    /// Appends `key` unless already present. Returns whether it was added.
    pub fn insert(&mut self, key: ContentKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Drops every occurrence of `key`. Returns whether anything changed.
    pub fn remove(&mut self, key: &ContentKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|existing| existing != key);
        before != self.keys.len()
    }

    /// Keeps only keys accepted by `keep`, returning how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ContentKey) -> bool,
    {
        let before = self.keys.len();
        self.keys.retain(|key| keep(key));
        before - self.keys.len()
    }

    /// Removes repeated keys, keeping first occurrences in order.
    pub fn dedup(&mut self) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.retain(|key| seen.insert(key.clone()))
    }
}
