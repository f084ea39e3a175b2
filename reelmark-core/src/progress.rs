//! Progress reconciliation.
//!
//! [`ProgressReconciler::record_observation`] decides which stored record an
//! observation updates and keeps the store free of duplicates while doing
//! so. The store has no transactions, so each step is its own round trip:
//!
//! 1. write the record together with an index that contains its key
//! 2. delete records stored under legacy keys for the same content
//! 3. re-read the index and re-add the key if a concurrent writer dropped it
//! 4. delete earlier episodes of the same series
//! 5. run a retention pass, on a spawned task unless configured inline
//!
//! A writer interleaving between steps can leave a stale index snapshot
//! behind. The next write heals it, and [`ProgressReconciler::repair_index`]
//! drops whatever is left dangling.

use std::{any::type_name_of_val, collections::HashSet, fmt, sync::Arc};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reelmark_model::{ContentKey, ContentType, Observation, ProgressRecord};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    identity::derive_key,
    retention::RetentionManager,
    store::{INDEX_KEY, KeyIndex, RecordStore, StoreEntries, is_reserved_key},
    url_match::roughly_match,
};

/// Titles such as `S01E02`, `E7` or `Episode 12`.
static EPISODE_TITLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:s\d+\s*e\d+|\be\d+|\bepisode\s*\d+)")
        .expect("episode title regex should compile")
});

/// What a single observation changed in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationOutcome {
    pub key: ContentKey,
    pub record: ProgressRecord,
    /// Keys from earlier identity schemes that were migrated away
    pub removed_legacy: Vec<ContentKey>,
    /// Earlier episodes of the same series that were superseded
    pub removed_duplicates: Vec<ContentKey>,
}

/// A record together with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProgress {
    pub key: ContentKey,
    pub record: ProgressRecord,
}

/// Whether a stored record carries any sign of being a series episode.
pub fn looks_episodic(record: &ProgressRecord) -> bool {
    record.content_type.is_episode()
        || record.episode_number.is_some()
        || record.season_number.is_some()
        || record
            .episode_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
        || EPISODE_TITLE_PATTERN.is_match(&record.title)
        || record
            .original_title
            .as_deref()
            .is_some_and(|title| EPISODE_TITLE_PATTERN.is_match(title))
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn platforms_compatible(a: &str, b: &str) -> bool {
    a.trim().is_empty() || b.trim().is_empty() || same_text(a, b)
}

/// Keys the same observation would have been stored under before series
/// identities existed.
pub fn legacy_keys(record: &ProgressRecord) -> Vec<ContentKey> {
    let url = Some(record.url.as_str());
    let platform = Some(record.platform.as_str());
    let original = record
        .original_title
        .as_deref()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or(&record.title);

    let mut keys = vec![
        derive_key(url, Some(original), platform, Some(ContentType::Episode), None),
        derive_key(url, Some(original), platform, Some(ContentType::Movie), None),
        derive_key(url, url, platform, Some(ContentType::Movie), None),
    ];
    let mut seen = HashSet::new();
    keys.retain(|key| seen.insert(key.clone()));
    keys
}

/// Reads a stored value as a progress record, if it is one.
pub fn as_progress_record(value: &Value) -> Option<ProgressRecord> {
    ProgressRecord::deserialize(value).ok()
}

fn parse_records(
    entries: StoreEntries,
) -> impl Iterator<Item = (String, ProgressRecord)> {
    entries.into_iter().filter_map(|(key, value)| {
        as_progress_record(&value).map(|record| (key, record))
    })
}

pub struct ProgressReconciler<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    retention: RetentionManager<S>,
    background_retention: bool,
}

impl<S> fmt::Debug for ProgressReconciler<S>
where
    S: RecordStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReconciler")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("retention", &self.retention)
            .field("background_retention", &self.background_retention)
            .finish()
    }
}

impl<S> ProgressReconciler<S>
where
    S: RecordStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            retention: RetentionManager::new(Arc::clone(&store)),
            store,
            background_retention: true,
        }
    }

    pub fn with_retention(mut self, retention: RetentionManager<S>) -> Self {
        self.retention = retention;
        self
    }

    /// Run the post-write retention pass before `record_observation`
    /// returns instead of on a spawned task. Short-lived processes want this
    /// so the pass is not cut off when the runtime shuts down.
    pub fn with_inline_retention(mut self) -> Self {
        self.background_retention = false;
        self
    }

    pub async fn record_observation(
        &self,
        observation: &Observation,
    ) -> Result<ObservationOutcome> {
        let record = ProgressRecord::from_observation(observation, Utc::now());
        let series_title = observation.series_title_trimmed();
        let key = derive_key(
            Some(record.url.as_str()),
            Some(record.title.as_str()),
            Some(record.platform.as_str()),
            Some(record.content_type),
            series_title,
        );

        self.write_record(&key, &record).await?;

        let mut removed_legacy = Vec::new();
        if record.content_type.is_episode() {
            match self.migrate_legacy_keys(&key, &record).await {
                Ok(removed) => removed_legacy = removed,
                Err(err) => warn!("Legacy key cleanup for {} failed: {}", key, err),
            }
        }

        self.ensure_indexed(&key).await?;

        let removed_duplicates = match series_title {
            Some(series) if record.content_type.is_episode() => {
                self.remove_series_duplicates(&key, &record, series).await?
            }
            _ => Vec::new(),
        };

        self.schedule_retention().await;

        debug!(
            "Recorded {} at {:.1}% ({} legacy, {} duplicates removed)",
            key,
            record.percent_complete,
            removed_legacy.len(),
            removed_duplicates.len()
        );

        Ok(ObservationOutcome {
            key,
            record,
            removed_legacy,
            removed_duplicates,
        })
    }

    /// Full replace of the record, published together with its index entry.
    async fn write_record(
        &self,
        key: &ContentKey,
        record: &ProgressRecord,
    ) -> Result<()> {
        let mut index = KeyIndex::load(self.store.as_ref()).await?;
        index.insert(key.clone());

        let mut batch = StoreEntries::new();
        batch.insert(key.to_string(), serde_json::to_value(record)?);
        batch.insert(INDEX_KEY.to_string(), index.to_value());
        self.store.set(batch).await
    }

    async fn migrate_legacy_keys(
        &self,
        key: &ContentKey,
        record: &ProgressRecord,
    ) -> Result<Vec<ContentKey>> {
        let candidates: Vec<ContentKey> = legacy_keys(record)
            .into_iter()
            .filter(|candidate| candidate != key)
            .collect();
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let raw: Vec<String> =
            candidates.iter().map(ContentKey::to_string).collect();
        let existing = self.store.get(Some(&raw)).await?;
        let stale: Vec<ContentKey> = candidates
            .into_iter()
            .filter(|candidate| existing.contains_key(candidate.as_str()))
            .collect();
        if stale.is_empty() {
            return Ok(stale);
        }

        self.remove_records(&stale).await?;
        info!("Migrated {} legacy keys into {}", stale.len(), key);
        Ok(stale)
    }

    /// Re-adds `key` if the index lost it, dropping repeats on the way.
    async fn ensure_indexed(&self, key: &ContentKey) -> Result<()> {
        let mut index = KeyIndex::load(self.store.as_ref()).await?;
        let deduped = index.dedup();
        let inserted = index.insert(key.clone());
        if inserted || deduped > 0 {
            if inserted {
                debug!("Index lost {}; re-adding", key);
            }
            index.persist(self.store.as_ref()).await?;
        }
        Ok(())
    }

    async fn remove_series_duplicates(
        &self,
        key: &ContentKey,
        record: &ProgressRecord,
        series_title: &str,
    ) -> Result<Vec<ContentKey>> {
        let index = KeyIndex::load(self.store.as_ref()).await?;
        let others: Vec<String> = index
            .keys()
            .iter()
            .filter(|existing| *existing != key)
            .map(ContentKey::to_string)
            .collect();
        if others.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.store.get(Some(&others)).await?;
        let duplicates: Vec<ContentKey> = parse_records(entries)
            .filter(|(_, existing)| {
                same_text(existing.series_or_title(), series_title)
                    && platforms_compatible(&existing.platform, &record.platform)
                    && looks_episodic(existing)
            })
            .filter_map(|(raw, _)| ContentKey::parse(raw).ok())
            .collect();

        if !duplicates.is_empty() {
            self.remove_records(&duplicates).await?;
            info!(
                "Removed {} superseded entries of series {:?}",
                duplicates.len(),
                series_title
            );
        }
        Ok(duplicates)
    }

    /// Deletes records and drops their keys from the index.
    async fn remove_records(&self, keys: &[ContentKey]) -> Result<()> {
        let raw: Vec<String> = keys.iter().map(ContentKey::to_string).collect();
        self.store.remove(&raw).await?;

        let mut index = KeyIndex::load(self.store.as_ref()).await?;
        if index.retain(|existing| !keys.contains(existing)) > 0 {
            index.persist(self.store.as_ref()).await?;
        }
        Ok(())
    }

    /// Runs a retention pass, spawned when a runtime is available and
    /// background retention is enabled. Failures are logged.
    async fn schedule_retention(&self) {
        let retention = self.retention.clone();
        let handle = tokio::runtime::Handle::try_current()
            .ok()
            .filter(|_| self.background_retention);
        match handle {
            Some(handle) => {
                handle.spawn(async move {
                    if let Err(err) = retention.prune_progress().await {
                        warn!("Background retention pass failed: {}", err);
                    }
                });
            }
            None => {
                if let Err(err) = retention.prune_progress().await {
                    warn!("Retention pass failed: {}", err);
                }
            }
        }
    }

    /// Finds the record last watched at `url`.
    ///
    /// Indexed records are tried in order for a rough URL match, which also
    /// covers a stored URL containing the query. When the index turns up
    /// nothing, every entry in the store is scanned.
    pub async fn lookup(&self, url: &str) -> Result<Option<ProgressRecord>> {
        let query = url.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let index = KeyIndex::load(self.store.as_ref()).await?;
        if !index.is_empty() {
            let mut entries = self.store.get(Some(&index.raw_keys())).await?;
            for key in index.keys() {
                let Some(value) = entries.remove(key.as_str()) else {
                    continue;
                };
                let Some(record) = as_progress_record(&value) else {
                    continue;
                };
                if roughly_match(&record.url, query) {
                    return Ok(Some(record));
                }
            }
        }

        debug!("No indexed match for {}; scanning the whole store", query);
        let all = self.store.get(None).await?;
        Ok(all
            .into_iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .filter_map(|(_, value)| as_progress_record(&value))
            .find(|record| roughly_match(&record.url, query)))
    }

    /// Indexed records, most recently watched first.
    pub async fn list_progress(&self) -> Result<Vec<StoredProgress>> {
        let index = KeyIndex::load(self.store.as_ref()).await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = self.store.get(Some(&index.raw_keys())).await?;
        let mut seen = HashSet::new();
        let mut listed: Vec<StoredProgress> = index
            .keys()
            .iter()
            .filter(|key| seen.insert((*key).clone()))
            .filter_map(|key| {
                let record = as_progress_record(&entries.remove(key.as_str())?)?;
                Some(StoredProgress {
                    key: key.clone(),
                    record,
                })
            })
            .collect();

        listed.sort_by(|a, b| b.record.last_watched.cmp(&a.record.last_watched));
        Ok(listed)
    }

    /// Deletes one record. Returns whether it existed.
    pub async fn delete_progress(&self, key: &ContentKey) -> Result<bool> {
        let existed = self.store.get_one(key.as_str()).await?.is_some();
        self.remove_records(std::slice::from_ref(key)).await?;
        Ok(existed)
    }

    /// Drops index keys that are repeated or have no readable record behind
    /// them. Returns how many keys were dropped.
    pub async fn repair_index(&self) -> Result<usize> {
        let mut index = KeyIndex::load(self.store.as_ref()).await?;
        let entries = self.store.get(Some(&index.raw_keys())).await?;

        let mut dropped = index.dedup();
        dropped += index.retain(|key| {
            entries
                .get(key.as_str())
                .and_then(as_progress_record)
                .is_some()
        });

        if dropped > 0 {
            index.persist(self.store.as_ref()).await?;
            info!("Repaired key index, dropped {} keys", dropped);
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> ProgressRecord {
        ProgressRecord {
            url: "https://x/watch/1".into(),
            title: title.into(),
            current_time: 0.0,
            duration: 0.0,
            percent_complete: 0.0,
            platform: "X".into(),
            content_type: ContentType::Movie,
            last_watched: None,
            series_title: None,
            episode_name: None,
            original_title: None,
            episode_number: None,
            season_number: None,
        }
    }

    #[test]
    fn episodic_title_patterns() {
        for title in ["Show S01E02", "Show s1 e2", "E7 - The Return", "Episode 12", "episode12"] {
            assert!(looks_episodic(&record(title)), "{title} should look episodic");
        }
        for title in ["Heat", "The Departed", "Blade Runner 2049", "Episodes"] {
            assert!(!looks_episodic(&record(title)), "{title} should not look episodic");
        }
    }

    #[test]
    fn episodic_markers_besides_title() {
        let mut by_type = record("Heat");
        by_type.content_type = ContentType::Episode;
        assert!(looks_episodic(&by_type));

        let mut by_number = record("Heat");
        by_number.season_number = Some(1);
        assert!(looks_episodic(&by_number));

        let mut by_name = record("Heat");
        by_name.episode_name = Some("Pilot".into());
        assert!(looks_episodic(&by_name));

        let mut blank_name = record("Heat");
        blank_name.episode_name = Some("  ".into());
        assert!(!looks_episodic(&blank_name));

        let mut by_original = record("Heat");
        by_original.original_title = Some("Heat Episode 3".into());
        assert!(looks_episodic(&by_original));
    }

    #[test]
    fn legacy_keys_cover_title_and_url_bases() {
        let mut episode = record("Pilot");
        episode.original_title = Some("Show: Pilot".into());

        let keys = legacy_keys(&episode);
        // Episode and movie bases coincide without a series title.
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[0],
            derive_key(None, Some("Show: Pilot"), Some("x"), None, None)
        );
        assert_eq!(
            keys[1],
            derive_key(
                None,
                Some("https://x/watch/1"),
                Some("X"),
                Some(ContentType::Movie),
                None
            )
        );
    }

    #[test]
    fn platform_and_series_comparison_ignore_case() {
        assert!(same_text(" Show ", "show"));
        assert!(platforms_compatible("Netflix", "NETFLIX"));
        assert!(platforms_compatible("", "Hulu"));
        assert!(!platforms_compatible("Netflix", "Hulu"));
    }
}
