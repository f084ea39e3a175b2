//! Retention policy for progress records and detector telemetry.

use std::{any::type_name_of_val, collections::HashSet, fmt, sync::Arc};

use chrono::{DateTime, Duration, Months, Utc};
use reelmark_model::{ContentKey, ProgressRecord, TelemetryEntry};
use tracing::{debug, info};

use crate::{
    error::Result,
    store::{KeyIndex, RecordStore, is_reserved_key},
};

pub const DEFAULT_PROGRESS_MAX_AGE_MONTHS: u32 = 6;
pub const DEFAULT_COMPLETION_THRESHOLD: f64 = 95.0;
pub const MAX_TELEMETRY_ENTRIES: usize = 200;

/// Thresholds applied by [`RetentionManager`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    /// Completed records untouched for longer than this are dropped.
    pub progress_max_age_months: u32,
    /// Percentage at which a record counts as completed.
    pub completion_threshold: f64,
    /// Upper bound on stored telemetry entries.
    pub telemetry_cap: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            progress_max_age_months: DEFAULT_PROGRESS_MAX_AGE_MONTHS,
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            telemetry_cap: MAX_TELEMETRY_ENTRIES,
        }
    }
}

impl RetentionPolicy {
    /// Oldest `lastWatched` a completed record may have at `now`.
    pub fn progress_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.progress_max_age_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self, record: &ProgressRecord, now: DateTime<Utc>) -> bool {
        match record.last_watched {
            Some(watched) => {
                watched < self.progress_cutoff(now)
                    && record.is_completed(self.completion_threshold)
            }
            None => false,
        }
    }

    /// Drops entries older than `retention_hours` (at least one hour), then
    /// keeps only the newest `telemetry_cap` by position.
    pub fn prune_telemetry(
        &self,
        mut entries: Vec<TelemetryEntry>,
        retention_hours: u64,
        now: DateTime<Utc>,
    ) -> Vec<TelemetryEntry> {
        let hours = i64::try_from(retention_hours.max(1)).unwrap_or(i64::MAX);
        let window = Duration::try_hours(hours).unwrap_or(Duration::MAX);
        let cutoff = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        entries.retain(|entry| entry.timestamp >= cutoff);
        self.cap_telemetry(entries)
    }

    /// Keeps only the newest `telemetry_cap` entries by position.
    pub fn cap_telemetry(
        &self,
        mut entries: Vec<TelemetryEntry>,
    ) -> Vec<TelemetryEntry> {
        if entries.len() > self.telemetry_cap {
            let overflow = entries.len() - self.telemetry_cap;
            entries.drain(..overflow);
        }
        entries
    }
}

/// Prunes telemetry with the default cap as of now.
pub fn prune_telemetry(
    entries: Vec<TelemetryEntry>,
    retention_hours: u64,
) -> Vec<TelemetryEntry> {
    RetentionPolicy::default().prune_telemetry(
        entries,
        retention_hours,
        Utc::now(),
    )
}

/// Removes stale, completed progress records from the store.
pub struct RetentionManager<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    policy: RetentionPolicy,
}

impl<S> Clone for RetentionManager<S>
where
    S: RecordStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S> fmt::Debug for RetentionManager<S>
where
    S: RecordStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionManager")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> RetentionManager<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: RetentionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub async fn prune_progress(&self) -> Result<Vec<ContentKey>> {
        self.prune_progress_as_of(Utc::now()).await
    }

    /// Deletes every progress record that is both completed and older than
    /// the policy allows, then rewrites the key index without them. Records
    /// whose `lastWatched` can't be parsed are left alone.
    pub async fn prune_progress_as_of(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentKey>> {
        let entries = self.store.get(None).await?;

        let expired: Vec<ContentKey> = entries
            .into_iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .filter_map(|(key, value)| {
                let record: ProgressRecord = serde_json::from_value(value).ok()?;
                if !self.policy.is_expired(&record, now) {
                    return None;
                }
                debug!("Progress record {} expired", key);
                ContentKey::parse(key).ok()
            })
            .collect();

        if expired.is_empty() {
            return Ok(expired);
        }

        let raw: Vec<String> = expired.iter().map(ContentKey::to_string).collect();
        self.store.remove(&raw).await?;

        let removed: HashSet<&ContentKey> = expired.iter().collect();
        let mut index = KeyIndex::load(self.store.as_ref()).await?;
        if index.retain(|key| !removed.contains(key)) > 0 {
            index.persist(self.store.as_ref()).await?;
        }

        info!("Pruned {} stale completed progress records", expired.len());
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{INDEX_KEY, MemoryStore, StoreEntries, TELEMETRY_KEY};
    use reelmark_model::DetectorStatus;
    use serde_json::{Map, json};

    fn stored_record(
        url: &str,
        percent: f64,
        last_watched: serde_json::Value,
    ) -> serde_json::Value {
        json!({
            "url": url,
            "title": url,
            "currentTime": percent,
            "duration": 100,
            "percentComplete": percent,
            "platform": "Netflix",
            "contentType": "movie",
            "lastWatched": last_watched,
        })
    }

    fn entry(platform: &str, timestamp: DateTime<Utc>) -> TelemetryEntry {
        TelemetryEntry {
            platform: Some(platform.to_string()),
            detector: Some("video".into()),
            status: DetectorStatus::Detected,
            url: None,
            details: Map::new(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn prunes_only_old_completed_records() {
        let now = Utc::now();
        let eight_months_ago = now - Months::new(8);
        let mut seed = StoreEntries::new();
        seed.insert(
            "content_1".into(),
            stored_record("https://x/1", 100.0, json!(eight_months_ago.to_rfc3339())),
        );
        seed.insert(
            "content_2".into(),
            stored_record("https://x/2", 40.0, json!(eight_months_ago.to_rfc3339())),
        );
        seed.insert(
            "content_3".into(),
            stored_record("https://x/3", 100.0, json!(now.to_rfc3339())),
        );
        seed.insert(
            "content_4".into(),
            stored_record("https://x/4", 100.0, json!("last spring")),
        );
        seed.insert(
            INDEX_KEY.into(),
            json!(["content_1", "content_2", "content_3", "content_4"]),
        );
        seed.insert(TELEMETRY_KEY.into(), json!([]));

        let store = Arc::new(MemoryStore::with_entries(seed));
        let manager = RetentionManager::new(store.clone());

        let removed = manager.prune_progress_as_of(now).await.unwrap();
        assert_eq!(removed, vec![ContentKey::parse("content_1").unwrap()]);

        let snapshot = store.snapshot().await;
        assert!(!snapshot.contains_key("content_1"));
        assert!(snapshot.contains_key("content_2"));
        assert!(snapshot.contains_key("content_3"));
        assert!(snapshot.contains_key("content_4"));
        assert!(snapshot.contains_key(TELEMETRY_KEY));
        assert_eq!(
            snapshot[INDEX_KEY],
            json!(["content_2", "content_3", "content_4"])
        );
    }

    #[tokio::test]
    async fn epoch_millis_last_watched_is_understood() {
        let now = Utc::now();
        let old = (now - Months::new(7)).timestamp_millis();
        let mut seed = StoreEntries::new();
        seed.insert("content_9".into(), stored_record("https://x/9", 97.0, json!(old)));
        seed.insert(INDEX_KEY.into(), json!(["content_9"]));
        let store = Arc::new(MemoryStore::with_entries(seed));

        let removed = RetentionManager::new(store.clone())
            .prune_progress_as_of(now)
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.snapshot().await[INDEX_KEY], json!([]));
    }

    #[tokio::test]
    async fn nothing_to_prune_leaves_index_untouched() {
        let store = Arc::new(MemoryStore::new());
        store.set_one(INDEX_KEY, json!(["content_5"])).await.unwrap();

        let removed = RetentionManager::new(store.clone())
            .prune_progress()
            .await
            .unwrap();
        assert!(removed.is_empty());
        assert_eq!(store.snapshot().await[INDEX_KEY], json!(["content_5"]));
    }

    #[test]
    fn telemetry_window_is_at_least_one_hour() {
        let now = Utc::now();
        let entries = vec![
            entry("a", now - Duration::minutes(90)),
            entry("b", now - Duration::minutes(30)),
        ];

        let kept = RetentionPolicy::default().prune_telemetry(entries, 0, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].platform.as_deref(), Some("b"));
    }

    #[test]
    fn telemetry_cap_drops_oldest_positions_first() {
        let now = Utc::now();
        let entries: Vec<_> = (0..205)
            .map(|i| entry(&format!("p{i}"), now))
            .collect();

        let kept = RetentionPolicy::default().prune_telemetry(entries, 24, now);
        assert_eq!(kept.len(), MAX_TELEMETRY_ENTRIES);
        assert_eq!(kept[0].platform.as_deref(), Some("p5"));
        assert_eq!(kept[199].platform.as_deref(), Some("p204"));
    }

    #[test]
    fn free_prune_uses_current_time() {
        let now = Utc::now();
        let entries = vec![
            entry("stale", now - Duration::hours(5)),
            entry("fresh", now - Duration::minutes(5)),
        ];

        let kept = prune_telemetry(entries, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].platform.as_deref(), Some("fresh"));
    }
}
