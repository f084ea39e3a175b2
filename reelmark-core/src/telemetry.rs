//! Bounded log of detector health events.
//!
//! Each `(platform, detector)` pair owns one slot holding its latest report.
//! The log is stored as a single JSON array, oldest first, and is pruned by
//! age and capped in length on every write.

use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use reelmark_model::{DetectorStatus, TelemetryEntry, TelemetryReport};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::Result,
    retention::RetentionPolicy,
    settings::SettingsAccessor,
    store::{RecordStore, TELEMETRY_KEY},
};

/// Trims `value` and treats blank strings as absent.
fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Validates a raw report into a storable entry.
pub fn clean_report(report: TelemetryReport, now: DateTime<Utc>) -> TelemetryEntry {
    let details = match report.details {
        Some(Value::Object(details)) => details,
        _ => Map::new(),
    };

    TelemetryEntry {
        platform: clean_text(report.platform),
        detector: clean_text(report.detector),
        status: report.status.unwrap_or(DetectorStatus::Detecting),
        url: clean_text(report.url),
        details,
        timestamp: report.timestamp.unwrap_or(now),
    }
}

pub struct TelemetryLog<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    settings: Arc<SettingsAccessor<S>>,
    policy: RetentionPolicy,
}

impl<S> fmt::Debug for TelemetryLog<S>
where
    S: RecordStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryLog")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> TelemetryLog<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>, settings: Arc<SettingsAccessor<S>>) -> Self {
        Self {
            store,
            settings,
            policy: RetentionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stores `report`, replacing any earlier entry for the same detector.
    /// Existing entries are pruned by age first; the new entry is only
    /// subject to the length cap, even when its timestamp is old.
    pub async fn record(&self, report: TelemetryReport) -> Result<TelemetryEntry> {
        let now = Utc::now();
        let entry = clean_report(report, now);
        let retention_hours = self.settings.load().await?.telemetry_retention_hours;

        let mut entries = self
            .policy
            .prune_telemetry(self.load().await?, retention_hours, now);
        entries.retain(|existing| !existing.same_pair(&entry));
        entries.push(entry.clone());
        let entries = self.policy.cap_telemetry(entries);

        self.persist(&entries).await?;
        debug!(
            "Recorded {} telemetry for {:?}/{:?} ({} entries)",
            entry.status,
            entry.platform,
            entry.detector,
            entries.len()
        );
        Ok(entry)
    }

    /// Live entries, most recent first.
    pub async fn list(&self) -> Result<Vec<TelemetryEntry>> {
        let now = Utc::now();
        let retention_hours = self.settings.load().await?.telemetry_retention_hours;

        let stored = self.load().await?;
        let before = stored.len();
        let mut entries = self.policy.prune_telemetry(stored, retention_hours, now);
        if entries.len() != before {
            self.persist(&entries).await?;
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(&[TELEMETRY_KEY.to_string()]).await
    }

    async fn load(&self) -> Result<Vec<TelemetryEntry>> {
        let entries = match self.store.get_one(TELEMETRY_KEY).await? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!("Dropping unreadable telemetry entry: {err}");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(entries)
    }

    async fn persist(&self, entries: &[TelemetryEntry]) -> Result<()> {
        self.store
            .set_one(TELEMETRY_KEY, serde_json::to_value(entries)?)
            .await
    }
}
