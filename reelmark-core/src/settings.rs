//! Read-through access to user settings kept in the store.
//!
//! Settings are loaded once and cached on the accessor; callers that know the
//! stored object changed call [`SettingsAccessor::refresh`].

use std::{any::type_name_of_val, fmt, sync::Arc};

use reelmark_model::lenient;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::Result,
    store::{RecordStore, SETTINGS_KEY},
};

pub const DEFAULT_TELEMETRY_RETENTION_HOURS: u64 = 72;
const TELEMETRY_RETENTION_FIELD: &str = "detectorTelemetryRetentionHours";

/// Settings consumed by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// How long detector telemetry is kept, never below one hour.
    pub telemetry_retention_hours: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            telemetry_retention_hours: DEFAULT_TELEMETRY_RETENTION_HOURS,
        }
    }
}

impl TrackerSettings {
    /// Reads the tracker's fields out of the stored settings object, keeping
    /// `defaults` for anything missing or malformed.
    pub fn from_stored(value: Option<&Value>, defaults: TrackerSettings) -> Self {
        let telemetry_retention_hours = value
            .and_then(|settings| settings.get(TELEMETRY_RETENTION_FIELD))
            .and_then(lenient::number)
            .filter(|hours| hours.is_finite())
            .map(|hours| hours.floor().max(1.0) as u64)
            .unwrap_or(defaults.telemetry_retention_hours.max(1));

        Self {
            telemetry_retention_hours,
        }
    }
}

pub struct SettingsAccessor<S>
where
    S: RecordStore + ?Sized,
{
    store: Arc<S>,
    defaults: TrackerSettings,
    cached: RwLock<Option<TrackerSettings>>,
}

impl<S> fmt::Debug for SettingsAccessor<S>
where
    S: RecordStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsAccessor")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl<S> SettingsAccessor<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>, defaults: TrackerSettings) -> Self {
        Self {
            store,
            defaults,
            cached: RwLock::new(None),
        }
    }

    /// Cached settings, reading the store on first use.
    pub async fn load(&self) -> Result<TrackerSettings> {
        if let Some(settings) = *self.cached.read().await {
            return Ok(settings);
        }
        self.refresh().await
    }

    /// Re-reads the stored settings object and replaces the cache.
    pub async fn refresh(&self) -> Result<TrackerSettings> {
        let stored = self.store.get_one(SETTINGS_KEY).await?;
        let settings = TrackerSettings::from_stored(stored.as_ref(), self.defaults);
        debug!("Loaded tracker settings: {:?}", settings);
        *self.cached.write().await = Some(settings);
        Ok(settings)
    }

    /// Persists a new telemetry retention window, leaving other settings in
    /// the stored object untouched.
    pub async fn set_telemetry_retention_hours(
        &self,
        hours: u64,
    ) -> Result<TrackerSettings> {
        let mut object = match self.store.get_one(SETTINGS_KEY).await? {
            Some(Value::Object(object)) => object,
            _ => Map::new(),
        };
        let hours = hours.max(1);
        object.insert(TELEMETRY_RETENTION_FIELD.to_string(), Value::from(hours));
        self.store.set_one(SETTINGS_KEY, Value::Object(object)).await?;

        let settings = TrackerSettings {
            telemetry_retention_hours: hours,
        };
        *self.cached.write().await = Some(settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn stored_hours_are_floored_to_one() {
        let defaults = TrackerSettings::default();
        let read = |value: Value| {
            TrackerSettings::from_stored(Some(&value), defaults)
                .telemetry_retention_hours
        };

        assert_eq!(read(json!({ "detectorTelemetryRetentionHours": 0 })), 1);
        assert_eq!(read(json!({ "detectorTelemetryRetentionHours": "12.7" })), 12);
        assert_eq!(
            read(json!({ "detectorTelemetryRetentionHours": "soon" })),
            DEFAULT_TELEMETRY_RETENTION_HOURS
        );
        assert_eq!(
            TrackerSettings::from_stored(None, defaults).telemetry_retention_hours,
            DEFAULT_TELEMETRY_RETENTION_HOURS
        );
    }

    #[tokio::test]
    async fn load_is_cached_until_refresh() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_one(SETTINGS_KEY, json!({ "detectorTelemetryRetentionHours": 6 }))
            .await
            .unwrap();
        let accessor = SettingsAccessor::new(store.clone(), TrackerSettings::default());

        assert_eq!(accessor.load().await.unwrap().telemetry_retention_hours, 6);

        store
            .set_one(SETTINGS_KEY, json!({ "detectorTelemetryRetentionHours": 48 }))
            .await
            .unwrap();
        assert_eq!(accessor.load().await.unwrap().telemetry_retention_hours, 6);
        assert_eq!(accessor.refresh().await.unwrap().telemetry_retention_hours, 48);
    }

    #[tokio::test]
    async fn setting_retention_keeps_other_fields() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_one(SETTINGS_KEY, json!({ "theme": "dark" }))
            .await
            .unwrap();
        let accessor = SettingsAccessor::new(store.clone(), TrackerSettings::default());

        accessor.set_telemetry_retention_hours(0).await.unwrap();

        let stored = store.get_one(SETTINGS_KEY).await.unwrap().unwrap();
        assert_eq!(stored["theme"], json!("dark"));
        assert_eq!(stored["detectorTelemetryRetentionHours"], json!(1));
    }
}
