use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use reelmark_config::{TrackerConfig, TrackerConfigSource};
use reelmark_core::{
    progress::ProgressReconciler, retention::RetentionManager,
    settings::SettingsAccessor, telemetry::TelemetryLog,
};
use tracing::info;

use crate::file_store::JsonFileStore;

/// Every tracker component wired to one file store.
pub struct Tracker {
    pub store: Arc<JsonFileStore>,
    pub reconciler: ProgressReconciler<JsonFileStore>,
    pub retention: RetentionManager<JsonFileStore>,
    pub settings: Arc<SettingsAccessor<JsonFileStore>>,
    pub telemetry: TelemetryLog<JsonFileStore>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("store", &self.store.path())
            .field("retention", self.retention.policy())
            .finish()
    }
}

impl Tracker {
    /// Loads the tracker config (an explicit file wins over the environment)
    /// and opens the store, preferring `store_override` to the configured path.
    pub fn open(
        config_path: Option<&Path>,
        store_override: Option<PathBuf>,
    ) -> Result<Self> {
        let (config, source) = match config_path {
            Some(path) => (
                TrackerConfig::load_from_file(path).with_context(|| {
                    format!("loading tracker config from {}", path.display())
                })?,
                TrackerConfigSource::File(path.to_path_buf()),
            ),
            None => TrackerConfig::load_from_env()
                .context("loading tracker config")?,
        };
        info!("Tracker config source: {:?}", source);

        let store_path =
            store_override.unwrap_or_else(|| config.store_path.clone());
        Ok(Self::with_config(&config, JsonFileStore::new(store_path)))
    }

    pub fn with_config(config: &TrackerConfig, store: JsonFileStore) -> Self {
        let store = Arc::new(store);
        let policy = config.retention_policy();
        let retention =
            RetentionManager::new(Arc::clone(&store)).with_policy(policy);
        let settings = Arc::new(SettingsAccessor::new(
            Arc::clone(&store),
            config.settings_defaults(),
        ));
        let telemetry =
            TelemetryLog::new(Arc::clone(&store), Arc::clone(&settings))
                .with_policy(policy);
        let reconciler = ProgressReconciler::new(Arc::clone(&store))
            .with_retention(retention.clone())
            .with_inline_retention();

        Self {
            store,
            reconciler,
            retention,
            settings,
            telemetry,
        }
    }
}
