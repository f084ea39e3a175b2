use anyhow::anyhow;
use reelmark_core::{
    retention::{
        DEFAULT_COMPLETION_THRESHOLD, DEFAULT_PROGRESS_MAX_AGE_MONTHS,
        MAX_TELEMETRY_ENTRIES, RetentionPolicy,
    },
    settings::{DEFAULT_TELEMETRY_RETENTION_HOURS, TrackerSettings},
};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::ConfigLoadError;

/// Source that produced the tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackerConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Tracker tunables. Retention settings are defaults only: a value stored in
/// the user's settings object wins over `telemetry_retention_hours`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Hours detector telemetry is kept when the user hasn't chosen a value.
    /// Anything below one hour is treated as one hour.
    pub telemetry_retention_hours: u64,
    /// Completed records not watched for this many months are pruned.
    pub progress_max_age_months: u32,
    /// Percentage at which a record counts as completed.
    pub completion_threshold: f64,
    /// Maximum number of stored telemetry entries.
    pub telemetry_cap: usize,
    /// JSON file backing the operator CLI's store.
    pub store_path: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            telemetry_retention_hours: DEFAULT_TELEMETRY_RETENTION_HOURS,
            progress_max_age_months: DEFAULT_PROGRESS_MAX_AGE_MONTHS,
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            telemetry_cap: MAX_TELEMETRY_ENTRIES,
            store_path: PathBuf::from("reelmark-store.json"),
        }
    }
}

impl TrackerConfig {
    /// Load tracker configuration using environment variables.
    /// Evaluation order:
    /// 1) `$REELMARK_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$REELMARK_CONFIG_JSON` (inline JSON),
    /// 3) the first default file found in the working directory,
    /// 4) defaults.
    pub fn load_from_env()
    -> Result<(Self, TrackerConfigSource), ConfigLoadError> {
        if let Ok(path_str) = env::var("REELMARK_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, TrackerConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("REELMARK_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw, "REELMARK_CONFIG_JSON")?;
            parsed.validate()?;
            return Ok((parsed, TrackerConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, TrackerConfigSource::File(path)));
        }

        Ok((Self::default(), TrackerConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        debug!("Loading tracker config from {}", path.display());
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let origin = path.display().to_string();
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents, &origin)?,
            Some("toml") | Some("tml") => toml::from_str(&contents)
                .map_err(|err| ConfigLoadError::Parse {
                    origin,
                    source: err.into(),
                })?,
            _ => Self::parse_from_str(&contents, &origin)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> Result<Self, ConfigLoadError> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                ConfigLoadError::Parse {
                    origin: origin.to_string(),
                    source: anyhow!(
                        "toml error: {toml_err}; json error: {json_err}"
                    ),
                }
            })
        })
    }

    pub fn parse_json(raw: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            source: err.into(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.telemetry_retention_hours == 0 {
            return Err(ConfigLoadError::Invalid(
                "telemetry_retention_hours must be at least 1".into(),
            ));
        }
        if !(self.completion_threshold > 0.0
            && self.completion_threshold <= 100.0)
        {
            return Err(ConfigLoadError::Invalid(format!(
                "completion_threshold must be in (0, 100], got {}",
                self.completion_threshold
            )));
        }
        if self.telemetry_cap == 0 {
            return Err(ConfigLoadError::Invalid(
                "telemetry_cap must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            progress_max_age_months: self.progress_max_age_months,
            completion_threshold: self.completion_threshold,
            telemetry_cap: self.telemetry_cap,
        }
    }

    pub fn settings_defaults(&self) -> TrackerSettings {
        TrackerSettings {
            telemetry_retention_hours: self.telemetry_retention_hours,
        }
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "reelmark.toml",
            "reelmark.json",
            "config/reelmark.toml",
            "config/reelmark.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }
}
