//! Detector health telemetry.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::lenient;

/// Lifecycle stage a detector module last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorStatus {
    #[default]
    Detecting,
    Detected,
    Attached,
    NoVideo,
    Metadata,
    Error,
    Navigation,
}

impl DetectorStatus {
    pub const ALL: [DetectorStatus; 7] = [
        DetectorStatus::Detecting,
        DetectorStatus::Detected,
        DetectorStatus::Attached,
        DetectorStatus::NoVideo,
        DetectorStatus::Metadata,
        DetectorStatus::Error,
        DetectorStatus::Navigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorStatus::Detecting => "detecting",
            DetectorStatus::Detected => "detected",
            DetectorStatus::Attached => "attached",
            DetectorStatus::NoVideo => "no-video",
            DetectorStatus::Metadata => "metadata",
            DetectorStatus::Error => "error",
            DetectorStatus::Navigation => "navigation",
        }
    }
}

impl Display for DetectorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModelError::UnknownDetectorStatus(wanted.to_string()))
    }
}

/// One stored detector observation.
///
/// At most one entry exists per `(platform, detector)` pair, compared
/// case-insensitively with missing and empty treated alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEntry {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub detector: Option<String>,
    #[serde(default)]
    pub status: DetectorStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEntry {
    /// Identity of the detector slot this entry occupies.
    pub fn pair_key(&self) -> (String, String) {
        (
            fold(self.platform.as_deref()),
            fold(self.detector.as_deref()),
        )
    }

    pub fn same_pair(&self, other: &TelemetryEntry) -> bool {
        self.pair_key() == other.pair_key()
    }
}

fn fold(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_lowercase()
}

/// Raw detector report as delivered by the transport layer, before cleaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub detector: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_status")]
    pub status: Option<DetectorStatus>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub url: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}
