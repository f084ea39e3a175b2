//! Viewing progress records and the observations that produce them.
//!
//! An [`Observation`] is what a page reports while something plays. The
//! tracker turns it into a [`ProgressRecord`], which is what actually lands in
//! the store under a derived content key.
//!
//! ## Completion
//!
//! `percent_complete` is derived from position/duration and clamped to
//! `[0, 100]`. A record is considered finished once it reaches 95%.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content_type::ContentType;
use crate::lenient;

/// Coerces a playback time to a non-negative finite number of seconds.
pub fn sanitize_seconds(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Percentage watched, clamped to `[0, 100]`; zero when the duration is
/// unknown.
pub fn percent_complete(current_time: f64, duration: f64) -> f64 {
    let current_time = sanitize_seconds(current_time);
    let duration = sanitize_seconds(duration);
    if duration <= 0.0 {
        return 0.0;
    }
    let percent = current_time / duration * 100.0;
    if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Progress report delivered by the transport layer.
///
/// # Example
///
/// ```json
/// {
///   "url": "https://example.tv/watch/81234?trackId=9",
///   "title": "Pilot",
///   "currentTime": 512.4,
///   "duration": "2710",
///   "platform": "Netflix",
///   "type": "episode",
///   "seriesTitle": "Example Show",
///   "episodeNumber": 1,
///   "seasonNumber": 1
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, deserialize_with = "lenient::text")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub current_time: f64,
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub platform: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::optional_content_type"
    )]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "lenient::optional_integer")]
    pub episode_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::optional_integer")]
    pub season_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub series_title: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub episode_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub original_title: Option<String>,
}

impl Observation {
    pub fn has_episode_markers(&self) -> bool {
        self.episode_number.is_some() || self.season_number.is_some()
    }

    /// Declared type, forced to [`ContentType::Episode`] whenever an episode
    /// or season number is present.
    pub fn resolved_content_type(&self) -> ContentType {
        if self.has_episode_markers() {
            ContentType::Episode
        } else {
            self.content_type.unwrap_or_default()
        }
    }

    /// Series title with surrounding whitespace removed, if anything is left.
    pub fn series_title_trimmed(&self) -> Option<&str> {
        self.series_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// One tracked piece of content as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Last URL the content was watched from
    #[serde(deserialize_with = "lenient::text")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    /// Playback position in seconds
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub current_time: f64,
    /// Total duration in seconds
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub percent_complete: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient::content_type")]
    pub content_type: ContentType,
    #[serde(
        default,
        deserialize_with = "lenient::optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_watched: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub series_title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub episode_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub episode_number: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub season_number: Option<i64>,
}

impl ProgressRecord {
    /// Builds the full replacement record for an observation written at
    /// `watched_at`.
    pub fn from_observation(
        observation: &Observation,
        watched_at: DateTime<Utc>,
    ) -> Self {
        let current_time = sanitize_seconds(observation.current_time);
        let duration = sanitize_seconds(observation.duration);

        Self {
            url: observation.url.clone(),
            title: observation.title.clone().unwrap_or_default(),
            current_time,
            duration,
            percent_complete: percent_complete(current_time, duration),
            platform: observation.platform.clone().unwrap_or_default(),
            content_type: observation.resolved_content_type(),
            last_watched: Some(watched_at),
            series_title: observation.series_title.clone(),
            episode_name: observation.episode_name.clone(),
            original_title: observation.original_title.clone(),
            episode_number: observation.episode_number,
            season_number: observation.season_number,
        }
    }

    pub fn is_completed(&self, threshold: f64) -> bool {
        self.percent_complete >= threshold
    }

    /// Title used when grouping records by series.
    pub fn series_or_title(&self) -> &str {
        self.series_title
            .as_deref()
            .filter(|series| !series.trim().is_empty())
            .unwrap_or(&self.title)
    }
}
