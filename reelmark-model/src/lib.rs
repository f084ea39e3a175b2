//! Core data model definitions shared across Reelmark crates.
#![allow(missing_docs)]

pub mod content_key;
pub mod content_type;
pub mod error;
pub mod lenient;
pub mod progress;
pub mod telemetry;

pub use content_key::{ContentKey, ContentKeyError};
pub use content_type::ContentType;
pub use error::{ModelError, Result as ModelResult};
pub use progress::{Observation, ProgressRecord, percent_complete, sanitize_seconds};
pub use telemetry::{DetectorStatus, TelemetryEntry, TelemetryReport};
