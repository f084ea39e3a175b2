//! Configuration for Reelmark.
//!
//! Holds the tunables the core takes as explicit values (retention windows,
//! completion threshold, telemetry cap) together with where the operator CLI
//! keeps its store, and the rules for finding and validating them.

pub mod error;
pub mod tracker;

pub use error::ConfigLoadError;
pub use tracker::{TrackerConfig, TrackerConfigSource};
