//! # Reelmark Core
//!
//! Tracks how far a user got through the things they watch on streaming
//! sites, keyed by *what* was watched rather than the page it was watched on,
//! plus a small rolling log of detector health events.
//!
//! ## Overview
//!
//! - **Content identity**: [`identity::derive_key`] turns noisy page metadata
//!   into a stable key
//! - **Reconciliation**: [`progress::ProgressReconciler`] merges observations
//!   into the store, migrating legacy keys and collapsing series episodes
//! - **Retention**: [`retention::RetentionManager`] drops stale completed
//!   records, [`retention::RetentionPolicy`] bounds telemetry
//! - **Telemetry**: [`telemetry::TelemetryLog`] keeps the latest report per
//!   detector
//!
//! Everything talks to storage through the [`store::RecordStore`] trait, an
//! asynchronous key-value map without transactions.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reelmark_core::{
//!     progress::ProgressReconciler,
//!     store::MemoryStore,
//! };
//! use reelmark_model::Observation;
//!
//! async fn track() -> reelmark_core::error::Result<()> {
//!     let reconciler = ProgressReconciler::new(Arc::new(MemoryStore::new()));
//!     let observation = Observation {
//!         url: "https://www.netflix.com/watch/81234".into(),
//!         title: Some("Heat".into()),
//!         current_time: 1800.0,
//!         duration: 10_200.0,
//!         platform: Some("Netflix".into()),
//!         ..Default::default()
//!     };
//!
//!     let outcome = reconciler.record_observation(&observation).await?;
//!     println!("stored under {}", outcome.key);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Error types and error handling utilities
pub mod error;

/// Content key derivation
pub mod identity;

/// Observation merging, legacy migration and lookups
pub mod progress;

/// Age and size limits for stored data
pub mod retention;

/// Stored user settings
pub mod settings;

/// Key-value store contract and adapters
pub mod store;

/// Detector telemetry log
pub mod telemetry;

/// URL normalization and fuzzy matching
pub mod url_match;

pub use error::{Result, TrackerError};
pub use reelmark_model as model;
