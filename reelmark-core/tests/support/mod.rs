//! Shared fixtures for core integration tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reelmark_core::{
    error::{Result, TrackerError},
    store::{MemoryStore, RecordStore, StoreEntries},
};
use reelmark_model::{ContentType, Observation};

/// Memory store that can be told to fail full scans or every call.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_full_scans: AtomicBool,
    pub fail_everything: AtomicBool,
}

impl FlakyStore {
    pub fn failing_full_scans() -> Self {
        let store = Self::default();
        store.fail_full_scans.store(true, Ordering::SeqCst);
        store
    }

    pub fn unavailable() -> Self {
        let store = Self::default();
        store.fail_everything.store(true, Ordering::SeqCst);
        store
    }

    fn check(&self) -> Result<()> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(TrackerError::StoreUnavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get(&self, keys: Option<&[String]>) -> Result<StoreEntries> {
        self.check()?;
        if keys.is_none() && self.fail_full_scans.load(Ordering::SeqCst) {
            return Err(TrackerError::StoreUnavailable("scan refused".into()));
        }
        self.inner.get(keys).await
    }

    async fn set(&self, items: StoreEntries) -> Result<()> {
        self.check()?;
        self.inner.set(items).await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.check()?;
        self.inner.remove(keys).await
    }
}

pub fn movie(url: &str, title: &str, platform: &str) -> Observation {
    Observation {
        url: url.to_string(),
        title: Some(title.to_string()),
        current_time: 600.0,
        duration: 6000.0,
        platform: Some(platform.to_string()),
        content_type: Some(ContentType::Movie),
        ..Default::default()
    }
}

pub fn episode(
    url: &str,
    title: &str,
    platform: &str,
    series: &str,
    number: i64,
) -> Observation {
    Observation {
        url: url.to_string(),
        title: Some(title.to_string()),
        current_time: 300.0,
        duration: 1500.0,
        platform: Some(platform.to_string()),
        content_type: Some(ContentType::Episode),
        series_title: Some(series.to_string()),
        episode_number: Some(number),
        season_number: Some(1),
        ..Default::default()
    }
}
