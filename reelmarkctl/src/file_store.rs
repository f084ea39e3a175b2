//! [`RecordStore`] persisted as a single JSON object on disk.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use reelmark_core::{
    Result,
    store::{RecordStore, StoreEntries},
};
use tokio::sync::Mutex;
use tracing::debug;

/// Whole-file JSON store. Every call reads the file, and every mutation
/// rewrites it through a temporary file so readers never see a torn write.
/// A missing or empty file reads as an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<StoreEntries> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(StoreEntries::new())
            }
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(StoreEntries::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_all(&self, entries: &StoreEntries) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent).await?;

        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = parent.join(format!(
            ".{}.tmp.{}",
            self.path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("store"),
            nanos
        ));
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Wrote {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get(&self, keys: Option<&[String]>) -> Result<StoreEntries> {
        let mut entries = self.read_all().await?;
        let Some(keys) = keys else {
            return Ok(entries);
        };
        Ok(keys
            .iter()
            .filter_map(|key| entries.remove_entry(key.as_str()))
            .collect())
    }

    async fn set(&self, items: StoreEntries) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.extend(items);
        self.write_all(&entries).await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        let before = entries.len();
        for key in keys {
            entries.remove(key.as_str());
        }
        if entries.len() == before {
            return Ok(());
        }
        self.write_all(&entries).await
    }
}
