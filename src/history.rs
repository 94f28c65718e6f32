//! Analysis history: an ordered, persisted log of past results.
//!
//! [`HistoryStore`] keeps records newest-first and rewrites the whole
//! sequence through its [`HistoryBackend`] on every mutation. The backend is
//! a single named key-value slot holding a JSON array; there is no
//! versioning, deduplication or eviction.
//!
//! Loading never fails: a missing slot starts empty, an unreadable or
//! corrupt one is logged and also starts empty, and individual records that
//! no longer match the schema are dropped with a warning.

use crate::error::BotanError;
use crate::output::{confidence_in_range, HistorySummary, PlantAnalysis};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Name of the persisted slot.
pub const HISTORY_KEY: &str = "botanai_history";

/// Storage port for the serialised history.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Human-readable location for logs and errors.
    fn location(&self) -> String;

    /// Current blob, or `None` when nothing was ever written.
    async fn read(&self) -> Result<Option<String>, BotanError>;

    /// Replace the blob.
    async fn write(&self, blob: &str) -> Result<(), BotanError>;
}

/// JSON file on disk, replaced atomically on each write.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, e: impl std::fmt::Display) -> BotanError {
        BotanError::HistoryWriteFailed {
            location: self.location(),
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl HistoryBackend for FileBackend {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Option<String>, BotanError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BotanError::HistoryReadFailed {
                location: self.location(),
                detail: e.to_string(),
            }),
        }
    }

    async fn write(&self, blob: &str) -> Result<(), BotanError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| self.write_error(e))?;

        // Temp file in the same directory so the rename stays atomic.
        let path = self.path.clone();
        let blob = blob.to_string();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(blob.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| self.write_error(e))?
        .map_err(|e| self.write_error(e))
    }
}

/// In-memory slot, for tests and embedding applications with their own
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing blob.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(blob.into())),
        }
    }

    /// Current blob.
    pub fn blob(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    fn location(&self) -> String {
        format!("memory:{HISTORY_KEY}")
    }

    async fn read(&self) -> Result<Option<String>, BotanError> {
        Ok(self.blob())
    }

    async fn write(&self, blob: &str) -> Result<(), BotanError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob.to_string());
        Ok(())
    }
}

/// Default history file: `<data dir>/botanai/botanai_history.json`.
pub fn default_history_path() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("botanai").join(format!("{HISTORY_KEY}.json"))
}

/// Newest-first list of analyses, persisted on every mutation.
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    records: Vec<PlantAnalysis>,
}

impl HistoryStore {
    /// Restore the history from `backend`, defaulting to empty on any problem.
    pub async fn load(backend: Arc<dyn HistoryBackend>) -> Self {
        let records = match backend.read().await {
            Ok(Some(blob)) => parse_blob(&blob, &backend.location()),
            Ok(None) => {
                debug!("No history at {}, starting empty", backend.location());
                Vec::new()
            }
            Err(e) => {
                warn!("{}; starting with empty history", e);
                Vec::new()
            }
        };
        info!("Loaded {} history records", records.len());
        Self { backend, records }
    }

    pub fn records(&self) -> &[PlantAnalysis] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PlantAnalysis> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn summaries(&self) -> Vec<HistorySummary> {
        self.records.iter().map(PlantAnalysis::summary).collect()
    }

    /// Prepend `record` and persist. On a failed write the record is dropped
    /// again so memory and storage agree.
    pub async fn append(&mut self, record: PlantAnalysis) -> Result<(), BotanError> {
        self.records.insert(0, record);
        if let Err(e) = self.persist().await {
            self.records.remove(0);
            return Err(e);
        }
        Ok(())
    }

    /// Remove every record and persist the empty sequence.
    pub async fn clear(&mut self) -> Result<(), BotanError> {
        let previous = std::mem::take(&mut self.records);
        if let Err(e) = self.persist().await {
            self.records = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), BotanError> {
        let blob = serde_json::to_string(&self.records).map_err(|e| {
            BotanError::HistoryWriteFailed {
                location: self.backend.location(),
                detail: e.to_string(),
            }
        })?;
        self.backend.write(&blob).await?;
        debug!(
            "Persisted {} records ({} bytes) to {}",
            self.records.len(),
            blob.len(),
            self.backend.location()
        );
        Ok(())
    }
}

fn parse_blob(blob: &str, location: &str) -> Vec<PlantAnalysis> {
    let items = match serde_json::from_str::<Vec<serde_json::Value>>(blob) {
        Ok(items) => items,
        Err(e) => {
            warn!("History at {} is corrupt ({}); starting empty", location, e);
            return Vec::new();
        }
    };
    let total = items.len();
    let records: Vec<PlantAnalysis> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<PlantAnalysis>(v).ok())
        .filter(|r| confidence_in_range(r.confidence))
        .collect();
    if records.len() < total {
        warn!(
            "Dropped {} unreadable history records from {}",
            total - records.len(),
            location
        );
    }
    records
}
