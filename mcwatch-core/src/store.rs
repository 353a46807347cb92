//! Ledger persistence.
//!
//! The whole ledger is written on every save. A missing or unreadable file
//! loads as an empty ledger.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::models::{LedgerEntry, PlayerName};

/// Ledger contents in insertion order. Every key found on disk is kept, so a
/// load followed by a save never drops an entry.
pub type Records = IndexMap<PlayerName, LedgerEntry>;

pub trait LedgerStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Records> + Send;

    /// Replace the stored ledger with `records`.
    fn save(&self, records: &Records) -> impl Future<Output = Result<()>> + Send;
}

/// JSON file on disk, replaced atomically through a temp file and rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerStore for JsonFileStore {
    async fn load(&self) -> Records {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no ledger file yet, starting empty");
                return Records::new();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read ledger, starting empty"
                );
                return Records::new();
            }
        };

        match serde_json::from_str::<Records>(&contents) {
            Ok(records) => {
                info!(path = %self.path.display(), players = records.len(), "ledger loaded");
                records
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed ledger, starting empty");
                Records::new()
            }
        }
    }

    async fn save(&self, records: &Records) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), players = records.len(), "ledger saved");
        Ok(())
    }
}

/// In-memory store, shared between clones. Useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Records,
    saves: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Records) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.inner.lock() {
            state.records = records;
        }
        store
    }

    /// Records as of the last successful save.
    pub fn records(&self) -> Records {
        self.inner
            .lock()
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|state| state.saves).unwrap_or(0)
    }

    /// Make every following save fail with an io error.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.failing = failing;
        }
    }
}

impl LedgerStore for MemoryStore {
    async fn load(&self) -> Records {
        self.records()
    }

    async fn save(&self, records: &Records) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("memory store poisoned")))?;
        if state.failing {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::StorageFull,
                "no space left on device",
            )));
        }
        state.records = records.clone();
        state.saves += 1;
        Ok(())
    }
}
