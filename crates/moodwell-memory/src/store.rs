use async_trait::async_trait;
use moodwell_schema::{Entry, PersistenceError, WellnessError, DEFAULT_NAMESPACE};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::kv::KvBackend;

/// Result of a display-safe read. A failed read becomes an empty list plus
/// the reason: `corruption` for unreadable data, `unavailable` for anything
/// else (I/O failures, a locked database).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOutcome {
    pub entries: Vec<Entry>,
    pub corruption: Option<String>,
    pub unavailable: Option<String>,
}

impl LoadOutcome {
    pub fn is_corrupted(&self) -> bool {
        self.corruption.is_some()
    }
}

/// Append-ordered journal storage for one profile.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Durably appends `entry`. On error nothing becomes visible to readers.
    async fn append(&self, entry: Entry) -> Result<(), WellnessError>;

    /// All entries, oldest first. Empty when nothing has been stored yet.
    async fn load_all(&self) -> Result<Vec<Entry>, WellnessError>;

    /// Removes every entry. Calling it on an empty store is a no-op.
    async fn clear(&self) -> Result<(), WellnessError>;

    /// Removes one entry, returning whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, WellnessError>;

    fn namespace(&self) -> &str;

    async fn load_all_or_empty(&self) -> LoadOutcome {
        match self.load_all().await {
            Ok(entries) => LoadOutcome {
                entries,
                ..LoadOutcome::default()
            },
            Err(WellnessError::Persistence(PersistenceError::Corrupted(detail))) => {
                warn!(namespace = self.namespace(), %detail, "journal unreadable, showing no entries");
                LoadOutcome {
                    corruption: Some(detail),
                    ..LoadOutcome::default()
                }
            }
            Err(error) => {
                warn!(
                    namespace = self.namespace(),
                    %error,
                    "journal could not be loaded, showing no entries"
                );
                LoadOutcome {
                    unavailable: Some(error.to_string()),
                    ..LoadOutcome::default()
                }
            }
        }
    }
}

/// Stores the whole journal as one JSON array under a namespace key.
///
/// The decoded list is cached after the first read. Writers hold the cache
/// lock across the backend write and only replace the cached list once the
/// backend has accepted the new value. The cache is dropped while a write is
/// pending, so a write that fails or is cancelled midway forces the next
/// caller to re-read the backend.
pub struct KvEntryStore<B> {
    backend: B,
    namespace: String,
    quota_bytes: Option<usize>,
    view: RwLock<Option<Vec<Entry>>>,
}

impl<B: KvBackend> KvEntryStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            quota_bytes: None,
            view: RwLock::new(None),
        }
    }

    /// Cap the encoded size of the journal, like a browser storage quota.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    async fn read_backend(&self) -> Result<Vec<Entry>, WellnessError> {
        let raw = self.backend.get_item(&self.namespace).await?;
        decode_entries(raw.as_deref())
    }

    async fn current(&self, view: &Option<Vec<Entry>>) -> Result<Vec<Entry>, WellnessError> {
        match view {
            Some(entries) => Ok(entries.clone()),
            None => self.read_backend().await,
        }
    }

    async fn write(&self, entries: &[Entry]) -> Result<(), WellnessError> {
        let encoded = serde_json::to_string(entries)
            .map_err(|e| WellnessError::unavailable(format!("failed to encode journal: {e}")))?;
        if let Some(quota) = self.quota_bytes {
            if encoded.len() > quota {
                return Err(PersistenceError::QuotaExceeded {
                    needed: encoded.len(),
                    quota,
                }
                .into());
            }
        }
        self.backend.set_item(&self.namespace, &encoded).await
    }
}

/// Missing and empty values both mean "no journal yet".
fn decode_entries(raw: Option<&str>) -> Result<Vec<Entry>, WellnessError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let entries: Vec<Entry> = serde_json::from_str(raw)
        .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
    for entry in &entries {
        entry
            .check_invariants()
            .map_err(PersistenceError::Corrupted)?;
    }
    Ok(entries)
}

#[async_trait]
impl<B: KvBackend> EntryStore for KvEntryStore<B> {
    async fn append(&self, entry: Entry) -> Result<(), WellnessError> {
        entry
            .check_invariants()
            .map_err(PersistenceError::InvalidEntry)?;
        let mut view = self.view.write().await;
        let mut entries = self.current(&view).await?;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(PersistenceError::DuplicateId(entry.id).into());
        }
        let id = entry.id;
        entries.push(entry);
        *view = None;
        self.write(&entries).await?;
        debug!(namespace = %self.namespace, %id, total = entries.len(), "entry appended");
        *view = Some(entries);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Entry>, WellnessError> {
        if let Some(entries) = self.view.read().await.as_ref() {
            return Ok(entries.clone());
        }
        let mut view = self.view.write().await;
        let entries = self.current(&view).await?;
        *view = Some(entries.clone());
        Ok(entries)
    }

    async fn clear(&self) -> Result<(), WellnessError> {
        let mut view = self.view.write().await;
        *view = None;
        self.backend.remove_item(&self.namespace).await?;
        *view = Some(Vec::new());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, WellnessError> {
        let mut view = self.view.write().await;
        let mut entries = self.current(&view).await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            *view = Some(entries);
            return Ok(false);
        }
        *view = None;
        self.write(&entries).await?;
        *view = Some(entries);
        Ok(true)
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
