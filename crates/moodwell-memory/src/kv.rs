use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use moodwell_schema::WellnessError;

/// A per-profile string key-value store, the shape of browser local storage.
///
/// `set_item` must not return until the value is durable for the backend.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, WellnessError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), WellnessError>;
    /// Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), WellnessError>;
}

/// Process-local backend. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, WellnessError> {
        self.items
            .lock()
            .map_err(|_| WellnessError::unavailable("memory store lock poisoned"))
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get_item(&self, key: &str) -> Result<Option<String>, WellnessError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), WellnessError> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), WellnessError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
