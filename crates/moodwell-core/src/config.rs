use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use moodwell_memory::{EntryStore, FileKv, KvEntryStore, MemoryKv, SqliteKv};
use moodwell_schema::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};

fn default_profile() -> String {
    "default".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_step_timeout_ms() -> u64 {
    10_000
}

fn default_bus_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub quota_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            namespace: default_namespace(),
            quota_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    #[serde(default)]
    pub insight_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            insight_delay_ms: 0,
        }
    }
}

impl ControllerConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn insight_delay(&self) -> Duration {
        Duration::from_millis(self.insight_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellnessConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

impl Default for WellnessConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            storage: StorageConfig::default(),
            controller: ControllerConfig::default(),
            bus: BusConfig::default(),
        }
    }
}

impl WellnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.profile.trim().is_empty() {
            return Err(anyhow!("profile must not be empty"));
        }
        if !self
            .profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(anyhow!(
                "profile '{}' may only contain letters, digits, '-' and '_'",
                self.profile
            ));
        }
        if self.storage.namespace.trim().is_empty() {
            return Err(anyhow!("storage.namespace must not be empty"));
        }
        if self.storage.quota_bytes == Some(0) {
            return Err(anyhow!("storage.quota_bytes must be greater than zero"));
        }
        if self.controller.step_timeout_ms == 0 {
            return Err(anyhow!("controller.step_timeout_ms must be greater than zero"));
        }
        if self.bus.capacity == 0 {
            return Err(anyhow!("bus.capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Where this profile's journal lives under `data_dir`.
    pub fn profile_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("profiles").join(&self.profile)
    }

    /// Opens the configured store for this profile.
    pub fn open_store(&self, data_dir: &Path) -> Result<Arc<dyn EntryStore>> {
        let namespace = self.storage.namespace.clone();
        let quota = self.storage.quota_bytes;
        let store: Arc<dyn EntryStore> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(with_quota(
                KvEntryStore::with_namespace(MemoryKv::new(), namespace),
                quota,
            )),
            StorageBackend::File => Arc::new(with_quota(
                KvEntryStore::with_namespace(FileKv::new(self.profile_dir(data_dir)), namespace),
                quota,
            )),
            StorageBackend::Sqlite => {
                let dir = self.profile_dir(data_dir);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let db_path = dir.join("journal.db");
                let kv = SqliteKv::open(&db_path.to_string_lossy())
                    .with_context(|| format!("failed to open {}", db_path.display()))?;
                Arc::new(with_quota(KvEntryStore::with_namespace(kv, namespace), quota))
            }
        };
        Ok(store)
    }
}

fn with_quota<B: moodwell_memory::KvBackend>(
    store: KvEntryStore<B>,
    quota: Option<usize>,
) -> KvEntryStore<B> {
    match quota {
        Some(bytes) => store.with_quota(bytes),
        None => store,
    }
}

/// Reads `path` if it exists, otherwise falls back to defaults.
pub fn load_config(path: &Path) -> Result<WellnessConfig> {
    let config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str::<WellnessConfig>(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        WellnessConfig::default()
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodwell_schema::{Entry, Mood, MoodAnalysis};
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("main.yaml")).unwrap();
        assert_eq!(config.profile, "default");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.controller.step_timeout(), Duration::from_secs(10));
        assert_eq!(config.bus.capacity, 64);
    }

    #[test]
    fn parses_yaml_with_partial_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.yaml");
        fs::write(
            &path,
            r#"
profile: evening
storage:
  backend: sqlite
  quota_bytes: 4096
controller:
  step_timeout_ms: 2500
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.profile, "evening");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.quota_bytes, Some(4096));
        assert_eq!(config.storage.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.controller.step_timeout_ms, 2500);
        assert_eq!(config.controller.insight_delay_ms, 0);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = WellnessConfig::default();
        config.controller.step_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = WellnessConfig::default();
        config.storage.namespace = " ".into();
        assert!(config.validate().is_err());

        let mut config = WellnessConfig::default();
        config.profile = "../escape".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.yaml");
        fs::write(&path, "storage: [unclosed").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("main.yaml"));
    }

    #[tokio::test]
    async fn every_backend_opens_and_stores() {
        let tmp = TempDir::new().unwrap();
        for backend in [
            StorageBackend::Memory,
            StorageBackend::File,
            StorageBackend::Sqlite,
        ] {
            let mut config = WellnessConfig::default();
            config.storage.backend = backend;
            let store = config.open_store(tmp.path()).unwrap();
            let analysis = MoodAnalysis {
                mood: Mood::Calm,
                confidence: 0.65,
                emotions: Default::default(),
                matched_keywords: vec![],
            };
            store
                .append(Entry::new(Some("calm".into()), &analysis, false, None))
                .await
                .unwrap();
            assert!(!store.load_all().await.unwrap().is_empty());
        }
    }
}
