use std::path::{Path, PathBuf};

use async_trait::async_trait;
use moodwell_schema::WellnessError;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::kv::KvBackend;

/// One file per key under a profile directory.
///
/// Writes go to a sibling temp file that is synced and then renamed over the
/// target, so readers see either the old value or the new one.
pub struct FileKv {
    root: PathBuf,
}

impl FileKv {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_stem_for(key)))
    }
}

fn file_stem_for(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl KvBackend for FileKv {
    async fn get_item(&self, key: &str) -> Result<Option<String>, WellnessError> {
        match fs::read_to_string(self.item_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(WellnessError::unavailable(err)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), WellnessError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(WellnessError::unavailable)?;
        let path = self.item_path(key);
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(WellnessError::unavailable)?;
        file.write_all(value.as_bytes())
            .await
            .map_err(WellnessError::unavailable)?;
        file.sync_all().await.map_err(WellnessError::unavailable)?;
        drop(file);

        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(WellnessError::unavailable(err));
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), WellnessError> {
        match fs::remove_file(self.item_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(WellnessError::unavailable(err)),
        }
    }
}
