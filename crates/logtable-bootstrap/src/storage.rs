//! Partition discovery on a local filesystem
//!
//! A directory below the table root is a partition when it holds the
//! partition metadata marker file. Partitions may be nested
//! (`year=2024/month=01`), so the walk descends into every directory except
//! hidden ones such as the table metadata directory.

use crate::config::TableConfig;
use crate::table::TableStorage;
use crate::{BootstrapError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// [`TableStorage`] over a table rooted on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalTableStorage {
    base_path: PathBuf,
    base_path_display: String,
    marker_file: String,
    metadata_dir: String,
}

impl LocalTableStorage {
    /// Create a storage view from the table configuration
    pub fn new(config: &TableConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            base_path_display: config.base_path.display().to_string(),
            marker_file: config.partition_metadata_file.clone(),
            metadata_dir: config.metadata_dir.clone(),
        }
    }

    fn relative_partition(&self, dir: &Path) -> Result<String> {
        let relative = dir.strip_prefix(&self.base_path).map_err(|e| {
            BootstrapError::Storage(format!("Partition {} outside table root: {e}", dir.display()))
        })?;

        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(segments.join("/"))
    }

    fn is_skipped_dir(&self, name: &str) -> bool {
        name == self.metadata_dir || name.starts_with('.')
    }
}

#[async_trait]
impl TableStorage for LocalTableStorage {
    fn base_path(&self) -> &str {
        &self.base_path_display
    }

    async fn list_partition_paths(&self) -> Result<Vec<String>> {
        let mut partitions = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            let mut is_partition = false;

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    if self.is_skipped_dir(&name) {
                        trace!("Skipping hidden directory {:?}", entry.path());
                    } else {
                        pending.push(entry.path());
                    }
                } else if name == self.marker_file {
                    is_partition = true;
                }
            }

            if is_partition {
                partitions.push(self.relative_partition(&dir)?);
            }
        }

        partitions.sort();
        debug!(
            "Found {} partitions under {}",
            partitions.len(),
            self.base_path_display
        );
        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{METADATA_DIR, PARTITION_METADATA_FILE};
    use std::fs;
    use tempfile::TempDir;

    fn mark_partition(root: &Path, partition: &str) {
        let dir = root.join(partition);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PARTITION_METADATA_FILE), b"commitTime=001\n").unwrap();
    }

    #[tokio::test]
    async fn test_lists_marked_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        mark_partition(root, "2024/01/01");
        mark_partition(root, "2024/01/02");
        mark_partition(root, "2023/12/31");
        fs::create_dir_all(root.join("2024/01/03")).unwrap();
        fs::write(root.join("2024/01/01/fg-1_001.parquet"), b"data").unwrap();

        let storage = LocalTableStorage::new(&TableConfig::new(root));
        let partitions = storage.list_partition_paths().await.unwrap();

        assert_eq!(partitions, vec!["2023/12/31", "2024/01/01", "2024/01/02"]);
    }

    #[tokio::test]
    async fn test_skips_metadata_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        mark_partition(root, "region=eu");
        mark_partition(root, &format!("{METADATA_DIR}/archived"));
        mark_partition(root, ".tmp/staging");

        let storage = LocalTableStorage::new(&TableConfig::new(root));
        let partitions = storage.list_partition_paths().await.unwrap();

        assert_eq!(partitions, vec!["region=eu"]);
    }

    #[tokio::test]
    async fn test_non_partitioned_table_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(PARTITION_METADATA_FILE), b"").unwrap();

        let storage = LocalTableStorage::new(&TableConfig::new(temp_dir.path()));
        let partitions = storage.list_partition_paths().await.unwrap();

        assert_eq!(partitions, vec![String::new()]);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalTableStorage::new(&TableConfig::new(temp_dir.path().join("absent")));

        assert!(matches!(
            storage.list_partition_paths().await,
            Err(BootstrapError::Io(_))
        ));
    }
}
