//! Key extraction for a single file slice
//!
//! The key set of a slice is the base file's keys plus the keys upserted by
//! its logs, minus the keys whose latest log operation is a delete. Identity
//! is by key: a log update of a base key adds nothing, since the index only
//! records where a key lives, not what it holds.

use crate::log_scan::LogMergeScanner;
use crate::table::{BaseFileKeyReader, LogBlockReader, TableSchema};
use crate::{BootstrapError, Result};
use logtable_types::{FileSlice, InstantId, RecordKey};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Resolves the surviving key set of file slices
#[derive(Clone)]
pub struct KeyExtractor {
    base_reader: Arc<dyn BaseFileKeyReader>,
    log_reader: Arc<dyn LogBlockReader>,
}

impl KeyExtractor {
    /// Create an extractor over the given file readers
    pub fn new(
        base_reader: Arc<dyn BaseFileKeyReader>,
        log_reader: Arc<dyn LogBlockReader>,
    ) -> Self {
        Self {
            base_reader,
            log_reader,
        }
    }

    /// Deduplicated keys alive in `slice` as of `as_of`.
    ///
    /// Base keys keep their file order and come first; keys only known to
    /// the logs follow in the order the logs first touched them. Any read or
    /// decode failure is returned, never skipped.
    ///
    /// The whole key set of the slice is held in memory while it is
    /// deduplicated, so memory grows with the largest slice.
    pub async fn extract_keys(
        &self,
        slice: &FileSlice,
        schema: &TableSchema,
        as_of: &InstantId,
    ) -> Result<Vec<RecordKey>> {
        let base_keys = match &slice.base_file {
            Some(base) if base.size_bytes > 0 => {
                self.base_reader.keys_of(&base.path).await.map_err(|e| {
                    BootstrapError::BaseFileRead {
                        path: base.path.clone(),
                        source: Box::new(e),
                    }
                })?
            }
            _ => Vec::new(),
        };

        let log_paths: Vec<String> = slice
            .log_files
            .iter()
            .filter(|log| log.size_bytes > 0)
            .map(|log| log.path.clone())
            .collect();

        if log_paths.is_empty() {
            return Ok(dedup_base_keys(base_keys));
        }

        let mut scanner =
            LogMergeScanner::scan(self.log_reader.as_ref(), &log_paths, schema, as_of).await?;
        let keys = merge_keys(base_keys, &scanner, &slice.partition_path);
        scanner.close();

        trace!(
            "Extracted {} keys from file group {}",
            keys.len(),
            slice.file_group_id
        );
        Ok(keys)
    }
}

fn dedup_base_keys(base_keys: Vec<RecordKey>) -> Vec<RecordKey> {
    let mut seen = HashSet::with_capacity(base_keys.len());
    base_keys
        .into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

fn merge_keys(
    base_keys: Vec<RecordKey>,
    scanner: &LogMergeScanner,
    partition_path: &str,
) -> Vec<RecordKey> {
    let mut seen = HashSet::with_capacity(base_keys.len() + scanner.len());
    let mut keys = Vec::with_capacity(base_keys.len() + scanner.len());

    for key in base_keys {
        if scanner.is_deleted(&key.key) {
            continue;
        }
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    for key in scanner.upserted_keys() {
        let key = RecordKey::new(key, partition_path);
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    keys
}
