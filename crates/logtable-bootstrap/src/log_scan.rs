//! Log block merge scanning
//!
//! Log files are replayed oldest first. Blocks written after the snapshot
//! instant are ignored, rollback command blocks discard the blocks of their
//! target instant, and the remaining data and delete blocks are merged so
//! that the last operation on a key wins.
//!
//! Only the key, the operation and the writing instant are kept per record;
//! row values are never materialized.

use crate::table::{LogBlock, LogBlockContent, LogBlockReader, TableSchema};
use crate::{BootstrapError, Result};
use logtable_types::InstantId;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Latest operation recorded for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOp {
    /// Inserted or updated
    Upsert,
    /// Deleted
    Delete,
}

#[derive(Debug)]
struct MergedEntry {
    op: KeyOp,
    instant: InstantId,
}

/// Merged view of the log files of one file slice.
///
/// Release with [`close`](Self::close) once the keys have been consumed.
#[derive(Debug)]
pub struct LogMergeScanner {
    records: HashMap<String, MergedEntry>,
    // First-seen order of keys, for deterministic emission
    order: Vec<String>,
    blocks_merged: usize,
    blocks_after_snapshot: usize,
    blocks_rolled_back: usize,
    closed: bool,
}

impl LogMergeScanner {
    /// Read and merge `log_paths` in order, as of `as_of`.
    ///
    /// A failure to read or decode any log file aborts the scan.
    pub async fn scan(
        reader: &dyn LogBlockReader,
        log_paths: &[String],
        schema: &TableSchema,
        as_of: &InstantId,
    ) -> Result<Self> {
        let mut pending: Vec<LogBlock> = Vec::new();
        let mut blocks_after_snapshot = 0;
        let mut blocks_rolled_back = 0;

        for path in log_paths {
            let blocks = reader.read_blocks(path, schema).await.map_err(|e| {
                BootstrapError::LogScan {
                    paths: log_paths.to_vec(),
                    source: Box::new(e),
                }
            })?;
            trace!("Read {} log blocks from {}", blocks.len(), path);

            for block in blocks {
                if block.instant > *as_of {
                    blocks_after_snapshot += 1;
                    continue;
                }

                if let LogBlockContent::Rollback { target_instant } = &block.content {
                    let before = pending.len();
                    pending.retain(|b| b.instant != *target_instant);
                    blocks_rolled_back += before - pending.len();
                    continue;
                }

                pending.push(block);
            }
        }

        let mut scanner = Self {
            records: HashMap::new(),
            order: Vec::new(),
            blocks_merged: pending.len(),
            blocks_after_snapshot,
            blocks_rolled_back,
            closed: false,
        };
        for block in pending {
            scanner.apply(block);
        }

        debug!(
            "Merged {} log blocks into {} keys ({} after snapshot, {} rolled back)",
            scanner.blocks_merged,
            scanner.records.len(),
            scanner.blocks_after_snapshot,
            scanner.blocks_rolled_back
        );
        Ok(scanner)
    }

    fn apply(&mut self, block: LogBlock) {
        let (keys, op) = match block.content {
            LogBlockContent::Data { keys } => (keys, KeyOp::Upsert),
            LogBlockContent::Delete { keys } => (keys, KeyOp::Delete),
            LogBlockContent::Rollback { .. } => return,
        };

        for key in keys {
            let entry = MergedEntry {
                op,
                instant: block.instant.clone(),
            };
            if self.records.insert(key.clone(), entry).is_none() {
                self.order.push(key);
            }
        }
    }

    /// Keys whose latest operation is an insert or update, first-seen order
    pub fn upserted_keys(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|key| self.op(key) == Some(KeyOp::Upsert))
            .map(String::as_str)
    }

    /// Latest operation on `key`, if the log touched it
    pub fn op(&self, key: &str) -> Option<KeyOp> {
        self.records.get(key).map(|entry| entry.op)
    }

    /// Instant of the block that last touched `key`
    pub fn last_instant(&self, key: &str) -> Option<&InstantId> {
        self.records.get(key).map(|entry| &entry.instant)
    }

    /// Whether the latest operation on `key` is a delete
    pub fn is_deleted(&self, key: &str) -> bool {
        self.op(key) == Some(KeyOp::Delete)
    }

    /// Number of distinct keys touched by the merged blocks
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no key was touched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of blocks skipped because they were written after the snapshot
    pub const fn blocks_after_snapshot(&self) -> usize {
        self.blocks_after_snapshot
    }

    /// Number of blocks discarded by rollback commands
    pub const fn blocks_rolled_back(&self) -> usize {
        self.blocks_rolled_back
    }

    /// Release the merged state
    pub fn close(&mut self) {
        self.records = HashMap::new();
        self.order = Vec::new();
        self.closed = true;
    }

    /// Whether [`close`](Self::close) has been called
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}
