//! Collaborator contracts for table access
//!
//! The bootstrap only reads the table. Storage listing, the commit
//! timeline, schema resolution and file decoding are provided by the
//! surrounding system through the traits below.

use crate::Result;
use async_trait::async_trait;
use logtable_types::{FileSlice, InstantId, RecordKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Read access to the table's directory layout
#[async_trait]
pub trait TableStorage: Send + Sync {
    /// Table root, for log messages
    fn base_path(&self) -> &str;

    /// Partition paths relative to the base path, `/`-separated.
    ///
    /// Only directories carrying the partition metadata marker are returned.
    async fn list_partition_paths(&self) -> Result<Vec<String>>;
}

/// Commit timeline and file system view of the table
#[async_trait]
pub trait Timeline: Send + Sync {
    /// Latest completed commit instant, `None` for an empty table
    async fn latest_completed_instant(&self) -> Result<Option<InstantId>>;

    /// Latest file slice of every file group in the partition, as of `instant`
    async fn slices_as_of(
        &self,
        partition_path: &str,
        instant: &InstantId,
    ) -> Result<Vec<FileSlice>>;
}

/// Current table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema definition as written in the table metadata
    pub definition: serde_json::Value,
    /// Fields forming the record key
    pub record_key_fields: Vec<String>,
}

impl TableSchema {
    /// Create a schema
    pub fn new(definition: serde_json::Value, record_key_fields: Vec<String>) -> Self {
        Self {
            definition,
            record_key_fields,
        }
    }
}

/// Resolves the table's single current schema
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    /// Schema used to decode log blocks
    async fn current_table_schema(&self) -> Result<TableSchema>;
}

/// Lightweight key scan over columnar base files
#[async_trait]
pub trait BaseFileKeyReader: Send + Sync {
    /// Record key and partition path of every row in the file
    async fn keys_of(&self, path: &str) -> Result<Vec<RecordKey>>;
}

/// Payload of one log block, reduced to what indexing needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogBlockContent {
    /// Inserted or updated records
    Data {
        /// Keys of the records in the block
        keys: Vec<String>,
    },
    /// Deleted records
    Delete {
        /// Keys of the deleted records
        keys: Vec<String>,
    },
    /// Command block undoing every earlier block written by `target_instant`
    Rollback {
        /// Instant whose blocks are rolled back
        target_instant: InstantId,
    },
}

/// One decoded log block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBlock {
    /// Instant that wrote the block
    pub instant: InstantId,
    /// Block payload
    pub content: LogBlockContent,
}

impl LogBlock {
    /// Data block with the given keys
    pub fn data<S: Into<String>>(instant: InstantId, keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            instant,
            content: LogBlockContent::Data {
                keys: keys.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Delete block with the given keys
    pub fn delete<S: Into<String>>(instant: InstantId, keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            instant,
            content: LogBlockContent::Delete {
                keys: keys.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Rollback command block
    pub fn rollback(instant: InstantId, target_instant: InstantId) -> Self {
        Self {
            instant,
            content: LogBlockContent::Rollback { target_instant },
        }
    }
}

/// Decoder for log files
#[async_trait]
pub trait LogBlockReader: Send + Sync {
    /// Blocks of the log file in the order they were written
    async fn read_blocks(&self, path: &str, schema: &TableSchema) -> Result<Vec<LogBlock>>;
}

/// Handles to every collaborator of one table
#[derive(Clone)]
pub struct TableContext {
    /// Directory layout
    pub storage: Arc<dyn TableStorage>,
    /// Commit timeline
    pub timeline: Arc<dyn Timeline>,
    /// Schema resolution
    pub schema: Arc<dyn SchemaResolver>,
    /// Base file key reader
    pub base_reader: Arc<dyn BaseFileKeyReader>,
    /// Log block decoder
    pub log_reader: Arc<dyn LogBlockReader>,
}

impl fmt::Debug for TableContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableContext")
            .field("base_path", &self.storage.base_path())
            .finish_non_exhaustive()
    }
}
