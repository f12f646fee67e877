//! Index bootstrap for log-structured tables.
//!
//! When an upsert pipeline starts, every parallel worker rebuilds its share
//! of the key → location index from the table already on storage, so that
//! incoming records can be routed to the file group that holds them without
//! scanning the table on every write.
//!
//! Each worker runs a one-shot pass on its first input element:
//!
//! - list partitions matching the configured filter,
//! - resolve the live [`FileSlice`](logtable_types::FileSlice)s as of the
//!   latest completed instant,
//! - for every file group routed to this worker, read the base file keys and
//!   merge-scan the log files,
//! - emit one sealed [`IndexRecord`](logtable_types::IndexRecord) per key,
//! - wait on a cluster-wide rendezvous barrier until all workers are done.
//!
//! Only then is the triggering element, and everything after it, forwarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use logtable_bootstrap::{BootstrapConfig, InMemoryRegistry, IndexBootstrap};
//! use logtable_types::WorkerContext;
//! use std::sync::Arc;
//!
//! # async fn example(table: logtable_bootstrap::TableContext) -> logtable_bootstrap::Result<()> {
//! let config = BootstrapConfig::default().with_partition_regex("2024/.*");
//! let worker = WorkerContext::new(0, 4, 128)?;
//! let registry = Arc::new(InMemoryRegistry::new());
//!
//! let mut bootstrap = IndexBootstrap::new(config, worker, table, registry)?;
//! let mut out = Vec::new();
//! bootstrap.process_element("first", &mut out).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use logtable_types::TypesError;
use thiserror::Error;

// Rendezvous between workers
pub mod barrier;

// Per-worker one-shot state machine
pub mod coordinator;

// Configuration
pub mod config;

// Index record emission and output collectors
pub mod emitter;

// Base file and log key extraction
pub mod extractor;

// Log block merge scanning
pub mod log_scan;

// Live file slice resolution
pub mod resolver;

// Local filesystem partition discovery
pub mod storage;

// Collaborator contracts for table access
pub mod table;

pub use barrier::{InMemoryRegistry, RendezvousBarrier, RendezvousRegistry};
pub use config::{BaseFileFormat, BootstrapConfig, TableConfig};
pub use coordinator::{BootstrapPhase, BootstrapStats, IndexBootstrap};
pub use emitter::{BootstrapOutput, Collector, IndexEmitter};
pub use extractor::KeyExtractor;
pub use log_scan::{KeyOp, LogMergeScanner};
pub use resolver::FileSliceResolver;
pub use storage::LocalTableStorage;
pub use table::{
    BaseFileKeyReader, LogBlock, LogBlockContent, LogBlockReader, SchemaResolver, TableContext,
    TableSchema, TableStorage, Timeline,
};

/// Result type for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Errors that can occur while bootstrapping the index.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Timeline or file system view failure.
    #[error("Timeline error: {0}")]
    Timeline(String),

    /// Table schema could not be resolved.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A collaborator could not decode a file.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Reading record keys from a base file failed.
    #[error("Error when loading record keys from file: {path}")]
    BaseFileRead {
        /// Base file path
        path: String,
        /// Underlying failure
        #[source]
        source: Box<BootstrapError>,
    },

    /// Merge-scanning log files failed.
    #[error("Error when loading record keys from files: {paths:?}")]
    LogScan {
        /// Log file paths of the slice
        paths: Vec<String>,
        /// Underlying failure
        #[source]
        source: Box<BootstrapError>,
    },

    /// Rendezvous registry failure.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Not all workers reached the barrier in time.
    #[error(
        "Barrier {barrier} timed out after {waited_ms} ms with {registered}/{expected} workers"
    )]
    BarrierTimeout {
        /// Barrier name
        barrier: String,
        /// Workers registered at expiry
        registered: usize,
        /// Workers expected
        expected: usize,
        /// Time spent waiting
        waited_ms: u128,
    },

    /// Downstream output channel is closed.
    #[error("Output channel closed")]
    OutputClosed,

    /// A previous bootstrap pass on this worker failed or was interrupted.
    #[error("Bootstrap of worker {0} did not complete")]
    Incomplete(u32),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Partition filter is not a valid regular expression.
    #[error("Invalid partition filter: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid worker layout.
    #[error("Invalid worker layout: {0}")]
    Layout(#[from] TypesError),
}

/// Version information for the bootstrap crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Marker file identifying a partition directory.
pub const PARTITION_METADATA_FILE: &str = ".partition_metadata";

/// Table metadata directory under the base path.
pub const METADATA_DIR: &str = ".logtable";

/// Default name of the bootstrap barrier.
pub const DEFAULT_BARRIER_NAME: &str = "index_bootstrap";
