//! Error types for the table data model

use thiserror::Error;

/// Result type for data model operations.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised when constructing data model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// Worker count is zero or exceeds the key group count.
    #[error("Invalid parallelism: {total_workers} workers over {max_buckets} key groups")]
    InvalidParallelism {
        /// Configured number of key groups
        max_buckets: u32,
        /// Configured number of workers
        total_workers: u32,
    },

    /// Key group count outside `1..=MAX_KEY_GROUPS`.
    #[error("Invalid key group count: {0}")]
    InvalidKeyGroups(u32),

    /// Worker index is not below the worker count.
    #[error("Worker index {worker_index} out of range for {total_workers} workers")]
    WorkerOutOfRange {
        /// Index of the worker
        worker_index: u32,
        /// Configured number of workers
        total_workers: u32,
    },
}
