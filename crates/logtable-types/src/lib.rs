//! Shared data model for log-structured tables.
//!
//! A table is organized as partitions, each partition holding file groups.
//! A file group is versioned as [`FileSlice`]s: an optional columnar base
//! file plus ordered log files recording later inserts, updates and deletes.
//!
//! The [`assignment`] module holds the key-group routing used to spread file
//! groups and record keys across parallel workers. Both the index bootstrap
//! and the keyed shuffle in front of the writers route through it, so the
//! two can never disagree about ownership.
//!
//! # Example
//!
//! ```rust
//! use logtable_types::assignment;
//!
//! let owner = assignment::assign_to_worker("file-group-0001", 128, 4);
//! assert!(assignment::owns("file-group-0001", 128, 4, owner));
//! ```

#![warn(missing_docs)]

pub mod assignment;
mod error;
mod model;

pub use error::{Result, TypesError};
pub use model::{
    BaseFile, FileGroupId, FileSlice, GlobalLocation, IndexRecord, InstantId, LogFile, RecordKey,
    WorkerContext,
};

/// Upper bound for the number of key groups a job may be configured with.
pub const MAX_KEY_GROUPS: u32 = 1 << 15;

/// Default number of key groups when none is configured.
pub const DEFAULT_KEY_GROUPS: u32 = 128;
