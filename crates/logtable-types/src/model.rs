//! Common types used throughout the table index

use crate::error::{Result, TypesError};
use crate::{MAX_KEY_GROUPS, assignment};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a file group within a partition.
///
/// Stable for the lifetime of the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileGroupId(String);

impl FileGroupId {
    /// Create a file group id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FileGroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timestamp of a point in the table's commit history.
///
/// Instants are fixed-width timestamps, so lexicographic order is
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstantId(String);

impl InstantId {
    /// Create an instant id
    pub fn new(instant: impl Into<String>) -> Self {
        Self(instant.into())
    }

    /// Borrow the instant as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Columnar snapshot of a file group at its creation instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseFile {
    /// Path of the file
    pub path: String,
    /// Size on storage; zero marks an incomplete write
    pub size_bytes: u64,
}

impl BaseFile {
    /// Create a base file descriptor
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}

/// Incremental file recording mutations against a base file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    /// Path of the file
    pub path: String,
    /// Size on storage; zero marks an incomplete write
    pub size_bytes: u64,
    /// Write sequence within the file slice
    pub version: u32,
}

impl LogFile {
    /// Create a log file descriptor
    pub fn new(path: impl Into<String>, size_bytes: u64, version: u32) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            version,
        }
    }
}

/// One versioned unit of storage for a file group as of a commit instant.
///
/// `log_files` are kept in write order: later entries override earlier
/// ones for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSlice {
    /// Partition the file group lives in
    pub partition_path: String,
    /// File group this slice belongs to
    pub file_group_id: FileGroupId,
    /// Instant at which the slice's base was written
    pub base_instant_time: InstantId,
    /// Optional columnar base file
    pub base_file: Option<BaseFile>,
    /// Log files, ordered by version
    pub log_files: Vec<LogFile>,
}

impl FileSlice {
    /// Create an empty slice with no base file and no logs
    pub fn new(
        partition_path: impl Into<String>,
        file_group_id: FileGroupId,
        base_instant_time: InstantId,
    ) -> Self {
        Self {
            partition_path: partition_path.into(),
            file_group_id,
            base_instant_time,
            base_file: None,
            log_files: Vec::new(),
        }
    }

    /// Attach a base file
    #[must_use]
    pub fn with_base_file(mut self, base_file: BaseFile) -> Self {
        self.base_file = Some(base_file);
        self
    }

    /// Append a log file
    #[must_use]
    pub fn with_log_file(mut self, log_file: LogFile) -> Self {
        self.log_files.push(log_file);
        self
    }

    /// Whether the slice has nothing left to read
    pub fn is_empty(&self) -> bool {
        self.base_file.is_none() && self.log_files.is_empty()
    }
}

/// Composite identity of a record, unique within the table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Record key value
    pub key: String,
    /// Partition the record belongs to
    pub partition_path: String,
}

impl RecordKey {
    /// Create a record key
    pub fn new(key: impl Into<String>, partition_path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            partition_path: partition_path.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_path, self.key)
    }
}

/// Where a record currently physically resides
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalLocation {
    /// Partition of the file group
    pub partition_path: String,
    /// Base instant of the file slice holding the record
    pub base_instant_time: InstantId,
    /// File group holding the record
    pub file_group_id: FileGroupId,
}

/// Key to location entry of the index.
///
/// Sealed on construction: there is no way to change the key or the
/// location once a record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    key: RecordKey,
    location: GlobalLocation,
}

impl IndexRecord {
    /// Build and seal an index record for a key stored in `slice`.
    pub fn sealed(key: RecordKey, slice: &FileSlice) -> Self {
        let location = GlobalLocation {
            partition_path: key.partition_path.clone(),
            base_instant_time: slice.base_instant_time.clone(),
            file_group_id: slice.file_group_id.clone(),
        };
        Self { key, location }
    }

    /// Record key
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Current location of the record
    pub fn location(&self) -> &GlobalLocation {
        &self.location
    }

    /// Always true; an index record cannot exist unsealed
    pub const fn is_sealed(&self) -> bool {
        true
    }
}

/// Position of one worker within the job's parallelism layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerContext {
    worker_index: u32,
    total_workers: u32,
    max_buckets: u32,
}

impl WorkerContext {
    /// Validate and create a worker context
    pub fn new(worker_index: u32, total_workers: u32, max_buckets: u32) -> Result<Self> {
        if max_buckets == 0 || max_buckets > MAX_KEY_GROUPS {
            return Err(TypesError::InvalidKeyGroups(max_buckets));
        }
        if total_workers == 0 || total_workers > max_buckets {
            return Err(TypesError::InvalidParallelism {
                max_buckets,
                total_workers,
            });
        }
        if worker_index >= total_workers {
            return Err(TypesError::WorkerOutOfRange {
                worker_index,
                total_workers,
            });
        }

        Ok(Self {
            worker_index,
            total_workers,
            max_buckets,
        })
    }

    /// Index of this worker
    pub const fn worker_index(&self) -> u32 {
        self.worker_index
    }

    /// Number of workers in the job
    pub const fn total_workers(&self) -> u32 {
        self.total_workers
    }

    /// Number of key groups
    pub const fn max_buckets(&self) -> u32 {
        self.max_buckets
    }

    /// Whether this worker owns the given file group
    pub fn owns(&self, file_group_id: &FileGroupId) -> bool {
        assignment::owns(
            file_group_id.as_str(),
            self.max_buckets,
            self.total_workers,
            self.worker_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice() -> FileSlice {
        FileSlice::new("2024/01/02", FileGroupId::new("fg-1"), InstantId::new("001"))
    }

    #[test]
    fn test_sealed_record_takes_location_from_slice() {
        let record = IndexRecord::sealed(RecordKey::new("id-7", "2024/01/02"), &slice());

        assert!(record.is_sealed());
        assert_eq!(record.key().key, "id-7");
        assert_eq!(record.location().partition_path, "2024/01/02");
        assert_eq!(record.location().base_instant_time.as_str(), "001");
        assert_eq!(record.location().file_group_id.as_str(), "fg-1");
    }

    #[test]
    fn test_empty_slice() {
        assert!(slice().is_empty());
        assert!(!slice().with_log_file(LogFile::new("a.log", 10, 1)).is_empty());
        assert!(!slice().with_base_file(BaseFile::new("a.parquet", 0)).is_empty());
    }

    #[test]
    fn test_instant_order_is_chronological() {
        let earlier = InstantId::new("20240101000000000");
        let later = InstantId::new("20240101000000001");
        assert!(earlier < later);
    }

    #[test]
    fn test_worker_context_validation() {
        assert!(WorkerContext::new(0, 4, 128).is_ok());
        assert_eq!(
            WorkerContext::new(4, 4, 128),
            Err(TypesError::WorkerOutOfRange {
                worker_index: 4,
                total_workers: 4
            })
        );
        assert_eq!(
            WorkerContext::new(0, 8, 4),
            Err(TypesError::InvalidParallelism {
                max_buckets: 4,
                total_workers: 8
            })
        );
        assert_eq!(
            WorkerContext::new(0, 0, 4),
            Err(TypesError::InvalidParallelism {
                max_buckets: 4,
                total_workers: 0
            })
        );
        assert_eq!(
            WorkerContext::new(0, 1, 0),
            Err(TypesError::InvalidKeyGroups(0))
        );
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = FileGroupId::new("fg-9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"fg-9\"");
    }
}
