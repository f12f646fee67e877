//! Configuration for the index bootstrap

use crate::{
    BootstrapError, DEFAULT_BARRIER_NAME, METADATA_DIR, PARTITION_METADATA_FILE, Result,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File format of the table's base files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseFileFormat {
    /// Apache Parquet
    #[default]
    Parquet,
    /// Apache ORC
    Orc,
    /// HBase HFile
    HFile,
}

/// Table location and layout, passed through from job setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table root on storage
    pub base_path: PathBuf,

    /// Table name, used in log messages
    pub table_name: String,

    /// Base file format
    pub base_file_format: BaseFileFormat,

    /// Marker file that makes a directory a partition
    pub partition_metadata_file: String,

    /// Metadata directory under the base path, never treated as a partition
    pub metadata_dir: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./table"),
            table_name: String::from("table"),
            base_file_format: BaseFileFormat::default(),
            partition_metadata_file: PARTITION_METADATA_FILE.to_string(),
            metadata_dir: METADATA_DIR.to_string(),
        }
    }
}

impl TableConfig {
    /// Create a table configuration rooted at `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the table name
    #[must_use]
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the base file format
    #[must_use]
    pub const fn with_base_file_format(mut self, format: BaseFileFormat) -> Self {
        self.base_file_format = format;
        self
    }
}

/// Configuration of the per-worker bootstrap pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Partitions whose full path matches this pattern are bootstrapped
    pub partition_regex: String,

    /// Name of the rendezvous barrier shared by all workers of a job run
    pub barrier_name: String,

    /// Longest pause between two barrier registrations
    pub barrier_poll_interval: Duration,

    /// Give up waiting for peers after this long; `None` waits forever
    pub barrier_timeout: Option<Duration>,

    /// Table being indexed
    pub table: TableConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            partition_regex: String::from(".*"),
            barrier_name: DEFAULT_BARRIER_NAME.to_string(),
            barrier_poll_interval: Duration::from_secs(5),
            barrier_timeout: None,
            table: TableConfig::default(),
        }
    }
}

impl BootstrapConfig {
    /// Create a configuration for the given table
    pub fn new(table: TableConfig) -> Self {
        Self {
            table,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BootstrapError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the partition inclusion pattern
    #[must_use]
    pub fn with_partition_regex(mut self, pattern: impl Into<String>) -> Self {
        self.partition_regex = pattern.into();
        self
    }

    /// Set the barrier name
    #[must_use]
    pub fn with_barrier_name(mut self, name: impl Into<String>) -> Self {
        self.barrier_name = name.into();
        self
    }

    /// Set the barrier poll interval
    #[must_use]
    pub const fn with_barrier_poll_interval(mut self, interval: Duration) -> Self {
        self.barrier_poll_interval = interval;
        self
    }

    /// Bound the barrier wait
    #[must_use]
    pub const fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = Some(timeout);
        self
    }

    /// Compile the partition filter.
    ///
    /// The pattern must match the whole partition path, not a substring.
    pub fn partition_matcher(&self) -> Result<Regex> {
        Ok(Regex::new(&format!("^(?:{})$", self.partition_regex))?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.barrier_name.is_empty() {
            return Err(BootstrapError::Config(
                "barrier_name must not be empty".to_string(),
            ));
        }

        if self.barrier_poll_interval.is_zero() {
            return Err(BootstrapError::Config(
                "barrier_poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.barrier_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BootstrapError::Config(
                "barrier_timeout must be greater than 0 when set".to_string(),
            ));
        }

        if self.table.partition_metadata_file.is_empty() {
            return Err(BootstrapError::Config(
                "partition_metadata_file must not be empty".to_string(),
            ));
        }

        self.partition_matcher()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BootstrapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.barrier_poll_interval, Duration::from_secs(5));
        assert!(config.barrier_timeout.is_none());
    }

    #[test]
    fn test_partition_matcher_requires_full_match() {
        let config = BootstrapConfig::default().with_partition_regex("2024/0[1-3]");
        let matcher = config.partition_matcher().unwrap();

        assert!(matcher.is_match("2024/01"));
        assert!(!matcher.is_match("2024/011"));
        assert!(!matcher.is_match("x2024/01"));
    }

    #[test]
    fn test_partition_matcher_alternation_is_grouped() {
        let config = BootstrapConfig::default().with_partition_regex("a|b");
        let matcher = config.partition_matcher().unwrap();

        assert!(matcher.is_match("a"));
        assert!(matcher.is_match("b"));
        assert!(!matcher.is_match("ab"));
    }

    #[test]
    fn test_invalid_config() {
        let config = BootstrapConfig::default().with_barrier_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = BootstrapConfig::default().with_barrier_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = BootstrapConfig::default().with_barrier_name("");
        assert!(config.validate().is_err());

        let config = BootstrapConfig::default().with_partition_regex("(unclosed");
        assert!(matches!(
            config.validate(),
            Err(BootstrapError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = BootstrapConfig::from_json(
            r#"{
                "partition_regex": "2024/.*",
                "barrier_timeout": { "secs": 600, "nanos": 0 },
                "table": { "base_path": "/data/orders", "base_file_format": "orc" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.partition_regex, "2024/.*");
        assert_eq!(config.barrier_name, DEFAULT_BARRIER_NAME);
        assert_eq!(config.barrier_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.table.base_path, PathBuf::from("/data/orders"));
        assert_eq!(config.table.base_file_format, BaseFileFormat::Orc);
        assert_eq!(config.table.partition_metadata_file, PARTITION_METADATA_FILE);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            BootstrapConfig::from_json("not json"),
            Err(BootstrapError::Config(_))
        ));
    }
}
