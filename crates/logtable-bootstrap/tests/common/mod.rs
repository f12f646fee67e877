//! In-memory table used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use logtable_bootstrap::{
    BaseFileKeyReader, BootstrapError, LogBlock, LogBlockReader, Result, SchemaResolver,
    TableContext, TableSchema, TableStorage, Timeline,
};
use logtable_types::{BaseFile, FileGroupId, FileSlice, InstantId, LogFile, RecordKey};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Table whose files live in maps
#[derive(Default)]
pub struct MemoryTable {
    pub latest: Option<InstantId>,
    pub partitions: BTreeMap<String, Vec<FileSlice>>,
    pub base_files: HashMap<String, Vec<RecordKey>>,
    pub log_files: HashMap<String, Vec<LogBlock>>,
}

impl MemoryTable {
    pub fn new(latest: &str) -> Self {
        Self {
            latest: Some(InstantId::new(latest)),
            ..Default::default()
        }
    }

    /// Add a file group with a base file holding `keys`
    pub fn add_base_group(&mut self, partition: &str, file_group: &str, keys: &[&str]) {
        let path = format!("{partition}/{file_group}_001.parquet");
        self.base_files.insert(
            path.clone(),
            keys.iter().map(|k| RecordKey::new(*k, partition)).collect(),
        );
        let slice = FileSlice::new(partition, FileGroupId::new(file_group), InstantId::new("001"))
            .with_base_file(BaseFile::new(path, 4096));
        self.partitions
            .entry(partition.to_string())
            .or_default()
            .push(slice);
    }

    /// Add a log file to an existing file group
    pub fn add_log(
        &mut self,
        partition: &str,
        file_group: &str,
        version: u32,
        blocks: Vec<LogBlock>,
    ) {
        let path = format!("{partition}/.{file_group}_001.log.{version}");
        self.log_files.insert(path.clone(), blocks);
        if let Some(slice) = self
            .partitions
            .get_mut(partition)
            .and_then(|slices| {
                slices
                    .iter_mut()
                    .find(|s| s.file_group_id.as_str() == file_group)
            })
        {
            slice.log_files.push(LogFile::new(path, 512, version));
        }
    }

    /// Table with `groups` file groups of `keys_per_group` keys spread over partitions
    pub fn generated(partitions: &[&str], groups: usize, keys_per_group: usize) -> Self {
        let mut table = Self::new("001");
        for group in 0..groups {
            let partition = partitions[group % partitions.len()];
            let file_group = format!("fg-{group:04}");
            let keys: Vec<String> = (0..keys_per_group)
                .map(|k| format!("{file_group}-key-{k}"))
                .collect();
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            table.add_base_group(partition, &file_group, &keys);
        }
        table
    }

    pub fn into_context(self) -> TableContext {
        let table = Arc::new(self);
        TableContext {
            storage: table.clone(),
            timeline: table.clone(),
            schema: table.clone(),
            base_reader: table.clone(),
            log_reader: table,
        }
    }
}

#[async_trait]
impl TableStorage for MemoryTable {
    fn base_path(&self) -> &str {
        "memory://table"
    }

    async fn list_partition_paths(&self) -> Result<Vec<String>> {
        Ok(self.partitions.keys().cloned().collect())
    }
}

#[async_trait]
impl Timeline for MemoryTable {
    async fn latest_completed_instant(&self) -> Result<Option<InstantId>> {
        Ok(self.latest.clone())
    }

    async fn slices_as_of(
        &self,
        partition_path: &str,
        _instant: &InstantId,
    ) -> Result<Vec<FileSlice>> {
        Ok(self
            .partitions
            .get(partition_path)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SchemaResolver for MemoryTable {
    async fn current_table_schema(&self) -> Result<TableSchema> {
        Ok(TableSchema::new(
            serde_json::json!({"type": "record", "name": "order"}),
            vec!["order_id".to_string()],
        ))
    }
}

#[async_trait]
impl BaseFileKeyReader for MemoryTable {
    async fn keys_of(&self, path: &str) -> Result<Vec<RecordKey>> {
        self.base_files
            .get(path)
            .cloned()
            .ok_or_else(|| BootstrapError::Decode(format!("missing base file {path}")))
    }
}

#[async_trait]
impl LogBlockReader for MemoryTable {
    async fn read_blocks(&self, path: &str, _schema: &TableSchema) -> Result<Vec<LogBlock>> {
        self.log_files
            .get(path)
            .cloned()
            .ok_or_else(|| BootstrapError::Decode(format!("missing log file {path}")))
    }
}
