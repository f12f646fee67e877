//! Live file slice resolution
//!
//! Asks the timeline for the latest slice of every file group and drops
//! what a crashed writer left behind: zero-size base files and zero-size
//! log files are incomplete writes and contribute nothing.

use crate::Result;
use crate::table::Timeline;
use logtable_types::{FileSlice, InstantId};
use std::sync::Arc;
use tracing::debug;

/// Resolves the file slices of a partition as of a snapshot instant
#[derive(Clone)]
pub struct FileSliceResolver {
    timeline: Arc<dyn Timeline>,
}

impl FileSliceResolver {
    /// Create a resolver over the table timeline
    pub fn new(timeline: Arc<dyn Timeline>) -> Self {
        Self { timeline }
    }

    /// Latest completed instant, `None` when the table has no commits yet
    pub async fn latest_instant(&self) -> Result<Option<InstantId>> {
        self.timeline.latest_completed_instant().await
    }

    /// Live file slices of `partition_path` as of `instant`.
    ///
    /// Log files come back ordered by version. Slices left with neither a
    /// base file nor a log file are dropped.
    pub async fn resolve_slices(
        &self,
        partition_path: &str,
        instant: &InstantId,
    ) -> Result<Vec<FileSlice>> {
        let slices = self.timeline.slices_as_of(partition_path, instant).await?;
        let total = slices.len();

        let live: Vec<_> = slices.into_iter().filter_map(prune_crashed_files).collect();

        debug!(
            "Resolved {} live file slices of {} in partition {:?} as of {}",
            live.len(),
            total,
            partition_path,
            instant
        );
        Ok(live)
    }
}

fn prune_crashed_files(mut slice: FileSlice) -> Option<FileSlice> {
    if slice.base_file.as_ref().is_some_and(|base| base.size_bytes == 0) {
        debug!(
            "Skipping zero-size base file of file group {}",
            slice.file_group_id
        );
        slice.base_file = None;
    }

    let before = slice.log_files.len();
    slice.log_files.retain(|log| log.size_bytes > 0);
    if slice.log_files.len() != before {
        debug!(
            "Skipping {} zero-size log files of file group {}",
            before - slice.log_files.len(),
            slice.file_group_id
        );
    }
    slice.log_files.sort_by_key(|log| log.version);

    if slice.is_empty() { None } else { Some(slice) }
}
