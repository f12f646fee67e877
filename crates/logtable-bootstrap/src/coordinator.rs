//! Per-worker bootstrap state machine
//!
//! ```text
//! NotStarted ──first element──▶ Loading ──▶ Barrier ──▶ Bootstrapped
//!                                  │           │
//!                                  └───error───┴──▶ Failed
//! ```
//!
//! The first element a worker receives triggers the load of every file
//! group routed to the worker, then the rendezvous barrier. The triggering
//! element is forwarded only after both complete; every later element is
//! forwarded immediately. The pass runs once per worker instance.

use crate::barrier::{RendezvousBarrier, RendezvousRegistry};
use crate::config::BootstrapConfig;
use crate::emitter::{BootstrapOutput, Collector, IndexEmitter};
use crate::extractor::KeyExtractor;
use crate::resolver::FileSliceResolver;
use crate::table::{TableContext, TableSchema};
use crate::{BootstrapError, Result};
use logtable_types::{InstantId, WorkerContext};
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a worker is in its one-shot bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// No element seen yet
    NotStarted,
    /// Emitting index records for owned file groups
    Loading,
    /// Waiting for the other workers
    Barrier,
    /// Index complete cluster-wide; elements pass through
    Bootstrapped,
    /// Loading or the barrier failed; the worker must be restarted
    Failed,
}

/// Counters of one bootstrap pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapStats {
    /// Partitions matching the filter
    pub partitions_loaded: usize,
    /// Partitions rejected by the filter
    pub partitions_filtered: usize,
    /// File slices read by this worker
    pub slices_loaded: usize,
    /// File slices routed to other workers
    pub slices_not_owned: usize,
    /// Index records emitted
    pub records_emitted: u64,
    /// Time spent loading, barrier excluded
    pub load_duration: Duration,
    /// Time spent at the barrier
    pub barrier_duration: Duration,
}

/// Bootstrap operator of one worker
pub struct IndexBootstrap {
    config: BootstrapConfig,
    worker: WorkerContext,
    table: TableContext,
    partition_filter: Regex,
    resolver: FileSliceResolver,
    extractor: KeyExtractor,
    emitter: IndexEmitter,
    barrier: RendezvousBarrier,
    phase: BootstrapPhase,
    stats: BootstrapStats,
}

impl IndexBootstrap {
    /// Create the operator for one worker
    pub fn new(
        config: BootstrapConfig,
        worker: WorkerContext,
        table: TableContext,
        registry: Arc<dyn RendezvousRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let partition_filter = config.partition_matcher()?;

        let resolver = FileSliceResolver::new(table.timeline.clone());
        let extractor = KeyExtractor::new(table.base_reader.clone(), table.log_reader.clone());
        let barrier = RendezvousBarrier::new(
            registry,
            config.barrier_name.clone(),
            config.barrier_poll_interval,
        )
        .with_timeout(config.barrier_timeout);

        Ok(Self {
            config,
            worker,
            table,
            partition_filter,
            resolver,
            extractor,
            emitter: IndexEmitter::new(),
            barrier,
            phase: BootstrapPhase::NotStarted,
            stats: BootstrapStats::default(),
        })
    }

    /// Current phase
    pub const fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// Whether the pass completed and elements flow through
    pub fn is_bootstrapped(&self) -> bool {
        self.phase == BootstrapPhase::Bootstrapped
    }

    /// Counters of the bootstrap pass
    pub const fn stats(&self) -> &BootstrapStats {
        &self.stats
    }

    /// Worker this operator runs as
    pub const fn worker(&self) -> &WorkerContext {
        &self.worker
    }

    /// Handle one input element.
    ///
    /// On the first element the full bootstrap runs before the element is
    /// forwarded. Once a pass has failed, every element is rejected.
    pub async fn process_element<I, C>(&mut self, element: I, out: &mut C) -> Result<()>
    where
        I: Send + 'static,
        C: Collector<BootstrapOutput<I>> + ?Sized,
    {
        match self.phase {
            BootstrapPhase::Bootstrapped => {}
            BootstrapPhase::NotStarted => {
                if let Err(e) = self.bootstrap(out).await {
                    self.phase = BootstrapPhase::Failed;
                    return Err(e);
                }
            }
            // A pass left in Loading or Barrier was dropped mid-flight
            BootstrapPhase::Loading | BootstrapPhase::Barrier | BootstrapPhase::Failed => {
                self.phase = BootstrapPhase::Failed;
                return Err(BootstrapError::Incomplete(self.worker.worker_index()));
            }
        }

        out.collect(BootstrapOutput::Element(element)).await
    }

    async fn bootstrap<I, C>(&mut self, out: &mut C) -> Result<()>
    where
        I: Send + 'static,
        C: Collector<BootstrapOutput<I>> + ?Sized,
    {
        let worker_index = self.worker.worker_index();
        info!(
            "Start loading records in table {} ({}) into the index state, worker = {}",
            self.table.storage.base_path(),
            self.config.table.table_name,
            worker_index
        );

        self.phase = BootstrapPhase::Loading;
        let started = Instant::now();
        self.load_index(out).await?;
        self.stats.load_duration = started.elapsed();
        self.stats.records_emitted = self.emitter.emitted();

        self.phase = BootstrapPhase::Barrier;
        let started = Instant::now();
        self.barrier
            .wait_for_all(worker_index, self.worker.total_workers())
            .await?;
        self.stats.barrier_duration = started.elapsed();

        self.phase = BootstrapPhase::Bootstrapped;
        info!(
            "Finish sending {} index records, worker = {}",
            self.stats.records_emitted, worker_index
        );
        Ok(())
    }

    async fn load_index<I, C>(&mut self, out: &mut C) -> Result<()>
    where
        I: Send + 'static,
        C: Collector<BootstrapOutput<I>> + ?Sized,
    {
        // A table without a completed instant may not exist on storage yet
        let Some(instant) = self.resolver.latest_instant().await? else {
            info!(
                "No completed instant in table {}, nothing to load",
                self.table.storage.base_path()
            );
            return Ok(());
        };
        let schema = self.table.schema.current_table_schema().await?;
        let partitions = self.table.storage.list_partition_paths().await?;

        for partition in partitions {
            if !self.partition_filter.is_match(&partition) {
                debug!("Partition {:?} excluded by filter", partition);
                self.stats.partitions_filtered += 1;
                continue;
            }
            self.load_partition(&partition, &instant, &schema, out)
                .await?;
            self.stats.partitions_loaded += 1;
        }

        Ok(())
    }

    async fn load_partition<I, C>(
        &mut self,
        partition_path: &str,
        instant: &InstantId,
        schema: &TableSchema,
        out: &mut C,
    ) -> Result<()>
    where
        I: Send + 'static,
        C: Collector<BootstrapOutput<I>> + ?Sized,
    {
        let started = Instant::now();
        let emitted_before = self.emitter.emitted();

        for slice in self.resolver.resolve_slices(partition_path, instant).await? {
            if !self.worker.owns(&slice.file_group_id) {
                self.stats.slices_not_owned += 1;
                continue;
            }

            debug!(
                "Load records from file group {} (base instant {}, {} log files)",
                slice.file_group_id,
                slice.base_instant_time,
                slice.log_files.len()
            );
            let keys = self.extractor.extract_keys(&slice, schema, instant).await?;
            for key in keys {
                self.emitter.emit(key, &slice, out).await?;
            }
            self.stats.slices_loaded += 1;
        }

        info!(
            "Worker {} finished loading the index under partition {:?}: {} records in {} ms",
            self.worker.worker_index(),
            partition_path,
            self.emitter.emitted() - emitted_before,
            started.elapsed().as_millis()
        );
        Ok(())
    }
}
