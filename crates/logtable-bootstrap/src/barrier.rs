//! Rendezvous barrier between bootstrap workers
//!
//! Downstream keyed index state is treated as complete as soon as a real
//! element shows up, so no worker may forward traffic before every worker
//! has emitted its share of the index. Each worker registers its index in a
//! registry shared by name across the job run and waits until the registry
//! counts every worker.
//!
//! Registration is an idempotent set union: re-registering a worker does
//! not change the count. Registry errors are logged and retried.

use crate::{BootstrapError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Cluster-wide registry of workers that finished bootstrapping
#[async_trait]
pub trait RendezvousRegistry: Send + Sync {
    /// Add `worker_index` to the barrier and return the distinct count
    async fn register(&self, barrier: &str, worker_index: u32) -> Result<usize>;

    /// Wait up to `max_wait` for the count to move away from `seen`.
    ///
    /// The default sleeps the full interval; registries that can observe
    /// changes should return as soon as one happens.
    async fn await_progress(&self, barrier: &str, seen: usize, max_wait: Duration) {
        let _ = (barrier, seen);
        tokio::time::sleep(max_wait).await;
    }
}

struct BarrierSlot {
    workers: Mutex<BTreeSet<u32>>,
    count: watch::Sender<usize>,
}

impl BarrierSlot {
    fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            workers: Mutex::new(BTreeSet::new()),
            count,
        }
    }
}

/// Registry shared by all workers running in one process.
///
/// Clones share state. Waiters are woken on every registration instead of
/// sleeping out the poll interval.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    barriers: Arc<DashMap<String, Arc<BarrierSlot>>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, barrier: &str) -> Arc<BarrierSlot> {
        self.barriers
            .entry(barrier.to_string())
            .or_insert_with(|| Arc::new(BarrierSlot::new()))
            .clone()
    }

    /// Workers registered on `barrier`
    pub fn registered(&self, barrier: &str) -> usize {
        self.barriers
            .get(barrier)
            .map_or(0, |slot| slot.workers.lock().len())
    }

    /// Forget a barrier between job runs
    pub fn clear(&self, barrier: &str) {
        self.barriers.remove(barrier);
    }
}

#[async_trait]
impl RendezvousRegistry for InMemoryRegistry {
    async fn register(&self, barrier: &str, worker_index: u32) -> Result<usize> {
        let slot = self.slot(barrier);
        let count = {
            let mut workers = slot.workers.lock();
            workers.insert(worker_index);
            workers.len()
        };
        slot.count.send_replace(count);
        Ok(count)
    }

    async fn await_progress(&self, barrier: &str, seen: usize, max_wait: Duration) {
        // Holding the slot keeps the sender alive if the barrier is cleared meanwhile
        let slot = self.slot(barrier);
        let mut rx = slot.count.subscribe();
        let _ = tokio::time::timeout(max_wait, rx.wait_for(|count| *count != seen)).await;
    }
}

/// Blocks a worker until every worker of the job has registered
#[derive(Clone)]
pub struct RendezvousBarrier {
    registry: Arc<dyn RendezvousRegistry>,
    name: String,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl RendezvousBarrier {
    /// Create a barrier waiting forever for its peers
    pub fn new(
        registry: Arc<dyn RendezvousRegistry>,
        name: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            name: name.into(),
            poll_interval,
            timeout: None,
        }
    }

    /// Fail with [`BootstrapError::BarrierTimeout`] after `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Barrier name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record that `worker_index` finished and return the registered count
    pub async fn register_completion(&self, worker_index: u32) -> Result<usize> {
        self.registry.register(&self.name, worker_index).await
    }

    /// Register `worker_index` and wait until `total_workers` have registered.
    ///
    /// Without a timeout this waits indefinitely; a peer that never reports
    /// stalls every worker.
    pub async fn wait_for_all(&self, worker_index: u32, total_workers: u32) -> Result<()> {
        let expected = total_workers as usize;
        let started = Instant::now();
        let mut seen = 0;

        loop {
            let registered = match self.register_completion(worker_index).await {
                Ok(count) => {
                    seen = count;
                    true
                }
                Err(e) => {
                    warn!(
                        "Update global bootstrap registry {} failed, worker = {}: {}",
                        self.name, worker_index, e
                    );
                    false
                }
            };

            if registered && seen >= expected {
                if seen > expected {
                    warn!(
                        "Barrier {} counts {} workers, expected {}",
                        self.name, seen, expected
                    );
                }
                info!(
                    "All {} bootstrap workers ready on barrier {}, worker = {}",
                    expected, self.name, worker_index
                );
                return Ok(());
            }

            let mut wait = self.poll_interval;
            if let Some(timeout) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(BootstrapError::BarrierTimeout {
                        barrier: self.name.clone(),
                        registered: seen,
                        expected,
                        waited_ms: elapsed.as_millis(),
                    });
                }
                wait = wait.min(timeout - elapsed);
            }

            if registered {
                debug!(
                    "Waiting for other bootstrap workers to complete ({}/{}), worker = {}",
                    seen, expected, worker_index
                );
                self.registry.await_progress(&self.name, seen, wait).await;
            } else {
                tokio::time::sleep(wait).await;
            }
        }
    }
}
