//! Index record emission
//!
//! Records are pushed downstream one at a time as soon as they are built,
//! so memory use does not grow with the size of a slice.

use crate::{BootstrapError, Result};
use async_trait::async_trait;
use logtable_types::{FileSlice, IndexRecord, RecordKey};
use tokio::sync::mpsc;

/// Element produced by the bootstrap operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutput<I> {
    /// Index entry loaded from the table
    Index(IndexRecord),
    /// Input element forwarded unchanged
    Element(I),
}

impl<I> BootstrapOutput<I> {
    /// The index record, if this is one
    pub const fn as_index(&self) -> Option<&IndexRecord> {
        match self {
            Self::Index(record) => Some(record),
            Self::Element(_) => None,
        }
    }

    /// Whether this is a forwarded input element
    pub const fn is_element(&self) -> bool {
        matches!(self, Self::Element(_))
    }
}

/// Downstream sink of an operator
#[async_trait]
pub trait Collector<T: Send + 'static>: Send {
    /// Push one item downstream
    async fn collect(&mut self, item: T) -> Result<()>;
}

#[async_trait]
impl<T: Send + 'static> Collector<T> for mpsc::Sender<T> {
    async fn collect(&mut self, item: T) -> Result<()> {
        self.send(item)
            .await
            .map_err(|_| BootstrapError::OutputClosed)
    }
}

#[async_trait]
impl<T: Send + 'static> Collector<T> for Vec<T> {
    async fn collect(&mut self, item: T) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

/// Builds sealed index records and forwards them
#[derive(Debug, Default)]
pub struct IndexEmitter {
    emitted: u64,
}

impl IndexEmitter {
    /// Create an emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Sealed record locating `key` in `slice`
    pub fn record_for(key: RecordKey, slice: &FileSlice) -> IndexRecord {
        IndexRecord::sealed(key, slice)
    }

    /// Build the record for `key` and push it to `out` immediately
    pub async fn emit<I, C>(&mut self, key: RecordKey, slice: &FileSlice, out: &mut C) -> Result<()>
    where
        I: Send + 'static,
        C: Collector<BootstrapOutput<I>> + ?Sized,
    {
        out.collect(BootstrapOutput::Index(Self::record_for(key, slice)))
            .await?;
        self.emitted += 1;
        Ok(())
    }

    /// Number of records emitted so far
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }
}
