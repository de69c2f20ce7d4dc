//! Region storage and the containment query.
//!
//! Two backends share one contract: [`MemoryRegionStore`] keeps everything in
//! process, [`SledRegionStore`] persists regions on disk and serves queries
//! from an in-memory snapshot rebuilt at open. Names are not required to be
//! unique; two regions may share a name and even a boundary.

mod durable;
mod index;
mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Coordinate, NewRegion, Region, RegionId};

pub use durable::SledRegionStore;
pub use index::{IndexedRegion, RegionIndex, SnapshotCell};
pub use memory::MemoryRegionStore;

/// Durable-or-not collection of regions with a containment predicate.
pub trait RegionStore: Send + Sync {
    /// Store a single region.
    fn insert(&self, region: NewRegion) -> Result<RegionId, StoreError> {
        let ids = self.insert_batch(vec![region])?;
        match ids.as_slice() {
            [id] => Ok(*id),
            _ => Err(StoreError::IdCountMismatch {
                expected: 1,
                returned: ids.len(),
            }),
        }
    }

    /// Store every region or none of them. Returns exactly one id per input
    /// region, in input order. No query sees any of the batch before all of
    /// it is committed.
    fn insert_batch(&self, regions: Vec<NewRegion>) -> Result<Vec<RegionId>, StoreError>;

    /// The earliest-inserted region whose geometry strictly contains the point.
    fn find_containing(&self, point: Coordinate) -> Result<Option<Arc<Region>>, StoreError>;

    /// Every region, in insertion order.
    fn all(&self) -> Result<Vec<Arc<Region>>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;
}

/// Record of a committed ingestion run for one named source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    pub name: String,
    /// xxh64 of the decoded source bytes
    pub checksum: u64,
    pub regions: usize,
    pub batch_id: Uuid,
    pub ingested_at: DateTime<Utc>,
}
