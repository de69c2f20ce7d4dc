//! Volatile region store.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use super::{RegionIndex, RegionStore, SnapshotCell};
use crate::error::StoreError;
use crate::models::{Coordinate, NewRegion, Region, RegionId};

/// In-process store. Writers are serialized; readers never block on them
/// for longer than an `Arc` swap.
pub struct MemoryRegionStore {
    index: SnapshotCell,
    /// Next id to hand out
    next_id: Mutex<u64>,
}

impl MemoryRegionStore {
    pub fn new() -> Self {
        Self {
            index: SnapshotCell::new(RegionIndex::empty()),
            next_id: Mutex::new(1),
        }
    }

    /// Current snapshot, for callers that run many queries against one view.
    pub fn snapshot(&self) -> Arc<RegionIndex> {
        self.index.load()
    }
}

impl Default for MemoryRegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore for MemoryRegionStore {
    fn insert_batch(&self, regions: Vec<NewRegion>) -> Result<Vec<RegionId>, StoreError> {
        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);

        let added: Vec<Arc<Region>> = regions
            .into_iter()
            .enumerate()
            .map(|(offset, region)| Arc::new(region.into_region(RegionId(*next_id + offset as u64))))
            .collect();
        let ids = added.iter().map(|r| r.id()).collect::<Vec<_>>();

        let next_index = self.index.load().extend(added);
        self.index.publish(next_index);
        *next_id += ids.len() as u64;

        debug!("Committed {} regions in memory", ids.len());
        Ok(ids)
    }

    fn find_containing(&self, point: Coordinate) -> Result<Option<Arc<Region>>, StoreError> {
        Ok(self.index.load().find_containing(point))
    }

    fn all(&self) -> Result<Vec<Arc<Region>>, StoreError> {
        Ok(self.index.load().regions().to_vec())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.index.load().len())
    }
}
