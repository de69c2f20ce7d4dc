//! Spatial index for fast region lookups.

use rstar::{RTree, RTreeObject, AABB};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::models::{Coordinate, Region};

/// Wrapper for R-tree indexing of regions
#[derive(Clone)]
pub struct IndexedRegion {
    pub region: Arc<Region>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedRegion {
    pub fn new(region: Arc<Region>) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = region.bbox()?;
        Some(Self {
            region,
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Immutable view of every committed region.
///
/// The R-tree only narrows candidates by envelope; the exact ray cast
/// decides, and among several hits the lowest id (earliest insert) wins.
pub struct RegionIndex {
    tree: RTree<IndexedRegion>,
    /// Insertion order
    ordered: Vec<Arc<Region>>,
}

impl RegionIndex {
    /// Build an index from regions already sorted by id.
    pub fn build(ordered: Vec<Arc<Region>>) -> Self {
        let indexed: Vec<IndexedRegion> = ordered
            .iter()
            .cloned()
            .filter_map(IndexedRegion::new)
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Region index built with {} entries", tree.size());

        Self { tree, ordered }
    }

    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// New index holding this one's regions followed by `added`.
    pub fn extend(&self, added: impl IntoIterator<Item = Arc<Region>>) -> Self {
        let mut ordered = self.ordered.clone();
        ordered.extend(added);
        Self::build(ordered)
    }

    /// First-inserted region whose geometry contains the point.
    pub fn find_containing(&self, point: Coordinate) -> Option<Arc<Region>> {
        let query_envelope = AABB::from_point([point.longitude(), point.latitude()]);

        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ir| ir.region.contains(point))
            .min_by_key(|ir| ir.region.id())
            .map(|ir| Arc::clone(&ir.region))
    }

    pub fn regions(&self) -> &[Arc<Region>] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Holder of the active index. Readers clone the `Arc` and keep querying the
/// snapshot they got; writers swap in a fully built replacement.
pub struct SnapshotCell {
    current: RwLock<Arc<RegionIndex>>,
}

impl SnapshotCell {
    pub fn new(index: RegionIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn load(&self) -> Arc<RegionIndex> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn publish(&self, index: RegionIndex) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(index);
    }
}
