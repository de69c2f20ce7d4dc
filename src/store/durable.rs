//! On-disk region store backed by sled.
//!
//! Layout:
//! - `regions`: big-endian u64 id -> JSON `{name, city, state, geometry_wkt}`
//! - `sources`: source name -> JSON [`SourceStamp`]
//!
//! Big-endian keys make tree iteration order equal id order, which is also
//! insertion order because ids come from `Db::generate_id`.

use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionResult, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use super::{RegionIndex, RegionStore, SnapshotCell, SourceStamp};
use crate::error::StoreError;
use crate::geometry::{parse_wkt, to_wkt};
use crate::models::{Coordinate, NewRegion, Region, RegionId};

#[derive(Debug, Serialize, Deserialize)]
struct StoredRegion {
    name: String,
    city: String,
    state: String,
    geometry_wkt: String,
}

pub struct SledRegionStore {
    db: Db,
    regions: Tree,
    sources: Tree,
    index: SnapshotCell,
    writer: Mutex<()>,
}

impl SledRegionStore {
    /// Open (or create) a store and load its regions into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let regions = db.open_tree("regions")?;
        let sources = db.open_tree("sources")?;

        let mut loaded = Vec::new();
        for item in regions.iter() {
            let (key, value) = item?;
            loaded.push(Arc::new(decode(&key, &value)?));
        }
        info!(
            "Opened region store at {} with {} regions",
            path.display(),
            loaded.len()
        );

        Ok(Self {
            db,
            regions,
            sources,
            index: SnapshotCell::new(RegionIndex::build(loaded)),
            writer: Mutex::new(()),
        })
    }

    /// Commit a batch of regions and, optionally, the stamp of the source they
    /// came from, in one transaction across both trees.
    pub fn commit_source(
        &self,
        regions: Vec<NewRegion>,
        stamp: Option<&SourceStamp>,
    ) -> Result<Vec<RegionId>, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut encoded = Vec::with_capacity(regions.len());
        for region in &regions {
            let id = self.db.generate_id()?;
            let value = serde_json::to_vec(&StoredRegion {
                name: region.name().to_string(),
                city: region.city().to_string(),
                state: region.state().to_string(),
                geometry_wkt: to_wkt(region.geometry()),
            })?;
            encoded.push((id.to_be_bytes(), value));
        }

        let stamp_value = match stamp {
            Some(s) => Some((s.name.clone(), serde_json::to_vec(s)?)),
            None => None,
        };

        (&self.regions, &self.sources)
            .transaction(|(regions_tx, sources_tx)| -> ConflictableTransactionResult<(), ()> {
                for (key, value) in &encoded {
                    regions_tx.insert(&key[..], value.as_slice())?;
                }
                if let Some((name, value)) = &stamp_value {
                    sources_tx.insert(name.as_bytes(), value.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => StoreError::Storage(e),
                TransactionError::Abort(()) => {
                    StoreError::Storage(sled::Error::Unsupported("transaction aborted".into()))
                }
            })?;
        self.db.flush()?;

        let added: Vec<Arc<Region>> = regions
            .into_iter()
            .zip(&encoded)
            .map(|(region, (key, _))| Arc::new(region.into_region(RegionId(u64::from_be_bytes(*key)))))
            .collect();
        let ids = added.iter().map(|r| r.id()).collect::<Vec<_>>();

        let next_index = self.index.load().extend(added);
        self.index.publish(next_index);

        debug!("Committed {} regions to disk", ids.len());
        Ok(ids)
    }

    /// Stamp recorded for a source by an earlier run, if any.
    pub fn source_stamp(&self, name: &str) -> Result<Option<SourceStamp>, StoreError> {
        match self.sources.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All recorded sources, ordered by name.
    pub fn sources(&self) -> Result<Vec<SourceStamp>, StoreError> {
        let mut stamps = Vec::new();
        for item in self.sources.iter() {
            let (_, value) = item?;
            stamps.push(serde_json::from_slice(&value)?);
        }
        Ok(stamps)
    }

    pub fn snapshot(&self) -> Arc<RegionIndex> {
        self.index.load()
    }
}

impl RegionStore for SledRegionStore {
    fn insert_batch(&self, regions: Vec<NewRegion>) -> Result<Vec<RegionId>, StoreError> {
        self.commit_source(regions, None)
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

fn decode(key: &[u8], value: &[u8]) -> Result<Region, StoreError> {
    let key: [u8; 8] = key.try_into().map_err(|_| StoreError::Corrupt {
        id: 0,
        message: format!("key has {} bytes, expected 8", key.len()),
    })?;
    let id = u64::from_be_bytes(key);

    let stored: StoredRegion = serde_json::from_slice(value)?;
    let geometry = parse_wkt(&stored.geometry_wkt).map_err(|e| StoreError::Corrupt {
        id,
        message: e.to_string(),
    })?;

    Ok(NewRegion::new(stored.name, stored.city, stored.state, geometry)?.into_region(RegionId(id)))
}

#[cfg(test)]
impl SledRegionStore {
    /// Open a store whose previous handle was just dropped. sled releases its
    /// file lock from a background thread, so the lock can briefly outlive
    /// the handle.
    pub(crate) fn reopen<P: AsRef<Path>>(path: P) -> Self {
        let mut attempts = 0;
        loop {
            match Self::open(path.as_ref()) {
                Ok(store) => return store,
                Err(StoreError::Storage(sled::Error::Io(e)))
                    if e.kind() == std::io::ErrorKind::WouldBlock && attempts < 100 =>
                {
                    attempts += 1;
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Err(e) => panic!("failed to reopen {}: {}", path.as_ref().display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn new_region(name: &str, wkt: &str) -> NewRegion {
        NewRegion::new(name, "Baltimore", "MD", parse_wkt(wkt).unwrap()).unwrap()
    }

    fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    const SQUARE: &str = "MULTIPOLYGON(((0 0,0 10,10 10,10 0,0 0)))";
    const INNER: &str = "MULTIPOLYGON(((1 1,1 4,4 4,4 1,1 1)),((30 30,30 31,31 31,31 30,30 30)))";

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SledRegionStore::open(dir.path()).unwrap();
            store.insert(new_region("Canton", SQUARE)).unwrap();
            store.insert(new_region("Fells Point", INNER)).unwrap();
        }

        let store = SledRegionStore::reopen(dir.path());
        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name(), "Canton");
        assert_eq!(all[1].name(), "Fells Point");
        assert_eq!(all[1].geometry().0.len(), 2);
        assert!(all[0].id() < all[1].id());

        // Overlap: Canton was inserted first.
        assert_eq!(
            store.find_containing(pt(2.0, 2.0)).unwrap().unwrap().name(),
            "Canton"
        );
        assert_eq!(
            store.find_containing(pt(30.5, 30.5)).unwrap().unwrap().name(),
            "Fells Point"
        );
        assert!(store.find_containing(pt(50.0, 50.0)).unwrap().is_none());
    }

    #[test]
    fn test_ids_keep_growing_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let store = SledRegionStore::open(dir.path()).unwrap();
            store.insert(new_region("Canton", SQUARE)).unwrap()
        };
        let store = SledRegionStore::reopen(dir.path());
        let second = store.insert(new_region("Canton", SQUARE)).unwrap();
        assert!(second > first);
        assert_eq!(
            store.find_containing(pt(5.0, 5.0)).unwrap().unwrap().id(),
            first
        );
    }

    #[test]
    fn test_source_stamp_committed_with_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledRegionStore::open(dir.path()).unwrap();
        assert!(store.source_stamp("baltimore").unwrap().is_none());

        let stamp = SourceStamp {
            name: "baltimore".to_string(),
            checksum: 42,
            regions: 2,
            batch_id: Uuid::new_v4(),
            ingested_at: Utc::now(),
        };
        let ids = store
            .commit_source(
                vec![new_region("Canton", SQUARE), new_region("Fells Point", INNER)],
                Some(&stamp),
            )
            .unwrap();
        assert_eq!(ids.len(), 2);

        assert_eq!(store.source_stamp("baltimore").unwrap(), Some(stamp.clone()));
        assert_eq!(store.sources().unwrap(), vec![stamp]);
    }
}
