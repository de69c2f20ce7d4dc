//! Hoodmap - resolves a coordinate or address to the named region that contains it.
//!
//! This library provides shared types and modules for the ingest and query binaries.

pub mod error;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod resolve;
pub mod store;

pub use models::{Coordinate, NewRegion, Region, RegionId};
pub use store::{MemoryRegionStore, RegionStore, SledRegionStore};
