//! Core data models for region lookup.

pub mod coordinate;
pub mod region;

pub use coordinate::Coordinate;
pub use region::{NewRegion, Region, RegionId, RegionSummary};
