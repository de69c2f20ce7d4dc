//! Coordinate and address resolution against the region store.

mod geocoder;
mod messages;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ResolveError, StoreError};
use crate::models::{Coordinate, Region};
use crate::store::RegionStore;

pub use geocoder::{Geocoder, HttpGeocoder};
pub use messages::{ResultMessages, RESULT_BAD_ADDRESS, RESULT_NO_RESULTS, RESULT_REGION_PREFIX};

/// Answer for a coordinate.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Arc<Region>),
    NoRegionContains,
}

/// Answer for a free-text address.
#[derive(Debug, Clone)]
pub enum AddressOutcome {
    Found(Arc<Region>),
    NoRegionContains,
    /// The geocoder could not place the address.
    BadAddress,
}

impl From<Resolution> for AddressOutcome {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Found(region) => AddressOutcome::Found(region),
            Resolution::NoRegionContains => AddressOutcome::NoRegionContains,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// What the presentation layer shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: Status,
    pub message: String,
}

/// Stateless composition of the store's containment query with message
/// formatting.
#[derive(Clone)]
pub struct ResolutionService {
    store: Arc<dyn RegionStore>,
    messages: ResultMessages,
}

impl ResolutionService {
    pub fn new(store: Arc<dyn RegionStore>) -> Self {
        Self {
            store,
            messages: ResultMessages::default(),
        }
    }

    pub fn with_messages(mut self, messages: ResultMessages) -> Self {
        self.messages = messages;
        self
    }

    pub fn store(&self) -> &Arc<dyn RegionStore> {
        &self.store
    }

    pub fn resolve(&self, point: Coordinate) -> Result<Resolution, StoreError> {
        let resolution = match self.store.find_containing(point)? {
            Some(region) => Resolution::Found(region),
            None => Resolution::NoRegionContains,
        };
        debug!("Resolved {} -> {:?}", point, resolution_name(&resolution));
        Ok(resolution)
    }

    /// Geocode then resolve. A blank address is a bad address and never
    /// reaches the geocoder.
    pub async fn locate(
        &self,
        geocoder: &dyn Geocoder,
        address: &str,
    ) -> Result<AddressOutcome, ResolveError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(AddressOutcome::BadAddress);
        }

        match geocoder.geocode(address).await? {
            Some(point) => Ok(self.resolve(point)?.into()),
            None => Ok(AddressOutcome::BadAddress),
        }
    }

    /// Full address submission: geocode, resolve, and format the message.
    pub async fn submit_address(
        &self,
        geocoder: &dyn Geocoder,
        address: &str,
    ) -> Result<SubmitResponse, ResolveError> {
        let outcome = self.locate(geocoder, address).await?;
        let response = self.respond(&outcome);
        info!("Address {:?}: {}", address, response.message);
        Ok(response)
    }

    pub fn respond(&self, outcome: &AddressOutcome) -> SubmitResponse {
        match outcome {
            AddressOutcome::Found(region) => SubmitResponse {
                status: Status::Success,
                message: self.messages.found(region),
            },
            AddressOutcome::NoRegionContains => SubmitResponse {
                status: Status::Error,
                message: self.messages.no_results.clone(),
            },
            AddressOutcome::BadAddress => SubmitResponse {
                status: Status::Error,
                message: self.messages.bad_address.clone(),
            },
        }
    }
}

fn resolution_name(resolution: &Resolution) -> &str {
    match resolution {
        Resolution::Found(region) => region.name(),
        Resolution::NoRegionContains => "none",
    }
}
