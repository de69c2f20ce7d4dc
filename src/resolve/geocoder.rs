//! Free-text address to coordinate, via an external service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::GeocodeError;
use crate::models::Coordinate;

/// Opaque geocoding collaborator. `Ok(None)` means the service answered but
/// found nothing; transport failures are errors and are not retried here.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

/// Client for a Pelias-style forward search API (`/v1/search?text=..`)
/// returning GeoJSON-like features.
#[derive(Clone)]
pub struct HttpGeocoder {
    client: reqwest::Client,
    search_url: Url,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    features: Vec<SearchFeature>,
}

#[derive(Debug, Deserialize)]
struct SearchFeature {
    geometry: FeatureGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    /// [lon, lat]
    coordinates: [f64; 2],
}

impl HttpGeocoder {
    pub fn new(base_url: &str) -> Result<Self, GeocodeError> {
        let mut base = Url::parse(base_url)?;
        // `join` replaces the last segment unless the path ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base.join("v1/search")?;
        Ok(Self {
            client: reqwest::Client::new(),
            search_url,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("text", address)
            .append_pair("size", "1");

        let response: SearchResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(feature) = response.features.first() else {
            debug!("Geocoder found nothing for {:?}", address);
            return Ok(None);
        };

        let [lon, lat] = feature.geometry.coordinates;
        Ok(Some(Coordinate::new(lat, lon)?))
    }
}
