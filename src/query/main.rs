//! Query server for region lookups.
//!
//! Provides an HTTP API that places a coordinate or a free-text address in
//! the named region containing it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hoodmap::error::ResolveError;
use hoodmap::models::RegionSummary;
use hoodmap::resolve::{
    HttpGeocoder, Resolution, ResolutionService, ResultMessages, SubmitResponse,
};
use hoodmap::{Coordinate, RegionStore, SledRegionStore};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Region lookup server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Region store directory written by `ingest`
    #[arg(long, default_value = "data/regions.db")]
    db: PathBuf,

    /// Base URL of the forward geocoding service
    #[arg(long, default_value = "http://localhost:4000")]
    geocoder_url: String,

    /// TOML file overriding the user-facing result messages
    #[arg(long)]
    messages: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    service: ResolutionService,
    geocoder: HttpGeocoder,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Hoodmap Query Server");

    let store = SledRegionStore::open(&args.db)
        .with_context(|| format!("Failed to open region store at {}", args.db.display()))?;
    info!("Loaded {} regions from {}", store.len()?, args.db.display());

    let messages = match &args.messages {
        Some(path) => load_messages(path)?,
        None => ResultMessages::default(),
    };

    info!("Using geocoder at {}", args.geocoder_url);
    let geocoder = HttpGeocoder::new(&args.geocoder_url)?;

    let state = Arc::new(AppState {
        service: ResolutionService::new(Arc::new(store)).with_messages(messages),
        geocoder,
    });

    let app = router(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/submit", post(submit_handler))
        .route("/v1/resolve", get(resolve_handler))
        .route("/v1/regions", get(regions_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn load_messages(path: &std::path::Path) -> Result<ResultMessages> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse messages file")
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    regions: usize,
}

/// Health check endpoint
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let regions = state
        .service
        .store()
        .len()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        regions,
    }))
}

#[derive(Deserialize)]
struct SubmitRequest {
    address: String,
}

/// Address submission: always answers with a `{status, message}` body unless
/// the geocoder or the store itself failed.
async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    match state
        .service
        .submit_address(&state.geocoder, &request.address)
        .await
    {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Submit failed for {:?}: {}", request.address, e);
            let status = match e {
                ResolveError::Geocode(_) => StatusCode::BAD_GATEWAY,
                ResolveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, e.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct ResolveQueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct ResolveResponse {
    region: Option<RegionSummary>,
}

/// Reverse lookup of a raw coordinate
async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQueryParams>,
) -> Result<Json<ResolveResponse>, (StatusCode, String)> {
    let point = Coordinate::new(params.lat, params.lon)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let region = match state.service.resolve(point) {
        Ok(Resolution::Found(region)) => Some(region.summary()),
        Ok(Resolution::NoRegionContains) => None,
        Err(e) => {
            error!("Resolve failed for {}: {}", point, e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    Ok(Json(ResolveResponse { region }))
}

/// Every region in insertion order
async fn regions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RegionSummary>>, (StatusCode, String)> {
    let regions = state
        .service
        .store()
        .all()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(regions.iter().map(|r| r.summary()).collect()))
}
