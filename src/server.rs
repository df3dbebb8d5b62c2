use crate::charts::{charts_report, ChartsReport};
use crate::config::{AppConfig, DefaultsConfig};
use crate::data::{Dataset, FilterOptions};
use crate::error::DatasetError;
use crate::map::{layer_collection, map_layer, Bounds, ColorScale, LocalityDetails, LocalityIndex};
use crate::processing::filter_features;
use crate::request::DashboardParams;
use crate::stats::{stats_report, StatsReport};
use crate::types::{FeatureRecord, FilterConfig, Metric, MetricSelection, ParseSelectionError};
use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub struct LoadedData {
    pub dataset: Dataset,
    pub index: LocalityIndex,
    pub options: FilterOptions,
}

impl LoadedData {
    pub fn new(dataset: Dataset) -> Self {
        info!("Building spatial index for API...");
        let index = LocalityIndex::build(&dataset.records);
        let options = FilterOptions::from_records(&dataset.records);
        Self {
            dataset,
            index,
            options,
        }
    }

    fn view(&self, filter: &FilterConfig) -> Vec<&FeatureRecord> {
        filter_features(&self.dataset.records, filter)
    }
}

pub struct AppState {
    /// A failed load is terminal: every API call reports it.
    pub data: Result<LoadedData, ApiError>,
    pub defaults: DefaultsConfig,
}

impl AppState {
    pub fn new(loaded: Result<Dataset, DatasetError>, defaults: DefaultsConfig) -> Self {
        let data = loaded.map(LoadedData::new).map_err(|e| {
            error!("Error loading GeoJSON data: {}", e);
            ApiError::from(&e)
        });
        Self { data, defaults }
    }

    fn data(&self) -> Result<&LoadedData, ApiError> {
        self.data.as_ref().map_err(Clone::clone)
    }

    fn resolve(&self, params: &DashboardParams) -> Result<(FilterConfig, MetricSelection), ApiError> {
        Ok(params.resolve(&self.defaults)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<&DatasetError> for ApiError {
    fn from(err: &DatasetError) -> Self {
        let (status, message) = match err {
            DatasetError::NotFound(_) => (StatusCode::NOT_FOUND, "GeoJSON file not found"),
            DatasetError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "Invalid GeoJSON format"),
            DatasetError::Io { .. } | DatasetError::Json(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load GeoJSON data")
            }
        };
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl From<ParseSelectionError> for ApiError {
    fn from(err: ParseSelectionError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Serialize)]
pub struct MetricInfo {
    pub key: Metric,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct FiltersResponse {
    pub options: FilterOptions,
    pub metrics: Vec<MetricInfo>,
    pub default_year: i32,
    pub default_theme: String,
    pub default_metric: Metric,
}

#[derive(Serialize)]
pub struct MapResponse {
    pub count: usize,
    pub scale: Option<ColorScale>,
    pub bounds: Option<Bounds>,
    pub collection: FeatureCollection,
}

#[derive(Deserialize)]
pub struct PointParams {
    pub lat: f64,
    pub lon: f64,
}

pub fn build_router(state: Arc<AppState>, static_dir: Option<&std::path::Path>) -> Router {
    let mut app = Router::new()
        .route("/api/geojson-data", get(geojson_handler))
        .route("/api/filters", get(filters_handler))
        .route("/api/map", get(map_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/charts", get(charts_handler))
        .route("/api/query", get(query_handler));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn start_server(config: AppConfig, loaded: Result<Dataset, DatasetError>) -> Result<()> {
    let state = Arc::new(AppState::new(loaded, config.defaults.clone()));

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{}", addr);

    let app = build_router(state, config.server.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn geojson_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeatureCollection>, ApiError> {
    Ok(Json(state.data()?.dataset.collection.clone()))
}

pub async fn filters_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let data = state.data()?;
    Ok(Json(FiltersResponse {
        options: data.options.clone(),
        metrics: Metric::ALL
            .into_iter()
            .map(|key| MetricInfo {
                key,
                label: key.label(),
            })
            .collect(),
        default_year: state.defaults.year,
        default_theme: state.defaults.theme.clone(),
        default_metric: state.defaults.metric,
    }))
}

pub async fn map_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Result<Json<MapResponse>, ApiError> {
    let Query(params) = params?;
    let data = state.data()?;
    let (filter, selection) = state.resolve(&params)?;
    let filtered = data.view(&filter);

    let layer = map_layer(&filtered, &selection);
    let collection = layer_collection(&filtered, &layer);

    Ok(Json(MapResponse {
        count: filtered.len(),
        scale: layer.scale,
        bounds: layer.bounds,
        collection,
    }))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Result<Json<StatsReport>, ApiError> {
    let Query(params) = params?;
    let data = state.data()?;
    let (filter, selection) = state.resolve(&params)?;
    let filtered = data.view(&filter);
    let all: Vec<&FeatureRecord> = data.dataset.records.iter().collect();

    Ok(Json(stats_report(&filtered, &all, &selection)))
}

pub async fn charts_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Result<Json<ChartsReport>, ApiError> {
    let Query(params) = params?;
    let data = state.data()?;
    let (filter, selection) = state.resolve(&params)?;
    let filtered = data.view(&filter);
    let history: Vec<&FeatureRecord> = data
        .dataset
        .records
        .iter()
        .filter(|r| r.theme == filter.theme)
        .collect();

    Ok(Json(charts_report(&filtered, &history, &selection)))
}

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    point: Result<Query<PointParams>, QueryRejection>,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Result<Json<Option<LocalityDetails>>, ApiError> {
    let Query(point) = point?;
    let Query(params) = params?;
    let data = state.data()?;
    let (filter, selection) = state.resolve(&params)?;

    let found = data
        .index
        .locate(&data.dataset.records, point.lon, point.lat, &filter)
        .map(|record| LocalityDetails::new(record, &selection));

    Ok(Json(found))
}
