use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::location::{Country, Location, NewCity, SearchResult};

use super::state::AppState;

const MAX_LIMIT: usize = 100;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn check_limit(limit: Option<usize>) -> Result<Option<usize>, ApiError> {
    match limit {
        Some(0) => Err(api_error(StatusCode::BAD_REQUEST, "'limit' must be at least 1")),
        Some(n) if n > MAX_LIMIT => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("'limit' must be at most {}", MAX_LIMIT),
        )),
        other => Ok(other),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

// ─── GET /api/health ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_entries: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache_entries: state.resolver.cache_len(),
    })
}

// ─── GET /api/locations/search ───────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub country: Option<String>,
    pub limit: Option<usize>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResult>, ApiError> {
    let start = Instant::now();
    let limit = check_limit(params.limit)?;
    let query = params.query.as_deref().unwrap_or("");

    let result = state
        .resolver
        .search_locations(query, params.country.as_deref(), limit)
        .await;

    info!(
        query,
        total = result.total,
        elapsed_ms = elapsed_ms(start),
        "GET /api/locations/search"
    );
    Ok(Json(result))
}

// ─── GET /api/locations/popular ──────────────────────────────────

#[derive(Deserialize)]
pub struct PopularQuery {
    pub country: Option<String>,
    pub limit: Option<usize>,
}

pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularQuery>,
) -> Result<Json<Vec<Location>>, ApiError> {
    let start = Instant::now();
    let limit = check_limit(params.limit)?;
    let cities = state
        .resolver
        .get_popular_cities(params.country.as_deref(), limit)
        .await;

    info!(count = cities.len(), elapsed_ms = elapsed_ms(start), "GET /api/locations/popular");
    Ok(Json(cities))
}

// ─── GET /api/countries ──────────────────────────────────────────

pub async fn countries(State(state): State<Arc<AppState>>) -> Json<Vec<Country>> {
    Json(state.resolver.get_countries().await)
}

// ─── GET /api/locations/{id} ─────────────────────────────────────

pub async fn location_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Location>, ApiError> {
    state
        .resolver
        .get_location_by_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Location not found: '{}'", id)))
}

// ─── POST /api/locations/custom ──────────────────────────────────

#[derive(Deserialize)]
pub struct CustomLocationBody {
    pub name: String,
    pub country: Option<String>,
}

/// Echo a free-text entry back as an ephemeral location. Nothing is stored.
pub async fn custom_location(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CustomLocationBody>,
) -> Result<Json<Location>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "'name' must not be empty"));
    }
    let country = body
        .country
        .as_deref()
        .unwrap_or_else(|| state.resolver.default_country());
    Ok(Json(Location::custom(&body.name, country)))
}

// ─── POST /api/cities ────────────────────────────────────────────

pub async fn add_city(
    State(state): State<Arc<AppState>>,
    Json(city): Json<NewCity>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    if city.name.trim().is_empty() || city.country.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "'name' and 'country' are required"));
    }
    match state.resolver.add_city(&city).await {
        Some(added) => Ok((StatusCode::CREATED, Json(added))),
        None => Err(api_error(StatusCode::BAD_GATEWAY, "City store rejected the new city")),
    }
}

// ─── PATCH /api/cities/{id}/popularity ───────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularityBody {
    #[serde(alias = "is_popular")]
    pub is_popular: bool,
}

pub async fn update_popularity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PopularityBody>,
) -> Result<StatusCode, ApiError> {
    if state.resolver.update_city_popularity(&id, body.is_popular).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::BAD_GATEWAY,
            format!("Could not update popularity for '{}'", id),
        ))
    }
}
