mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::location::LocationError;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/locations/search", get(handlers::search))
        .route("/api/locations/popular", get(handlers::popular))
        .route("/api/locations/custom", post(handlers::custom_location))
        .route("/api/locations/{id}", get(handlers::location_by_id))
        .route("/api/countries", get(handlers::countries))
        .route("/api/cities", post(handlers::add_city))
        .route("/api/cities/{id}/popularity", patch(handlers::update_popularity))
        // Results are cached server-side; clients should always ask again.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(state: Arc<AppState>, host: &str, port: u16) -> Result<(), LocationError> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Wayfinder location service listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
