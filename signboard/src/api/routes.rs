use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, openapi, AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        .route("/analyze_image", post(handlers::analyze_image))
        .route("/translate_audio", post(handlers::translate_audio))
        .route("/get_audio", get(handlers::get_latest_audio))
        .route("/get_audio/{audio_id}", get(handlers::get_audio))
        .route("/health", get(handlers::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .merge(openapi::redoc_router())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
