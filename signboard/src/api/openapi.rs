use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Signboard API",
        version = "0.1.0",
        description = "Read text from a photo, translate it, and speak the translation.",
    ),
    paths(
        handlers::analyze_image,
        handlers::get_latest_audio,
        handlers::get_audio,
        handlers::translate_audio,
        handlers::health,
    ),
    components(schemas(
        dto::AnalyzeImageForm,
        dto::AnalyzeImageResponse,
        dto::PipelineErrorResponse,
        dto::TranslateAudioRequest,
        dto::TranslateAudioResponse,
        dto::TranslateAudioError,
        dto::HealthResponse,
        dto::OcrStatus,
        dto::ProviderStatus,
    )),
    tags(
        (name = "pipeline", description = "OCR, translation and speech"),
        (name = "audio", description = "Generated audio downloads"),
        (name = "health", description = "Health check"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
