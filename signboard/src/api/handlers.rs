use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use crate::api::dto::{
    AnalyzeImageForm, AnalyzeImageResponse, HealthResponse, PipelineErrorResponse, ProviderStatus,
    TranslateAudioError, TranslateAudioRequest, TranslateAudioResponse,
};
use crate::api::AppState;
use crate::error::SignboardError;
use crate::language::{resolve_source, resolve_target};
use crate::pipeline::{PipelineRequest, PipelineStage};
use crate::speech::FetchedAudio;

fn pipeline_error(status: StatusCode, body: PipelineErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn audio_not_found() -> Response {
    pipeline_error(
        StatusCode::NOT_FOUND,
        PipelineErrorResponse::message("Audio file not found"),
    )
}

/// Base for absolute URLs: `SIGNBOARD_PUBLIC_URL`, else the request's `Host`.
fn public_base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.server.public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| format!("localhost:{}", state.config.server.port));
    format!("http://{host}")
}

fn audio_response(audio: FetchedAudio) -> Response {
    let content_type = HeaderValue::from_str(&audio.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        audio.file_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        audio.bytes,
    )
        .into_response()
}

/// `POST /analyze_image`
///
/// Multipart upload: `image` (required), `target_lang`, `source_lang`.
#[utoipa::path(
    post,
    path = "/analyze_image",
    tag = "pipeline",
    request_body(content = AnalyzeImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Text extracted, translated and spoken", body = AnalyzeImageResponse),
        (status = 400, description = "Missing or unreadable image, or no text found", body = PipelineErrorResponse),
        (status = 500, description = "Translation or speech service failed", body = PipelineErrorResponse),
        (status = 503, description = "OCR engine unavailable", body = PipelineErrorResponse),
    )
)]
pub async fn analyze_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut image: Option<Vec<u8>> = None;
    let mut image_named = true;
    let mut target_lang: Option<String> = None;
    let mut source_lang: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return pipeline_error(
                    StatusCode::BAD_REQUEST,
                    PipelineErrorResponse::message(format!("Invalid multipart body: {e}")),
                );
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                image_named = field.file_name().map(|n| !n.is_empty()).unwrap_or(true);
                match field.bytes().await {
                    Ok(bytes) => image = Some(bytes.to_vec()),
                    Err(e) => {
                        return pipeline_error(
                            StatusCode::BAD_REQUEST,
                            PipelineErrorResponse::message(format!("Failed to read image: {e}")),
                        );
                    }
                }
            }
            "target_lang" | "source_lang" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        return pipeline_error(
                            StatusCode::BAD_REQUEST,
                            PipelineErrorResponse::message(format!("Failed to read {name}: {e}")),
                        );
                    }
                };
                let value = (!value.trim().is_empty()).then_some(value);
                if name == "target_lang" {
                    target_lang = value;
                } else {
                    source_lang = value;
                }
            }
            _ => {}
        }
    }

    let image = match image {
        None => {
            return pipeline_error(
                StatusCode::BAD_REQUEST,
                PipelineErrorResponse::message("No image file part"),
            )
        }
        Some(bytes) if bytes.is_empty() || !image_named => {
            return pipeline_error(
                StatusCode::BAD_REQUEST,
                PipelineErrorResponse::message("No selected image file"),
            )
        }
        Some(bytes) => bytes,
    };

    let target = match resolve_target(
        target_lang
            .as_deref()
            .unwrap_or(&state.config.translation.default_target),
    ) {
        Ok(target) => target,
        Err(e) => {
            return pipeline_error(e.status(), PipelineErrorResponse::message(e.public_message()))
        }
    };

    let request = PipelineRequest {
        source: resolve_source(source_lang.as_deref()),
        target,
        synthesize: true,
    };

    let output = match state.pipeline.run(image, &request).await {
        Ok(output) => output,
        Err(failure) => {
            return pipeline_error(
                failure.error.status(),
                PipelineErrorResponse::from(&failure),
            )
        }
    };

    let (Some(extraction), Some(audio)) = (output.extraction, output.audio) else {
        return SignboardError::Internal("Pipeline finished without OCR output or audio".into())
            .into_response();
    };

    let audio_id = match state.audio.put(&audio) {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to store generated audio: {}", e);
            return e.into_response();
        }
    };

    let audio_url = format!("{}/get_audio/{}", public_base_url(&state, &headers), audio_id);
    info!(stage = PipelineStage::Delivered.as_str(), audio_id = %audio_id, "Image analysis complete");

    Json(AnalyzeImageResponse {
        success: true,
        original_text: extraction.text,
        translated_text: output.translation.translated_text,
        source_language: output.translation.source_language,
        target_language: output.translation.target_language,
        audio_url,
        audio_id,
        ocr_profile: extraction.profile.to_string(),
    })
    .into_response()
}

/// `GET /get_audio`
///
/// Download the most recently generated audio.
#[utoipa::path(
    get,
    path = "/get_audio",
    tag = "audio",
    responses(
        (status = 200, description = "Audio attachment (audio/mpeg or audio/wav)"),
        (status = 404, description = "No audio available", body = PipelineErrorResponse),
    )
)]
pub async fn get_latest_audio(State(state): State<AppState>) -> Response {
    match state.audio.take_latest() {
        Ok(Some(audio)) => audio_response(audio),
        Ok(None) => audio_not_found(),
        Err(e) => e.into_response(),
    }
}

/// `GET /get_audio/{audio_id}`
#[utoipa::path(
    get,
    path = "/get_audio/{audio_id}",
    tag = "audio",
    params(("audio_id" = String, Path, description = "Id returned by /analyze_image")),
    responses(
        (status = 200, description = "Audio attachment (audio/mpeg or audio/wav)"),
        (status = 404, description = "Unknown or already fetched id", body = PipelineErrorResponse),
    )
)]
pub async fn get_audio(State(state): State<AppState>, Path(audio_id): Path<String>) -> Response {
    match state.audio.take(&audio_id) {
        Ok(Some(audio)) => audio_response(audio),
        Ok(None) => audio_not_found(),
        Err(e) => e.into_response(),
    }
}

/// `POST /translate_audio`
///
/// Translate caller-supplied text and return the speech inline as base64.
#[utoipa::path(
    post,
    path = "/translate_audio",
    tag = "pipeline",
    request_body = TranslateAudioRequest,
    responses(
        (status = 200, description = "Translation with inline audio", body = TranslateAudioResponse),
        (status = 400, description = "Missing text or malformed body", body = TranslateAudioError),
        (status = 500, description = "Translation or speech service failed", body = TranslateAudioError),
    )
)]
pub async fn translate_audio(
    State(state): State<AppState>,
    payload: Result<Json<TranslateAudioRequest>, JsonRejection>,
) -> Response {
    let fail = |status: StatusCode, error: String| {
        (status, Json(TranslateAudioError::new(error))).into_response()
    };

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return fail(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let text = payload.text.unwrap_or_default();
    if text.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "No text provided".to_string());
    }

    let target = match resolve_target(
        payload
            .target_lang
            .as_deref()
            .unwrap_or(&state.config.translation.default_target),
    ) {
        Ok(target) => target,
        Err(e) => return fail(e.status(), e.public_message()),
    };

    let request = PipelineRequest {
        source: resolve_source(payload.source_lang.as_deref()),
        target,
        synthesize: true,
    };

    match state.pipeline.run_text(&text, &request).await {
        Ok(output) => {
            let Some(audio) = output.audio else {
                return fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Speech synthesis produced no audio".to_string(),
                );
            };
            Json(TranslateAudioResponse {
                success: true,
                translated_text: output.translation.translated_text,
                source_language: output.translation.source_language,
                target_language: output.translation.target_language,
                audio_base64: audio.to_base64(),
                mime_type: audio.mime_type,
            })
            .into_response()
        }
        Err(failure) => fail(failure.error.status(), failure.error.public_message()),
    }
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.ocr.available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr: state.ocr.clone(),
        translation: ProviderStatus {
            provider: state.pipeline.translator_name().to_string(),
        },
        speech: ProviderStatus {
            provider: state.pipeline.synthesizer_name().to_string(),
        },
    })
}
