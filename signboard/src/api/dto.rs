use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::PipelineFailure;

/// `POST /analyze_image` multipart fields. Documentation only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct AnalyzeImageForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// Target language name or code, e.g. `Hindi` or `hi`.
    pub target_lang: Option<String>,
    /// Source language hint; omit to detect.
    pub source_lang: Option<String>,
}

/// `POST /analyze_image` success body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeImageResponse {
    pub success: bool,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    /// Where to download the speech audio for this request.
    pub audio_url: String,
    pub audio_id: String,
    /// Tesseract flags of the profile whose output was kept.
    pub ocr_profile: String,
}

/// Failure body for image analysis, carrying whatever completed before the error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineErrorResponse {
    pub success: bool,
    pub message: String,
    /// Last stage that completed, or `none`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

impl PipelineErrorResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stage: None,
            original_text: None,
            translated_text: None,
            source_language: None,
        }
    }
}

impl From<&PipelineFailure> for PipelineErrorResponse {
    fn from(failure: &PipelineFailure) -> Self {
        Self {
            success: false,
            message: failure.error.public_message(),
            stage: Some(
                failure
                    .completed
                    .map(|stage| stage.as_str())
                    .unwrap_or("none")
                    .to_string(),
            ),
            original_text: failure.partial.original_text.clone(),
            translated_text: failure.partial.translated_text.clone(),
            source_language: failure.partial.source_language.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TranslateAudioRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Source language name or code; omitted or `auto` to detect.
    #[serde(default)]
    pub source_lang: Option<String>,
    /// Target language name or code; defaults to `TRANSLATION_TARGET_LANG`.
    #[serde(default)]
    pub target_lang: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranslateAudioResponse {
    pub success: bool,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub audio_base64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranslateAudioError {
    pub success: bool,
    pub error: String,
}

impl TranslateAudioError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ocr: OcrStatus,
    pub translation: ProviderStatus,
    pub speech: ProviderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OcrStatus {
    pub available: bool,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderStatus {
    pub provider: String,
}
