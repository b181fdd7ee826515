use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignboardError {
    #[error("Image could not be loaded: {0}")]
    LoadError(String),

    #[error("No text detected in image")]
    NoTextDetected,

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SignboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            SignboardError::LoadError(_)
            | SignboardError::NoTextDetected
            | SignboardError::MissingInput(_)
            | SignboardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SignboardError::NotFound(_) => StatusCode::NOT_FOUND,
            SignboardError::OcrUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SignboardError::Translation(_)
            | SignboardError::Synthesis(_)
            | SignboardError::Ocr(_)
            | SignboardError::Config(_)
            | SignboardError::Io(_)
            | SignboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to API clients.
    ///
    /// IO and internal failures are logged in full and replaced with a generic message.
    pub fn public_message(&self) -> String {
        match self {
            SignboardError::Io(e) => {
                tracing::error!(error = %e, "IO failure");
                "An internal error occurred".to_string()
            }
            SignboardError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SignboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, SignboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SignboardError::LoadError("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SignboardError::NoTextDetected.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SignboardError::MissingInput("image".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SignboardError::Translation("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            SignboardError::Synthesis("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            SignboardError::OcrUnavailable("missing".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SignboardError::NotFound("audio".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_no_text_message() {
        let msg = SignboardError::NoTextDetected.to_string();
        assert!(msg.to_lowercase().contains("no text detected"));
    }

    #[test]
    fn test_internal_message_is_not_leaked() {
        let err = SignboardError::Internal("secret path /var/x".into());
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn test_io_error_converts_and_is_hidden() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/signboard/audio.mp3")?)
        }

        let err = read_missing().unwrap_err();
        assert!(matches!(err, SignboardError::Io(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[tokio::test]
    async fn test_into_response_shape() {
        let response = SignboardError::MissingInput("No image file part".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("No image file part"));
    }
}
