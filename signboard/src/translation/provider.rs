use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{parse_provider_model, TranslationConfig};
use crate::error::{Result, SignboardError};

use super::api::{GoogleTranslateClient, LibreTranslateClient, MyMemoryClient};
use super::{ServiceTranslation, Translate, Translation};

#[derive(Clone)]
enum TranslationBackend {
    Google { client: GoogleTranslateClient },
    MyMemory { client: MyMemoryClient },
    Libre { client: LibreTranslateClient },
    Unavailable { reason: String },
}

/// Translation service selected by `TRANSLATION_PROVIDER`.
///
/// Each call is attempted exactly once and bounded by the configured timeout.
#[derive(Clone)]
pub struct TranslationProvider {
    backend: TranslationBackend,
    config: TranslationConfig,
}

impl TranslationProvider {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let (provider, _) = parse_provider_model(&config.model);

        let built = match provider.as_str() {
            "google" => GoogleTranslateClient::new(config)
                .map(|client| TranslationBackend::Google { client }),
            "mymemory" => {
                MyMemoryClient::new(config).map(|client| TranslationBackend::MyMemory { client })
            }
            "libretranslate" | "libre" => {
                LibreTranslateClient::new(config).map(|client| TranslationBackend::Libre { client })
            }
            other => Err(SignboardError::Config(format!(
                "Unknown translation provider '{other}'"
            ))),
        };

        let backend = match built {
            Ok(backend) => {
                info!(provider = %provider, "Translation backend initialized");
                backend
            }
            Err(e) => {
                let reason = format!("Translation backend unavailable: {e}");
                warn!("{}", reason);
                TranslationBackend::Unavailable { reason }
            }
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, TranslationBackend::Unavailable { .. })
    }

    async fn translate_internal(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<ServiceTranslation> {
        match &self.backend {
            TranslationBackend::Google { client } => client.translate(text, source, target).await,
            TranslationBackend::MyMemory { client } => {
                client.translate(text, source, target).await
            }
            TranslationBackend::Libre { client } => client.translate(text, source, target).await,
            TranslationBackend::Unavailable { reason } => {
                Err(SignboardError::Translation(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl Translate for TranslationProvider {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<Translation> {
        if text.trim().is_empty() {
            return Err(SignboardError::MissingInput(
                "nothing to translate".to_string(),
            ));
        }

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result =
            tokio::time::timeout(timeout_duration, self.translate_internal(text, source, target))
                .await;

        let translated = match result {
            Ok(inner_result) => inner_result?,
            Err(_) => {
                return Err(SignboardError::Translation(format!(
                    "Translation timed out after {} seconds",
                    self.config.timeout_secs
                )))
            }
        };

        Ok(Translation {
            source_text: text.to_string(),
            source_language: translated
                .detected_language
                .or_else(|| source.map(String::from))
                .unwrap_or_else(|| "auto".to_string()),
            target_language: target.to_string(),
            translated_text: translated.text,
        })
    }

    fn name(&self) -> &str {
        match &self.backend {
            TranslationBackend::Google { .. } => "google",
            TranslationBackend::MyMemory { .. } => "mymemory",
            TranslationBackend::Libre { .. } => "libretranslate",
            TranslationBackend::Unavailable { .. } => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn config_for(model: &str, base_url: Option<String>) -> TranslationConfig {
        TranslationConfig {
            model: model.to_string(),
            base_url,
            timeout_secs: 5,
            ..TranslationConfig::default()
        }
    }

    #[test]
    fn test_default_provider_is_google() {
        let provider = TranslationProvider::new(&TranslationConfig::default()).unwrap();
        assert!(provider.is_available());
        assert_eq!(provider.name(), "google");
    }

    #[test]
    fn test_unknown_provider_is_unavailable() {
        let provider = TranslationProvider::new(&config_for("babelfish", None)).unwrap();
        assert!(!provider.is_available());
        assert_eq!(provider.name(), "unavailable");
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider =
            TranslationProvider::new(&config_for("google", Some(mock_server.uri()))).unwrap();
        let result = provider.translate("  \n\t", None, "hi").await;

        assert!(matches!(result, Err(SignboardError::MissingInput(_))));
    }

    #[tokio::test]
    async fn test_failure_is_attempted_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .respond_with(ResponseTemplate::new(500).set_body_string("unavailable"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            TranslationProvider::new(&config_for("google", Some(mock_server.uri()))).unwrap();
        let result = provider.translate("Hello", None, "fr").await;

        assert!(matches!(result, Err(SignboardError::Translation(_))));
    }

    #[tokio::test]
    async fn test_source_language_prefers_detection_then_hint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseData": {"translatedText": "Hallo"},
                "responseStatus": 200
            })))
            .mount(&mock_server)
            .await;

        let provider =
            TranslationProvider::new(&config_for("mymemory", Some(mock_server.uri()))).unwrap();

        let hinted = provider.translate("Hello", Some("en"), "de").await.unwrap();
        assert_eq!(hinted.source_language, "en");
        assert_eq!(hinted.target_language, "de");
        assert_eq!(hinted.translated_text, "Hallo");
        assert_eq!(hinted.source_text, "Hello");

        let unhinted = provider.translate("Hello", None, "de").await.unwrap();
        assert_eq!(unhinted.source_language, "auto");
    }

    #[tokio::test]
    async fn test_round_trip_both_directions_succeed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("sl", "en"))
            .and(query_param("tl", "hi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [["निकास", "Exit", null, null]],
                null,
                "en"
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("sl", "hi"))
            .and(query_param("tl", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [["Way out", "निकास", null, null]],
                null,
                "hi"
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            TranslationProvider::new(&config_for("google", Some(mock_server.uri()))).unwrap();

        let forward = provider.translate("Exit", Some("en"), "hi").await.unwrap();
        assert!(!forward.translated_text.trim().is_empty());
        assert_eq!(forward.target_language, "hi");

        let back = provider
            .translate(&forward.translated_text, Some("hi"), "en")
            .await
            .unwrap();
        assert!(!back.translated_text.trim().is_empty());
        assert_eq!(back.source_language, "hi");
        assert_eq!(back.target_language, "en");
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"translatedText": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let mut config = config_for("libretranslate", Some(mock_server.uri()));
        config.timeout_secs = 1;
        let provider = TranslationProvider::new(&config).unwrap();

        let result = provider.translate("Hello", None, "fr").await;
        assert!(matches!(result, Err(SignboardError::Translation(_))));
    }

    #[tokio::test]
    async fn test_unavailable_backend_reports_translation_error() {
        let provider = TranslationProvider::new(&config_for("babelfish", None)).unwrap();
        let result = provider.translate("Hello", None, "fr").await;
        assert!(matches!(result, Err(SignboardError::Translation(_))));
    }
}
