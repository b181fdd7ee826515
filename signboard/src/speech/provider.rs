use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{parse_provider_model, SpeechConfig};
use crate::error::{Result, SignboardError};

use super::api::{GeminiTtsClient, GoogleTtsClient};
use super::{AudioArtifact, Synthesize};

#[derive(Clone)]
enum SpeechBackend {
    Google { client: GoogleTtsClient },
    Gemini { client: GeminiTtsClient },
    Unavailable { reason: String },
}

/// Speech service selected by `SPEECH_PROVIDER` (`google` or `gemini/<model>`).
#[derive(Clone)]
pub struct SpeechProvider {
    backend: SpeechBackend,
    config: SpeechConfig,
}

impl SpeechProvider {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let (provider, model) = parse_provider_model(&config.model);

        let built = match provider.as_str() {
            "google" | "gtts" => {
                GoogleTtsClient::new(config).map(|client| SpeechBackend::Google { client })
            }
            "gemini" => {
                GeminiTtsClient::new(config, model).map(|client| SpeechBackend::Gemini { client })
            }
            other => Err(SignboardError::Config(format!(
                "Unknown speech provider '{other}'"
            ))),
        };

        let backend = match built {
            Ok(backend) => {
                info!(provider = %provider, "Speech backend initialized");
                backend
            }
            Err(e) => {
                let reason = format!("Speech backend unavailable: {e}");
                warn!("{}", reason);
                SpeechBackend::Unavailable { reason }
            }
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, SpeechBackend::Unavailable { .. })
    }

    async fn synthesize_internal(&self, text: &str, language: &str) -> Result<AudioArtifact> {
        match &self.backend {
            SpeechBackend::Google { client } => client.synthesize(text, language).await,
            SpeechBackend::Gemini { client } => client.synthesize(text, language).await,
            SpeechBackend::Unavailable { reason } => {
                Err(SignboardError::Synthesis(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl Synthesize for SpeechProvider {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact> {
        if text.trim().is_empty() {
            return Err(SignboardError::MissingInput(
                "nothing to synthesize".to_string(),
            ));
        }

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout_duration, self.synthesize_internal(text, language)).await
        {
            Ok(inner_result) => inner_result,
            Err(_) => Err(SignboardError::Synthesis(format!(
                "Speech synthesis timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }

    fn name(&self) -> &str {
        match &self.backend {
            SpeechBackend::Google { .. } => "google",
            SpeechBackend::Gemini { .. } => "gemini",
            SpeechBackend::Unavailable { .. } => "unavailable",
        }
    }
}
