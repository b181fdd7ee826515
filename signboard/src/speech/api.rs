use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::wav::{parse_sample_rate, pcm16_to_wav, DEFAULT_SAMPLE_RATE};
use super::AudioArtifact;
use crate::http::{
    base_url, build_client, error_body, map_http_error, map_send_error, ErrorKind,
};
use crate::{
    config::SpeechConfig,
    error::{Result, SignboardError},
};

const GOOGLE_TTS_BASE_URL: &str = "https://translate.google.com";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// The Translate TTS endpoint rejects requests longer than this.
pub const MAX_CHUNK_CHARS: usize = 100;

const ERROR_KIND: ErrorKind = SignboardError::Synthesis;

fn push_chunk(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Split text into pieces of at most `max_chars` characters, breaking on
/// word boundaries. Words longer than the limit are split by grapheme.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in text.split_word_bounds() {
        let piece_len = piece.chars().count();
        let current_len = current.chars().count();

        if current_len + piece_len <= max_chars {
            if !(current.is_empty() && piece.trim().is_empty()) {
                current.push_str(piece);
            }
            continue;
        }

        push_chunk(&mut chunks, &mut current);
        if piece.trim().is_empty() {
            continue;
        }

        if piece_len <= max_chars {
            current.push_str(piece);
            continue;
        }

        for grapheme in piece.graphemes(true) {
            if current.chars().count() + grapheme.chars().count() > max_chars {
                push_chunk(&mut chunks, &mut current);
            }
            current.push_str(grapheme);
        }
    }

    push_chunk(&mut chunks, &mut current);
    chunks
}

/// Google Translate's text-to-speech endpoint. Returns MP3.
#[derive(Debug, Clone)]
pub struct GoogleTtsClient {
    client: Client,
    base_url: String,
}

impl GoogleTtsClient {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, ERROR_KIND)?,
            base_url: base_url(config.base_url.as_deref(), GOOGLE_TTS_BASE_URL),
        })
    }

    /// Fetch each chunk in order and concatenate the MP3 frames.
    pub async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let url = format!("{}/translate_tts", self.base_url);
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            debug!(idx, total = chunks.len(), "Requesting speech chunk from {}", url);

            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0")
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| map_send_error(ERROR_KIND, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = error_body(response).await;
                return Err(map_http_error(ERROR_KIND, "Google TTS", status, &body));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| map_send_error(ERROR_KIND, e))?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(SignboardError::Synthesis(
                "Speech service returned no audio".to_string(),
            ));
        }

        Ok(AudioArtifact::new(audio, "audio/mpeg"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechVoiceConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Gemini speech generation. Returns WAV built from the raw PCM payload.
#[derive(Debug, Clone)]
pub struct GeminiTtsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl GeminiTtsClient {
    pub fn new(config: &SpeechConfig, model: Option<&str>) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            SignboardError::Synthesis("API key required for Gemini speech".to_string())
        })?;

        Ok(Self {
            client: build_client(config.timeout_secs, ERROR_KIND)?,
            base_url: base_url(config.base_url.as_deref(), GEMINI_BASE_URL),
            api_key,
            model: model.unwrap_or(DEFAULT_GEMINI_MODEL).to_string(),
            voice: config.voice.clone(),
        })
    }

    /// The model picks pronunciation from the text itself, so `language` only
    /// shows up in logs.
    pub async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact> {
        let prompt = format!("Say in a clear voice: {text}");
        let request = GenerateContentRequest {
            contents: [Content {
                parts: [TextPart { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechVoiceConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &self.voice,
                        },
                    },
                },
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, language, "Sending speech request to {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(ERROR_KIND, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(map_http_error(ERROR_KIND, "Gemini", status, &body));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            SignboardError::Synthesis(format!("Failed to parse speech response: {e}"))
        })?;

        let inline = body
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .ok_or_else(|| {
                SignboardError::Synthesis("Speech response contained no audio".to_string())
            })?;

        let pcm = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
            SignboardError::Synthesis(format!("Speech audio was not valid base64: {e}"))
        })?;
        let sample_rate = parse_sample_rate(&inline.mime_type).unwrap_or(DEFAULT_SAMPLE_RATE);

        Ok(AudioArtifact::new(
            pcm16_to_wav(&pcm, sample_rate, 1),
            "audio/wav",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_config(base_url: &str) -> SpeechConfig {
        SpeechConfig {
            base_url: Some(base_url.to_string()),
            api_key: Some("test-api-key".to_string()),
            timeout_secs: 5,
            ..SpeechConfig::default()
        }
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_words() {
        let text = "Platform two is closed for maintenance. Passengers for the eastbound \
                    service should use the footbridge to reach platform four, where \
                    additional staff will be available to assist with luggage and tickets.";
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_into_chunks("  EXIT  ", 100), vec!["EXIT"]);
        assert!(split_into_chunks("   ", 100).is_empty());
    }

    #[test]
    fn test_overlong_word_is_split() {
        let word = "a".repeat(250);
        let chunks = split_into_chunks(&word, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat(), word);
    }

    #[test]
    fn test_limit_counts_characters() {
        let text = "नमस्ते ".repeat(40);
        let chunks = split_into_chunks(&text, 100);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, 40);
    }

    #[tokio::test]
    async fn test_google_tts_concatenates_chunks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("tl", "hi"))
            .and(query_param("client", "tw-ob"))
            .and(query_param("idx", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-first".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("idx", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"-second".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GoogleTtsClient::new(&test_config(&mock_server.uri())).unwrap();
        let text = format!("{} {}", "word ".repeat(18), "tail ".repeat(10));
        let artifact = client.synthesize(&text, "hi").await.unwrap();

        assert_eq!(artifact.bytes, b"ID3-first-second");
        assert_eq!(artifact.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_google_tts_error_is_synthesis_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GoogleTtsClient::new(&test_config(&mock_server.uri())).unwrap();
        let error = client.synthesize("hello", "en").await.unwrap_err();

        assert!(matches!(error, SignboardError::Synthesis(_)));
        assert!(format!("{error:?}").contains("403"));
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url_is_ignored() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-audio".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = test_config(&format!("{}/", mock_server.uri()));
        let client = GoogleTtsClient::new(&config).unwrap();
        let artifact = client.synthesize("hello", "en").await.unwrap();

        assert_eq!(artifact.bytes, b"ID3-audio");
    }

    #[tokio::test]
    async fn test_gemini_wraps_pcm_in_wav() {
        let mock_server = MockServer::start().await;
        let pcm = vec![0x10u8, 0x00, 0x20, 0x00];

        Mock::given(method("POST"))
            .and(path(format!(
                "/v1beta/models/{DEFAULT_GEMINI_MODEL}:generateContent"
            )))
            .and(query_param("key", "test-api-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "Say in a clear voice: Bonjour"}]}],
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Puck"}}}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"inlineData": {
                        "mimeType": "audio/L16;codec=pcm;rate=16000",
                        "data": BASE64.encode(&pcm)
                    }}]}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GeminiTtsClient::new(&test_config(&mock_server.uri()), None).unwrap();
        let artifact = client.synthesize("Bonjour", "fr").await.unwrap();

        assert_eq!(artifact.mime_type, "audio/wav");
        assert_eq!(artifact.bytes.len(), 44 + pcm.len());
        assert_eq!(&artifact.bytes[..4], b"RIFF");
        assert_eq!(
            u32::from_le_bytes(artifact.bytes[24..28].try_into().unwrap()),
            16_000
        );
    }

    #[tokio::test]
    async fn test_gemini_response_without_audio() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}}]
            })))
            .mount(&mock_server)
            .await;

        let client = GeminiTtsClient::new(&test_config(&mock_server.uri()), None).unwrap();
        let result = client.synthesize("hello", "en").await;
        assert!(matches!(result, Err(SignboardError::Synthesis(_))));
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let config = SpeechConfig::default();
        let result = GeminiTtsClient::new(&config, None);
        assert!(matches!(result, Err(SignboardError::Synthesis(_))));
    }
}
