mod api;
pub mod player;
mod provider;
pub mod store;
pub mod wav;

pub use api::{split_into_chunks, GeminiTtsClient, GoogleTtsClient};
pub use player::{play_in_background, AudioPlayer, SystemAudioPlayer};
pub use provider::SpeechProvider;
pub use store::{AudioStore, FetchedAudio};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::Result;

/// Synthesized speech ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// File extension matching the MIME type; sniffs the bytes when the
    /// declared type is unfamiliar.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            _ => match infer::get(&self.bytes).map(|kind| kind.extension()) {
                Some("mp3") => "mp3",
                Some("wav") => "wav",
                Some("ogg") => "ogg",
                _ => "bin",
            },
        }
    }
}

/// Text-to-speech service.
#[async_trait]
pub trait Synthesize: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact>;

    fn name(&self) -> &str;
}
