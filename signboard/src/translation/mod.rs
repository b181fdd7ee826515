mod api;
mod provider;

pub use api::{GoogleTranslateClient, LibreTranslateClient, MyMemoryClient};
pub use provider::TranslationProvider;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Outcome of translating one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub source_text: String,
    /// Detected language when the service reports one, else the hint, else `auto`.
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
}

/// Text translation service.
#[async_trait]
pub trait Translate: Send + Sync {
    /// Translate `text` into `target`; `source` of `None` asks the service to detect.
    async fn translate(&self, text: &str, source: Option<&str>, target: &str)
        -> Result<Translation>;

    fn name(&self) -> &str;
}

/// Raw output of one translation service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceTranslation {
    pub text: String,
    pub detected_language: Option<String>,
}
