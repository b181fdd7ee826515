use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::ocr::{OcrEngine, OcrProvider};
use crate::pipeline::Pipeline;
use crate::speech::AudioStore;

use super::dto::OcrStatus;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    /// Generated audio waiting to be fetched.
    pub audio: AudioStore,
    pub ocr: OcrStatus,
}

impl AppState {
    pub fn new(config: Config, ocr: OcrProvider) -> Result<Self> {
        let status = OcrStatus {
            available: ocr.is_available(),
            engine: ocr.name().to_string(),
            version: ocr.version().map(String::from),
            reason: ocr.unavailable_reason().map(String::from),
        };
        let pipeline = Pipeline::from_config(&config, Arc::new(ocr))?;
        let audio = AudioStore::new(&config.audio)?;

        Ok(Self::from_parts(config, pipeline, audio, status))
    }

    pub fn from_parts(config: Config, pipeline: Pipeline, audio: AudioStore, ocr: OcrStatus) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            audio,
            ocr,
        }
    }
}
