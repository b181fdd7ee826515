use image::GrayImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::preprocessing::encode_png;
use super::profile::OcrProfile;
use super::OcrEngine;
use crate::config::OcrConfig;
use crate::error::{Result, SignboardError};

/// Text kept from a best-of-N OCR run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub profile: OcrProfile,
    /// Characters (not bytes) in `text`.
    pub char_count: usize,
}

/// Runs every configured profile and keeps the longest trimmed output.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    profiles: Vec<OcrProfile>,
    min_text_length: usize,
}

impl TextExtractor {
    pub fn new(profiles: Vec<OcrProfile>, min_text_length: usize) -> Self {
        let profiles = if profiles.is_empty() {
            OcrProfile::defaults()
        } else {
            profiles
        };
        Self {
            profiles,
            min_text_length,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(OcrProfile::from_config(config), config.min_text_length)
    }

    pub fn profiles(&self) -> &[OcrProfile] {
        &self.profiles
    }

    pub fn extract(&self, engine: &dyn OcrEngine, raster: &GrayImage) -> Result<ExtractionResult> {
        let png = encode_png(raster)?;
        self.extract_encoded(engine, &png)
    }

    /// Best-of-N over an already encoded image.
    ///
    /// A profile that errors is skipped. If every profile errors the last
    /// error is returned; otherwise output shorter than the minimum length is
    /// [`SignboardError::NoTextDetected`].
    pub fn extract_encoded(&self, engine: &dyn OcrEngine, png: &[u8]) -> Result<ExtractionResult> {
        let mut best: Option<ExtractionResult> = None;
        let mut last_error = None;
        let mut succeeded = 0usize;

        for profile in &self.profiles {
            let raw = match engine.recognize(png, profile) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(profile = %profile, engine = engine.name(), "OCR pass failed: {}", e);
                    last_error = Some(e);
                    continue;
                }
            };
            succeeded += 1;

            let text = raw.trim();
            let char_count = text.chars().count();
            debug!(
                profile = %profile,
                layout = profile.layout_name(),
                char_count,
                "OCR pass finished"
            );

            if best.as_ref().map_or(true, |b| char_count > b.char_count) {
                best = Some(ExtractionResult {
                    text: text.to_string(),
                    profile: *profile,
                    char_count,
                });
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        match best {
            Some(result) if result.char_count >= self.min_text_length => {
                info!(
                    profile = %result.profile,
                    char_count = result.char_count,
                    "Selected OCR result"
                );
                Ok(result)
            }
            _ => Err(SignboardError::NoTextDetected),
        }
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::from_config(&OcrConfig::default())
    }
}
