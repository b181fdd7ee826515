// Shared fakes and fixtures for the integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use signboard::api::dto::OcrStatus;
use signboard::api::AppState;
use signboard::config::{AudioConfig, Config};
use signboard::error::{Result, SignboardError};
use signboard::ocr::{OcrEngine, OcrProfile, PreprocessOptions, Preprocessor, TextExtractor};
use signboard::pipeline::Pipeline;
use signboard::speech::{AudioArtifact, AudioStore, Synthesize};
use signboard::translation::{Translate, Translation};

pub use serial_test::serial;
pub use tempfile;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A small black-on-white PNG with a bar across the middle.
pub fn sign_png() -> Vec<u8> {
    let mut img = GrayImage::from_pixel(64, 32, Luma([255u8]));
    for x in 8..56 {
        for y in 12..20 {
            img.put_pixel(x, y, Luma([0u8]));
        }
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode fixture png");
    bytes
}

/// Returns the same text for every profile.
pub struct FixedEngine(pub &'static str);

impl OcrEngine for FixedEngine {
    fn recognize(&self, _png: &[u8], _profile: &OcrProfile) -> Result<String> {
        Ok(self.0.to_string())
    }

    fn searchable_pdf(&self, _png: &[u8]) -> Result<Vec<u8>> {
        Ok(b"%PDF-1.5 fake".to_vec())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Prefixes the text with the target code and reports `fr` when no hint is given.
#[derive(Default)]
pub struct FakeTranslator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Translate for FakeTranslator {
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<Translation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Translation {
            source_text: text.to_string(),
            source_language: source.unwrap_or("fr").to_string(),
            target_language: target.to_string(),
            translated_text: format!("[{target}] {text}"),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FailingTranslator;

#[async_trait]
impl Translate for FailingTranslator {
    async fn translate(&self, _text: &str, _source: Option<&str>, _target: &str) -> Result<Translation> {
        Err(SignboardError::Translation("service down".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub struct FakeSynthesizer;

#[async_trait]
impl Synthesize for FakeSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<AudioArtifact> {
        Ok(AudioArtifact::new(b"ID3fake-mp3".to_vec(), "audio/mpeg"))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.public_url = None;
    config.translation.default_target = "en".to_string();
    config.audio = AudioConfig {
        dir: None,
        capacity: 8,
        delete_after_fetch: true,
    };
    config
}

pub fn test_pipeline(engine: Arc<dyn OcrEngine>, translator: Arc<dyn Translate>) -> Pipeline {
    let config = test_config();
    Pipeline::new(
        engine,
        Preprocessor::new(PreprocessOptions::signboard(&config.ocr)),
        TextExtractor::from_config(&config.ocr),
        translator,
        Arc::new(FakeSynthesizer),
        Duration::from_secs(30),
    )
}

pub fn test_state(engine: Arc<dyn OcrEngine>, translator: Arc<dyn Translate>) -> AppState {
    init_test_logger();
    let config = test_config();
    let audio = AudioStore::new(&config.audio).expect("audio store");
    let status = OcrStatus {
        available: true,
        engine: engine.name().to_string(),
        version: Some("tesseract 5.3.0".to_string()),
        reason: None,
    };
    AppState::from_parts(config, test_pipeline(engine, translator), audio, status)
}

pub const BOUNDARY: &str = "signboard-test-boundary";

/// Build a multipart body; `file` parts carry a filename.
pub fn multipart_body(image: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
