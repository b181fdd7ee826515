//! Image → text → translation → speech, one request at a time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SignboardError;
use crate::language::TargetLanguage;
use crate::ocr::{
    load_image, ExtractionResult, OcrEngine, OcrProfile, PreprocessOptions, Preprocessor,
    TextExtractor,
};
use crate::speech::{AudioArtifact, SpeechProvider, Synthesize};
use crate::translation::{Translate, Translation, TranslationProvider};

/// Stages in completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Loaded,
    Preprocessed,
    Extracted,
    Translated,
    Synthesized,
    Delivered,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Loaded => "loaded",
            PipelineStage::Preprocessed => "preprocessed",
            PipelineStage::Extracted => "extracted",
            PipelineStage::Translated => "translated",
            PipelineStage::Synthesized => "synthesized",
            PipelineStage::Delivered => "delivered",
        }
    }
}

/// Whatever the pipeline produced before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_profile: Option<OcrProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

/// A halted run: the error, the last stage that completed, and partial outputs.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: SignboardError,
    pub completed: Option<PipelineStage>,
    pub partial: PartialOutput,
}

impl PipelineFailure {
    fn new(error: SignboardError, completed: Option<PipelineStage>, partial: PartialOutput) -> Self {
        Self {
            error,
            completed,
            partial,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: Option<String>,
    pub target: TargetLanguage,
    /// Skip speech synthesis when false.
    pub synthesize: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// `None` when the run started from text instead of an image.
    pub extraction: Option<ExtractionResult>,
    pub translation: Translation,
    pub audio: Option<AudioArtifact>,
}

impl PipelineOutput {
    pub fn stage(&self) -> PipelineStage {
        if self.audio.is_some() {
            PipelineStage::Synthesized
        } else {
            PipelineStage::Translated
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    engine: Arc<dyn OcrEngine>,
    preprocessor: Preprocessor,
    extractor: TextExtractor,
    translator: Arc<dyn Translate>,
    synthesizer: Arc<dyn Synthesize>,
    ocr_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        preprocessor: Preprocessor,
        extractor: TextExtractor,
        translator: Arc<dyn Translate>,
        synthesizer: Arc<dyn Synthesize>,
        ocr_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            preprocessor,
            extractor,
            translator,
            synthesizer,
            ocr_timeout,
        }
    }

    /// Wire the configured services around an already constructed OCR engine.
    pub fn from_config(config: &Config, engine: Arc<dyn OcrEngine>) -> crate::error::Result<Self> {
        Ok(Self::new(
            engine,
            Preprocessor::new(PreprocessOptions::signboard(&config.ocr)),
            TextExtractor::from_config(&config.ocr),
            Arc::new(TranslationProvider::new(&config.translation)?),
            Arc::new(SpeechProvider::new(&config.speech)?),
            Duration::from_secs(config.ocr.timeout_secs),
        ))
    }

    pub fn translator_name(&self) -> &str {
        self.translator.name()
    }

    pub fn synthesizer_name(&self) -> &str {
        self.synthesizer.name()
    }

    /// Full run starting from encoded image bytes.
    pub async fn run(
        &self,
        image: Vec<u8>,
        request: &PipelineRequest,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let extraction = self.extract_text(image).await?;

        let partial = PartialOutput {
            original_text: Some(extraction.text.clone()),
            ocr_profile: Some(extraction.profile),
            ..PartialOutput::default()
        };

        let (translation, audio) = self
            .translate_and_speak(&extraction.text, request, Some(PipelineStage::Extracted), partial)
            .await?;

        Ok(PipelineOutput {
            extraction: Some(extraction),
            translation,
            audio,
        })
    }

    /// Run the translation and speech stages over caller-supplied text.
    pub async fn run_text(
        &self,
        text: &str,
        request: &PipelineRequest,
    ) -> Result<PipelineOutput, PipelineFailure> {
        if text.trim().is_empty() {
            return Err(PipelineFailure::new(
                SignboardError::MissingInput("nothing to translate".to_string()),
                None,
                PartialOutput::default(),
            ));
        }

        let (translation, audio) = self
            .translate_and_speak(text, request, None, PartialOutput::default())
            .await?;

        Ok(PipelineOutput {
            extraction: None,
            translation,
            audio,
        })
    }

    /// Decode, preprocess and OCR on a blocking worker, bounded by the OCR timeout.
    pub async fn extract_text(&self, image: Vec<u8>) -> Result<ExtractionResult, PipelineFailure> {
        let progress = Arc::new(Mutex::new(None::<PipelineStage>));

        let engine = Arc::clone(&self.engine);
        let preprocessor = self.preprocessor.clone();
        let extractor = self.extractor.clone();
        let task_progress = Arc::clone(&progress);

        let task = tokio::task::spawn_blocking(move || {
            let mark = |stage| {
                if let Ok(mut guard) = task_progress.lock() {
                    *guard = Some(stage);
                }
            };

            let decoded = load_image(&image)?;
            mark(PipelineStage::Loaded);

            let raster = preprocessor.process(decoded)?;
            mark(PipelineStage::Preprocessed);

            let extraction = extractor.extract(engine.as_ref(), &raster)?;
            mark(PipelineStage::Extracted);
            Ok::<_, SignboardError>(extraction)
        });

        let result = match tokio::time::timeout(self.ocr_timeout, task).await {
            Ok(Ok(inner)) => inner,
            Ok(Err(e)) => Err(SignboardError::Internal(format!("OCR task panicked: {e}"))),
            Err(_) => Err(SignboardError::Ocr(format!(
                "OCR timed out after {} seconds",
                self.ocr_timeout.as_secs()
            ))),
        };

        let completed = progress.lock().ok().and_then(|guard| *guard);

        match result {
            Ok(extraction) => {
                info!(
                    profile = %extraction.profile,
                    char_count = extraction.char_count,
                    "Extracted text from image"
                );
                Ok(extraction)
            }
            Err(error) => {
                warn!(completed = ?completed, "Pipeline halted before translation: {}", error);
                Err(PipelineFailure::new(error, completed, PartialOutput::default()))
            }
        }
    }

    async fn translate_and_speak(
        &self,
        text: &str,
        request: &PipelineRequest,
        completed: Option<PipelineStage>,
        mut partial: PartialOutput,
    ) -> Result<(Translation, Option<AudioArtifact>), PipelineFailure> {
        let translation = match self
            .translator
            .translate(text, request.source.as_deref(), &request.target.translation_code)
            .await
        {
            Ok(translation) => translation,
            Err(error) => {
                warn!(translator = self.translator.name(), "Translation failed: {}", error);
                return Err(PipelineFailure::new(error, completed, partial));
            }
        };

        info!(
            source = %translation.source_language,
            target = %translation.target_language,
            "Translated text"
        );
        partial.translated_text = Some(translation.translated_text.clone());
        partial.source_language = Some(translation.source_language.clone());

        if !request.synthesize {
            return Ok((translation, None));
        }

        match self
            .synthesizer
            .synthesize(&translation.translated_text, &request.target.speech_code)
            .await
        {
            Ok(audio) => {
                info!(
                    bytes = audio.bytes.len(),
                    mime_type = %audio.mime_type,
                    "Synthesized speech"
                );
                Ok((translation, Some(audio)))
            }
            Err(error) => {
                warn!(synthesizer = self.synthesizer.name(), "Speech synthesis failed: {}", error);
                Err(PipelineFailure::new(
                    error,
                    Some(PipelineStage::Translated),
                    partial,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEngine(&'static str);

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _png: &[u8], _profile: &OcrProfile) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct FakeTranslator {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translate for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            source: Option<&str>,
            target: &str,
        ) -> Result<Translation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SignboardError::Translation("service unreachable".into()));
            }
            Ok(Translation {
                source_text: text.to_string(),
                source_language: source.unwrap_or("en").to_string(),
                target_language: target.to_string(),
                translated_text: format!("[{target}] {text}"),
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeSynthesizer {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Synthesize for FakeSynthesizer {
        async fn synthesize(&self, text: &str, _language: &str) -> Result<AudioArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SignboardError::Synthesis("unsupported language".into()));
            }
            Ok(AudioArtifact::new(text.as_bytes().to_vec(), "audio/mpeg"))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut output = Vec::new();
        DynamicImage::new_luma8(40, 20)
            .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    fn request(synthesize: bool) -> PipelineRequest {
        PipelineRequest {
            source: None,
            target: TargetLanguage {
                translation_code: "zh-CN".to_string(),
                speech_code: "zh-cn".to_string(),
            },
            synthesize,
        }
    }

    fn pipeline(
        text: &'static str,
        translator: Arc<FakeTranslator>,
        synthesizer: Arc<FakeSynthesizer>,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(FixedEngine(text)),
            Preprocessor::default(),
            TextExtractor::default(),
            translator,
            synthesizer,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_full_run() {
        let translator = Arc::new(FakeTranslator::default());
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let pipeline = pipeline("NO PARKING", translator.clone(), synthesizer.clone());

        let output = pipeline.run(png_bytes(), &request(true)).await.unwrap();

        let extraction = output.extraction.as_ref().unwrap();
        assert_eq!(extraction.text, "NO PARKING");
        assert_eq!(extraction.profile, OcrProfile::AUTOMATIC);
        assert_eq!(output.translation.translated_text, "[zh-CN] NO PARKING");
        assert_eq!(output.audio.as_ref().unwrap().bytes, b"[zh-CN] NO PARKING");
        assert_eq!(output.stage(), PipelineStage::Synthesized);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_image_fails_before_any_stage() {
        let translator = Arc::new(FakeTranslator::default());
        let pipeline = pipeline("TEXT", translator.clone(), Arc::default());

        let failure = pipeline
            .run(b"definitely not an image".to_vec(), &request(true))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SignboardError::LoadError(_)));
        assert_eq!(failure.completed, None);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_image_stops_after_preprocessing() {
        let translator = Arc::new(FakeTranslator::default());
        let pipeline = pipeline("  ", translator.clone(), Arc::default());

        let failure = pipeline.run(png_bytes(), &request(true)).await.unwrap_err();

        assert!(matches!(failure.error, SignboardError::NoTextDetected));
        assert_eq!(failure.completed, Some(PipelineStage::Preprocessed));
        assert_eq!(failure.partial, PartialOutput::default());
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_extracted_text() {
        let translator = Arc::new(FakeTranslator {
            fail: true,
            ..FakeTranslator::default()
        });
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let pipeline = pipeline("EXIT", translator.clone(), synthesizer.clone());

        let failure = pipeline.run(png_bytes(), &request(true)).await.unwrap_err();

        assert!(matches!(failure.error, SignboardError::Translation(_)));
        assert_eq!(failure.completed, Some(PipelineStage::Extracted));
        assert_eq!(failure.partial.original_text.as_deref(), Some("EXIT"));
        assert_eq!(failure.partial.translated_text, None);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_translation() {
        let synthesizer = Arc::new(FakeSynthesizer {
            fail: true,
            ..FakeSynthesizer::default()
        });
        let pipeline = pipeline("EXIT", Arc::default(), synthesizer.clone());

        let failure = pipeline.run(png_bytes(), &request(true)).await.unwrap_err();

        assert!(matches!(failure.error, SignboardError::Synthesis(_)));
        assert_eq!(failure.completed, Some(PipelineStage::Translated));
        assert_eq!(failure.partial.original_text.as_deref(), Some("EXIT"));
        assert_eq!(
            failure.partial.translated_text.as_deref(),
            Some("[zh-CN] EXIT")
        );
        assert_eq!(failure.partial.source_language.as_deref(), Some("en"));
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_without_speech() {
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let pipeline = pipeline("EXIT", Arc::default(), synthesizer.clone());

        let output = pipeline.run(png_bytes(), &request(false)).await.unwrap();

        assert!(output.audio.is_none());
        assert_eq!(output.stage(), PipelineStage::Translated);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_text_rejects_blank_input() {
        let translator = Arc::new(FakeTranslator::default());
        let pipeline = pipeline("unused", translator.clone(), Arc::default());

        let failure = pipeline.run_text(" \n ", &request(true)).await.unwrap_err();

        assert!(matches!(failure.error, SignboardError::MissingInput(_)));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_text_passes_source_hint() {
        let pipeline = pipeline("unused", Arc::default(), Arc::default());
        let mut req = request(true);
        req.source = Some("fr".to_string());

        let output = pipeline.run_text("Sortie", &req).await.unwrap();

        assert!(output.extraction.is_none());
        assert_eq!(output.translation.source_language, "fr");
        assert!(output.audio.is_some());
    }

    #[test]
    fn test_stage_order() {
        assert!(PipelineStage::Loaded < PipelineStage::Preprocessed);
        assert!(PipelineStage::Synthesized < PipelineStage::Delivered);
        assert_eq!(PipelineStage::Extracted.as_str(), "extracted");
    }
}
