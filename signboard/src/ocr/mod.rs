//! OCR (Optical Character Recognition) Module
//!
//! Turns a photographed sign or a scanned document into text.
//!
//! # Architecture
//!
//! - [`Preprocessor`] binarizes the decoded image (grayscale, upscale,
//!   denoise, adaptive threshold, morphology).
//! - [`OcrEngine`] is the seam to the recognition engine. [`OcrProvider`]
//!   implements it over the tesseract binary or, with the `leptess` feature,
//!   in-process libtesseract.
//! - [`TextExtractor`] runs the engine once per [`OcrProfile`] and keeps the
//!   longest result.
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = OcrProvider::new(&config.ocr)?;
//! let raster = Preprocessor::new(PreprocessOptions::signboard(&config.ocr)).process_bytes(&bytes)?;
//! let result = TextExtractor::from_config(&config.ocr).extract(&engine, &raster)?;
//! ```

mod extractor;
mod preprocessing;
mod profile;
mod provider;

pub use extractor::{ExtractionResult, TextExtractor};
pub use preprocessing::{
    encode_png, load_image, load_image_file, Denoise, PreprocessOptions, Preprocessor,
};
pub use profile::OcrProfile;
pub use provider::{OcrProvider, TesseractCli};

use crate::error::{Result, SignboardError};

/// A text recognition engine.
///
/// Calls are blocking; async callers run them on `spawn_blocking`.
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a PNG-encoded image using one profile.
    fn recognize(&self, png: &[u8], profile: &OcrProfile) -> Result<String>;

    /// Render a PDF with an invisible text layer over the image.
    fn searchable_pdf(&self, _png: &[u8]) -> Result<Vec<u8>> {
        Err(SignboardError::OcrUnavailable(
            "This OCR engine cannot render searchable PDFs".to_string(),
        ))
    }

    /// Short engine label for logs and health output.
    fn name(&self) -> &str;
}
