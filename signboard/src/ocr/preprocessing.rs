use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, ImageReader, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use tracing::{debug, warn};

use crate::config::OcrConfig;
use crate::error::{Result, SignboardError};

/// Noise filter applied before binarization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Denoise {
    /// Median filter; removes speckle without eating thin strokes.
    Median { radius: u32 },
    /// Gaussian blur, used for flat scanned documents.
    Gaussian { sigma: f32 },
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOptions {
    pub upscale_factor: u32,
    pub max_upscaled_dimension: u32,
    pub min_dimension: u32,
    pub denoise: Denoise,
    /// Sigma of the Gaussian window used for the local mean.
    pub threshold_sigma: f32,
    /// Constant subtracted from the local mean before comparing.
    pub threshold_offset: f32,
    pub morphology: bool,
    pub debug_path: Option<PathBuf>,
}

impl PreprocessOptions {
    /// Photographed signage: 3x cubic upscale, median denoise, adaptive
    /// threshold (11x11 Gaussian window, C = 2), close + open cleanup.
    pub fn signboard(config: &OcrConfig) -> Self {
        Self {
            upscale_factor: config.upscale_factor.max(1),
            max_upscaled_dimension: config.max_upscaled_dimension,
            min_dimension: config.min_image_dimension,
            denoise: Denoise::Median { radius: 1 },
            threshold_sigma: 2.0,
            threshold_offset: 2.0,
            morphology: true,
            debug_path: config.debug_image_path.as_ref().map(PathBuf::from),
        }
    }

    /// Scanned documents: 5x5 Gaussian blur and adaptive threshold only.
    pub fn document(config: &OcrConfig) -> Self {
        Self {
            upscale_factor: 1,
            max_upscaled_dimension: config.max_upscaled_dimension,
            min_dimension: config.min_image_dimension,
            denoise: Denoise::Gaussian { sigma: 1.1 },
            threshold_sigma: 2.0,
            threshold_offset: 2.0,
            morphology: false,
            debug_path: None,
        }
    }
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self::signboard(&OcrConfig::default())
    }
}

/// Decode image bytes (PNG, JPEG, TIFF, ...) into a raster.
pub fn load_image(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SignboardError::LoadError(format!("Failed to read image: {e}")))?;

    reader
        .decode()
        .map_err(|e| SignboardError::LoadError(format!("Failed to decode image: {e}")))
}

pub fn load_image_file(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| {
        SignboardError::LoadError(format!("Cannot read image file {}: {e}", path.display()))
    })?;
    load_image(&bytes)
}

pub fn encode_png(raster: &GrayImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    raster
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| SignboardError::Internal(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Turns a decoded image into a binarized raster for OCR.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    options: PreprocessOptions,
}

impl Preprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    pub fn process_bytes(&self, bytes: &[u8]) -> Result<GrayImage> {
        self.process(load_image(bytes)?)
    }

    /// Run the fixed pipeline: luminance, upscale, denoise, adaptive
    /// threshold, then morphological cleanup.
    ///
    /// The output is never smaller than the input and only holds 0 and 255.
    pub fn process(&self, image: DynamicImage) -> Result<GrayImage> {
        let (width, height) = (image.width(), image.height());
        let min = self.options.min_dimension.max(1);
        if width < min || height < min {
            return Err(SignboardError::LoadError(format!(
                "Image too small: {width}x{height}, minimum {min}x{min}"
            )));
        }

        let gray = image.into_luma8();

        let factor = effective_upscale(
            width,
            height,
            self.options.upscale_factor,
            self.options.max_upscaled_dimension,
        );
        let gray = upscale(gray, factor);
        let gray = denoise(&gray, self.options.denoise);
        let binary = adaptive_threshold(
            &gray,
            self.options.threshold_sigma,
            self.options.threshold_offset,
        );
        let cleaned = if self.options.morphology {
            clean_strokes(&binary)
        } else {
            binary
        };

        debug!(
            width = cleaned.width(),
            height = cleaned.height(),
            factor,
            "Preprocessed image for OCR"
        );

        if let Some(path) = &self.options.debug_path {
            if let Err(e) = cleaned.save(path) {
                warn!(path = %path.display(), "Failed to write debug image: {}", e);
            }
        }

        Ok(cleaned)
    }
}

/// Largest factor in `1..=factor` that keeps the longest side within `max_dim`.
fn effective_upscale(width: u32, height: u32, factor: u32, max_dim: u32) -> u32 {
    let longest = u64::from(width.max(height));
    let mut factor = factor.max(1);
    while factor > 1 && longest * u64::from(factor) > u64::from(max_dim) {
        factor -= 1;
    }
    factor
}

fn upscale(gray: GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return gray;
    }
    image::imageops::resize(
        &gray,
        gray.width() * factor,
        gray.height() * factor,
        FilterType::CatmullRom,
    )
}

fn denoise(gray: &GrayImage, denoise: Denoise) -> GrayImage {
    match denoise {
        Denoise::Median { radius } if radius > 0 => median_filter(gray, radius, radius),
        Denoise::Gaussian { sigma } if sigma > 0.0 => gaussian_blur_f32(gray, sigma),
        _ => gray.clone(),
    }
}

/// Binarize against a Gaussian-weighted local mean.
///
/// A pixel is white when it is brighter than `mean - offset`, so flat regions
/// come out white and only local dark detail (strokes) stays black.
fn adaptive_threshold(gray: &GrayImage, sigma: f32, offset: f32) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, sigma.max(0.1));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = f32::from(gray.get_pixel(x, y)[0]);
        let mean = f32::from(local_mean.get_pixel(x, y)[0]);
        if value > mean - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Close then open with a 2x2 element: drops isolated dark specks, then
/// strips isolated white specks inside strokes. Strokes 2px wide survive.
///
/// imageproc applies masks unreflected, so the second half of each operation
/// uses the mirrored element to keep strokes in place.
fn clean_strokes(binary: &GrayImage) -> GrayImage {
    let square = GrayImage::from_pixel(2, 2, Luma([255]));
    let forward = Mask::from_image(&square, 0, 0);
    let mirrored = Mask::from_image(&square, 1, 1);

    let closed = grayscale_erode(&grayscale_dilate(binary, &forward), &mirrored);
    grayscale_dilate(&grayscale_erode(&closed, &forward), &mirrored)
}
