//! Batch OCR over a folder of scanned documents.
//!
//! Each image gets a `<stem>_searchable.pdf` sidecar and a regex pass that
//! pulls out one reference field (an invoice number by default).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SignboardError};
use crate::ocr::{encode_png, load_image_file, OcrEngine, OcrProfile, PreprocessOptions, Preprocessor};

/// Images directly inside `dir` whose extension is in `extensions`
/// (lowercase, without the dot). Sorted by path.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// First match of `pattern` in `text`: the second capture group when the
/// pattern has one, else the last group, else the whole match.
pub fn extract_field(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    let value = captures
        .get(2)
        .or_else(|| (1..captures.len()).rev().find_map(|i| captures.get(i)))
        .or_else(|| captures.get(0))?;
    let value = value.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn sidecar_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    image.with_file_name(format!("{stem}_searchable.pdf"))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub path: PathBuf,
    pub text: String,
    pub field: Option<String>,
    pub pdf_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: SignboardError,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<ScanReport>,
    pub failures: Vec<ScanFailure>,
}

impl BatchSummary {
    pub fn scanned(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    pub fn fields_found(&self) -> usize {
        self.reports.iter().filter(|r| r.field.is_some()).count()
    }
}

pub struct BatchScanner {
    engine: Arc<dyn OcrEngine>,
    preprocessor: Preprocessor,
    field_pattern: Regex,
    extensions: Vec<String>,
    write_pdf: bool,
}

impl BatchScanner {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &Config) -> Result<Self> {
        let field_pattern = Regex::new(&config.batch.field_pattern).map_err(|e| {
            SignboardError::Config(format!(
                "Invalid BATCH_FIELD_PATTERN '{}': {e}",
                config.batch.field_pattern
            ))
        })?;

        Ok(Self {
            engine,
            preprocessor: Preprocessor::new(PreprocessOptions::document(&config.ocr)),
            field_pattern,
            extensions: config.batch.extensions.clone(),
            write_pdf: true,
        })
    }

    pub fn with_pdf_output(mut self, write_pdf: bool) -> Self {
        self.write_pdf = write_pdf;
        self
    }

    pub fn scan_file(&self, path: &Path) -> Result<ScanReport> {
        let raster = self.preprocessor.process(load_image_file(path)?)?;
        let png = encode_png(&raster)?;

        let pdf_path = if self.write_pdf {
            let pdf = self.engine.searchable_pdf(&png)?;
            let target = sidecar_path(path);
            std::fs::write(&target, pdf)?;
            Some(target)
        } else {
            None
        };

        let text = self.engine.recognize(&png, &OcrProfile::AUTOMATIC)?;
        let field = extract_field(&self.field_pattern, &text);

        Ok(ScanReport {
            path: path.to_path_buf(),
            text,
            field,
            pdf_path,
        })
    }

    /// Scan every matching image; a failing file is recorded and skipped.
    pub fn scan(&self, dir: &Path) -> Result<BatchSummary> {
        let images = scan_directory(dir, &self.extensions)?;
        info!(dir = %dir.display(), count = images.len(), "Starting batch OCR");

        let mut summary = BatchSummary::default();
        for path in images {
            match self.scan_file(&path) {
                Ok(report) => {
                    info!(
                        file = %path.display(),
                        field = report.field.as_deref().unwrap_or("-"),
                        "Scanned document"
                    );
                    summary.reports.push(report);
                }
                Err(error) => {
                    warn!(file = %path.display(), "Failed to scan document: {}", error);
                    summary.failures.push(ScanFailure { path, error });
                }
            }
        }
        Ok(summary)
    }
}
