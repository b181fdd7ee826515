use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::OcrConfig;

/// One Tesseract configuration to try against an image.
///
/// `page_segmentation` is the `--psm` value and `engine_mode` the `--oem` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OcrProfile {
    pub page_segmentation: u8,
    pub engine_mode: u8,
}

impl OcrProfile {
    pub const AUTOMATIC: OcrProfile = OcrProfile::new(3, 3);
    pub const SINGLE_BLOCK: OcrProfile = OcrProfile::new(6, 3);
    pub const SPARSE_TEXT: OcrProfile = OcrProfile::new(11, 3);
    pub const SPARSE_TEXT_OSD: OcrProfile = OcrProfile::new(12, 3);

    pub const fn new(page_segmentation: u8, engine_mode: u8) -> Self {
        Self {
            page_segmentation,
            engine_mode,
        }
    }

    /// The profiles tried for signboard photos: automatic layout, one block,
    /// and the two sparse-text modes.
    pub fn defaults() -> Vec<OcrProfile> {
        vec![
            Self::AUTOMATIC,
            Self::SINGLE_BLOCK,
            Self::SPARSE_TEXT,
            Self::SPARSE_TEXT_OSD,
        ]
    }

    pub fn from_config(config: &OcrConfig) -> Vec<OcrProfile> {
        if config.page_segmentation_modes.is_empty() {
            return Self::defaults();
        }
        config
            .page_segmentation_modes
            .iter()
            .map(|&psm| OcrProfile::new(psm, config.engine_mode))
            .collect()
    }

    /// Command-line arguments for the tesseract binary.
    pub fn args(&self) -> [String; 4] {
        [
            "--oem".to_string(),
            self.engine_mode.to_string(),
            "--psm".to_string(),
            self.page_segmentation.to_string(),
        ]
    }

    pub fn layout_name(&self) -> &'static str {
        match self.page_segmentation {
            0 => "orientation and script detection only",
            1 => "automatic with OSD",
            2 => "automatic without OCR",
            3 => "fully automatic",
            4 => "single column",
            5 => "single vertical block",
            6 => "single uniform block",
            7 => "single line",
            8 => "single word",
            9 => "single word in a circle",
            10 => "single character",
            11 => "sparse text",
            12 => "sparse text with OSD",
            13 => "raw line",
            _ => "unknown",
        }
    }
}

impl fmt::Display for OcrProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--oem {} --psm {}",
            self.engine_mode, self.page_segmentation
        )
    }
}

impl Serialize for OcrProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
