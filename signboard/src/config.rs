use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        _ => None,
    }
}

/// Parse a comma-separated env var into trimmed, non-empty items.
fn parse_env_list(var: &str, default: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Parse `OCR_PROFILES`.
/// Format: comma-separated page segmentation modes, e.g. `3,6,11,12`
fn parse_page_segmentation_modes() -> Vec<u8> {
    let raw = parse_env_list("OCR_PROFILES", &["3", "6", "11", "12"]);
    let modes: Vec<u8> = raw
        .iter()
        .filter_map(|item| match item.parse::<u8>() {
            Ok(mode) if mode <= 13 => Some(mode),
            _ => {
                tracing::warn!("Invalid page segmentation mode '{}' in OCR_PROFILES, skipping", item);
                None
            }
        })
        .collect();

    if modes.is_empty() {
        vec![3, 6, 11, 12]
    } else {
        modes
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Base URL used when building `audio_url`; derived from the `Host` header when unset.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// `cli/tesseract` drives the tesseract binary, `local/tesseract` uses libtesseract.
    pub model: String,
    pub tesseract_path: String,
    pub tessdata_dir: Option<String>,
    pub languages: String,
    pub timeout_secs: u64,
    pub page_segmentation_modes: Vec<u8>,
    pub engine_mode: u8,
    pub min_text_length: usize,
    pub upscale_factor: u32,
    pub max_upscaled_dimension: u32,
    pub min_image_dimension: u32,
    pub debug_image_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    /// One of `google`, `mymemory`, `libretranslate`.
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_target: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// `google` or `gemini/<model>`.
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub voice: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub dir: Option<String>,
    pub capacity: usize,
    pub delete_after_fetch: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub extensions: Vec<String>,
    pub field_pattern: String,
}

pub const DEFAULT_FIELD_PATTERN: &str = r"(?i)(Invoice No|INV|Ref)[:\s]*([\w/]+)";

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "cli/tesseract".to_string(),
            tesseract_path: "tesseract".to_string(),
            tessdata_dir: None,
            languages: "eng".to_string(),
            timeout_secs: 60,
            page_segmentation_modes: vec![3, 6, 11, 12],
            engine_mode: 3,
            min_text_length: 2,
            upscale_factor: 3,
            max_upscaled_dimension: 6000,
            min_image_dimension: 8,
            debug_image_path: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: "google".to_string(),
            api_key: None,
            base_url: None,
            default_target: "en".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "google".to_string(),
            api_key: None,
            base_url: None,
            voice: "Puck".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: None,
            capacity: 64,
            delete_after_fetch: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SIGNBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("SIGNBOARD_PORT", 5000),
                max_upload_bytes: parse_env_or("SERVER_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
                public_url: parse_env_opt("SIGNBOARD_PUBLIC_URL"),
            },
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or_else(|_| "cli/tesseract".to_string()),
                tesseract_path: env::var("TESSERACT_PATH")
                    .unwrap_or_else(|_| "tesseract".to_string()),
                tessdata_dir: parse_env_opt("TESSDATA_DIR"),
                languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| "eng".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
                page_segmentation_modes: parse_page_segmentation_modes(),
                engine_mode: parse_env_or("OCR_ENGINE_MODE", 3),
                min_text_length: parse_env_or("OCR_MIN_TEXT_LENGTH", 2),
                upscale_factor: parse_env_or("OCR_UPSCALE_FACTOR", 3),
                max_upscaled_dimension: parse_env_or("OCR_MAX_UPSCALED_DIMENSION", 6000),
                min_image_dimension: parse_env_or("OCR_MIN_DIMENSION", 8),
                debug_image_path: parse_env_opt("OCR_DEBUG_IMAGE_PATH"),
            },
            translation: TranslationConfig {
                model: env::var("TRANSLATION_PROVIDER").unwrap_or_else(|_| "google".to_string()),
                api_key: parse_env_opt("TRANSLATION_API_KEY"),
                base_url: parse_env_opt("TRANSLATION_BASE_URL"),
                default_target: env::var("TRANSLATION_TARGET_LANG")
                    .unwrap_or_else(|_| "en".to_string()),
                timeout_secs: parse_env_or("TRANSLATION_TIMEOUT", 30),
            },
            speech: SpeechConfig {
                model: env::var("SPEECH_PROVIDER").unwrap_or_else(|_| "google".to_string()),
                api_key: parse_env_opt("SPEECH_API_KEY"),
                base_url: parse_env_opt("SPEECH_BASE_URL"),
                voice: env::var("SPEECH_VOICE").unwrap_or_else(|_| "Puck".to_string()),
                timeout_secs: parse_env_or("SPEECH_TIMEOUT", 60),
            },
            audio: AudioConfig {
                dir: parse_env_opt("AUDIO_DIR"),
                capacity: parse_env_or("AUDIO_CAPACITY", 64),
                delete_after_fetch: parse_env_or("AUDIO_DELETE_AFTER_FETCH", true),
            },
            batch: BatchConfig {
                extensions: parse_env_list("BATCH_EXTENSIONS", &["png", "jpg", "jpeg", "tiff", "tif"])
                    .into_iter()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase())
                    .collect(),
                field_pattern: env::var("BATCH_FIELD_PATTERN")
                    .unwrap_or_else(|_| DEFAULT_FIELD_PATTERN.to_string()),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Split a `provider/model` selector into its parts.
///
/// A bare `provider` yields `None` for the model. Provider names are lowercased.
pub fn parse_provider_model(model: &str) -> (String, Option<&str>) {
    match model.split_once('/') {
        Some((provider, rest)) => {
            let rest = rest.trim();
            (
                provider.trim().to_lowercase(),
                (!rest.is_empty()).then_some(rest),
            )
        }
        None => (model.trim().to_lowercase(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_provider_model_with_model() {
        let (provider, model) = parse_provider_model("gemini/gemini-2.5-flash-preview-tts");
        assert_eq!(provider, "gemini");
        assert_eq!(model, Some("gemini-2.5-flash-preview-tts"));
    }

    #[test]
    fn test_parse_provider_model_bare_provider() {
        let (provider, model) = parse_provider_model("Google");
        assert_eq!(provider, "google");
        assert_eq!(model, None);
    }

    #[test]
    fn test_parse_provider_model_trailing_slash() {
        let (provider, model) = parse_provider_model("cli/");
        assert_eq!(provider, "cli");
        assert_eq!(model, None);
    }

    #[test]
    #[serial]
    fn test_ocr_profiles_default() {
        std::env::remove_var("OCR_PROFILES");
        let config = Config::default();
        assert_eq!(config.ocr.page_segmentation_modes, vec![3, 6, 11, 12]);
    }

    #[test]
    #[serial]
    fn test_ocr_profiles_skip_invalid_entries() {
        std::env::set_var("OCR_PROFILES", "6, banana, 99, 7");
        let config = Config::default();
        assert_eq!(config.ocr.page_segmentation_modes, vec![6, 7]);
        std::env::remove_var("OCR_PROFILES");
    }

    #[test]
    #[serial]
    fn test_ocr_profiles_all_invalid_falls_back() {
        std::env::set_var("OCR_PROFILES", "x,y");
        let config = Config::default();
        assert_eq!(config.ocr.page_segmentation_modes, vec![3, 6, 11, 12]);
        std::env::remove_var("OCR_PROFILES");
    }

    #[test]
    #[serial]
    fn test_batch_extensions_normalized() {
        std::env::set_var("BATCH_EXTENSIONS", ".PNG, jpg");
        let config = Config::default();
        assert_eq!(config.batch.extensions, vec!["png", "jpg"]);
        std::env::remove_var("BATCH_EXTENSIONS");
    }

    #[test]
    #[serial]
    fn test_parse_env_or_invalid_value_uses_default() {
        std::env::set_var("__TEST_PARSE_PORT", "not-a-port");
        let result: u16 = parse_env_or("__TEST_PARSE_PORT", 5000);
        assert_eq!(result, 5000);
        std::env::remove_var("__TEST_PARSE_PORT");
    }

    #[test]
    #[serial]
    fn test_parse_env_opt_blank_is_none() {
        std::env::set_var("__TEST_PARSE_OPT", "   ");
        let result: Option<String> = parse_env_opt("__TEST_PARSE_OPT");
        assert!(result.is_none());
        std::env::remove_var("__TEST_PARSE_OPT");
    }
}
