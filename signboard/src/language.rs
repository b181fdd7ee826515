//! Language names and codes accepted by the front ends.
//!
//! Translation and speech services disagree on a few codes (Chinese is
//! `zh-CN` for translation but `zh-cn` for speech), so each entry carries both.

use crate::error::{Result, SignboardError};

/// A language known to both the translation and speech adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub translation_code: &'static str,
    pub speech_code: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { name: "English", translation_code: "en", speech_code: "en" },
    Language { name: "Hindi", translation_code: "hi", speech_code: "hi" },
    Language { name: "Tamil", translation_code: "ta", speech_code: "ta" },
    Language { name: "Telugu", translation_code: "te", speech_code: "te" },
    Language { name: "Marathi", translation_code: "mr", speech_code: "mr" },
    Language { name: "Bengali", translation_code: "bn", speech_code: "bn" },
    Language { name: "Kannada", translation_code: "kn", speech_code: "kn" },
    Language { name: "Malayalam", translation_code: "ml", speech_code: "ml" },
    Language { name: "Spanish", translation_code: "es", speech_code: "es" },
    Language { name: "French", translation_code: "fr", speech_code: "fr" },
    Language { name: "German", translation_code: "de", speech_code: "de" },
    Language { name: "Chinese", translation_code: "zh-CN", speech_code: "zh-cn" },
];

/// Pair of codes to use for one target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    pub translation_code: String,
    pub speech_code: String,
}

/// Look up a language by display name or by either of its codes (case-insensitive).
pub fn find_language(input: &str) -> Option<&'static Language> {
    let needle = input.trim();
    SUPPORTED_LANGUAGES.iter().find(|lang| {
        lang.name.eq_ignore_ascii_case(needle)
            || lang.translation_code.eq_ignore_ascii_case(needle)
            || lang.speech_code.eq_ignore_ascii_case(needle)
    })
}

/// Whether `code` has the shape of a BCP-47-ish language code (`fr`, `pt-BR`, `yue`).
fn looks_like_code(code: &str) -> bool {
    let mut parts = code.split('-');
    let primary = parts.next().unwrap_or_default();
    let primary_ok = (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic());
    primary_ok
        && parts.all(|region| {
            (2..=4).contains(&region.len()) && region.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

/// Resolve a user-supplied target language into service codes.
///
/// Known names and codes map through [`SUPPORTED_LANGUAGES`]; other
/// well-formed codes pass through unchanged so services can decide.
pub fn resolve_target(input: &str) -> Result<TargetLanguage> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SignboardError::InvalidRequest(
            "Target language cannot be empty".to_string(),
        ));
    }

    if let Some(lang) = find_language(trimmed) {
        return Ok(TargetLanguage {
            translation_code: lang.translation_code.to_string(),
            speech_code: lang.speech_code.to_string(),
        });
    }

    if looks_like_code(trimmed) {
        return Ok(TargetLanguage {
            translation_code: trimmed.to_string(),
            speech_code: trimmed.to_lowercase(),
        });
    }

    Err(SignboardError::InvalidRequest(format!(
        "Unsupported language: {trimmed}"
    )))
}

/// Normalize an optional source hint; blank or `auto` means "detect".
pub fn resolve_source(input: Option<&str>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return None;
    }
    Some(
        find_language(trimmed)
            .map(|lang| lang.translation_code.to_string())
            .unwrap_or_else(|| trimmed.to_string()),
    )
}
