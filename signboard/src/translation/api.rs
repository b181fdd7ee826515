use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ServiceTranslation;
use crate::http::{
    base_url, build_client, error_body, map_http_error, map_send_error, ErrorKind,
};
use crate::{
    config::TranslationConfig,
    error::{Result, SignboardError},
};

const GOOGLE_BASE_URL: &str = "https://translate.googleapis.com";
const MYMEMORY_BASE_URL: &str = "https://api.mymemory.translated.net";
const LIBRETRANSLATE_BASE_URL: &str = "https://libretranslate.com";

const ERROR_KIND: ErrorKind = SignboardError::Translation;

/// The public Google Translate web endpoint (`translate_a/single`).
#[derive(Debug, Clone)]
pub struct GoogleTranslateClient {
    client: Client,
    base_url: String,
}

impl GoogleTranslateClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, ERROR_KIND)?,
            base_url: base_url(config.base_url.as_deref(), GOOGLE_BASE_URL),
        })
    }

    pub(crate) async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<ServiceTranslation> {
        let url = format!("{}/translate_a/single", self.base_url);
        debug!("Sending translation request to {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.unwrap_or("auto")),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| map_send_error(ERROR_KIND, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(map_http_error(ERROR_KIND, "Google Translate", status, &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            SignboardError::Translation(format!("Failed to parse translation response: {e}"))
        })?;

        parse_google_response(&body)
    }
}

/// The payload is positional: `[[[translated, original, ...], ...], null, "detected", ...]`.
fn parse_google_response(body: &Value) -> Result<ServiceTranslation> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SignboardError::Translation("Unexpected translation response shape".to_string())
        })?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(SignboardError::Translation(
            "Translation response contained empty text".to_string(),
        ));
    }

    Ok(ServiceTranslation {
        text,
        detected_language: body.get(2).and_then(Value::as_str).map(String::from),
    })
}

/// MyMemory `get` endpoint.
#[derive(Debug, Clone)]
pub struct MyMemoryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MyMemoryClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, ERROR_KIND)?,
            base_url: base_url(config.base_url.as_deref(), MYMEMORY_BASE_URL),
            api_key: config.api_key.clone(),
        })
    }

    pub(crate) async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<ServiceTranslation> {
        let url = format!("{}/get", self.base_url);
        let langpair = format!("{}|{}", source.unwrap_or("autodetect"), target);
        debug!("Sending translation request to {}", url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("q", text), ("langpair", langpair.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(ERROR_KIND, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(map_http_error(ERROR_KIND, "MyMemory", status, &body));
        }

        let body: MyMemoryResponse = response.json().await.map_err(|e| {
            SignboardError::Translation(format!("Failed to parse translation response: {e}"))
        })?;

        // MyMemory reports quota and validation failures with HTTP 200.
        let service_status = match &body.response_status {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        if service_status != Some(200) {
            return Err(SignboardError::Translation(format!(
                "MyMemory error ({}): {}",
                body.response_status,
                body.response_details.unwrap_or_default()
            )));
        }

        if body.response_data.translated_text.trim().is_empty() {
            return Err(SignboardError::Translation(
                "Translation response contained empty text".to_string(),
            ));
        }

        Ok(ServiceTranslation {
            text: body.response_data.translated_text,
            detected_language: body.response_data.detected_language,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_data: MyMemoryData,
    response_status: Value,
    #[serde(default)]
    response_details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryData {
    translated_text: String,
    #[serde(default)]
    detected_language: Option<String>,
}

/// LibreTranslate `POST /translate`.
#[derive(Debug, Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreTranslateResponse {
    translated_text: String,
    #[serde(default)]
    detected_language: Option<LibreDetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct LibreDetectedLanguage {
    language: String,
}

impl LibreTranslateClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, ERROR_KIND)?,
            base_url: base_url(config.base_url.as_deref(), LIBRETRANSLATE_BASE_URL),
            api_key: config.api_key.clone(),
        })
    }

    pub(crate) async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<ServiceTranslation> {
        let url = format!("{}/translate", self.base_url);
        debug!("Sending translation request to {}", url);

        let request = LibreTranslateRequest {
            q: text,
            source: source.unwrap_or("auto"),
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(ERROR_KIND, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(map_http_error(ERROR_KIND, "LibreTranslate", status, &body));
        }

        let body: LibreTranslateResponse = response.json().await.map_err(|e| {
            SignboardError::Translation(format!("Failed to parse translation response: {e}"))
        })?;

        Ok(ServiceTranslation {
            text: body.translated_text,
            detected_language: body.detected_language.map(|d| d.language),
        })
    }
}
