use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::core::config::PipelineConfig;
use crate::core::errors::{AppError, AppResult};
use crate::providers::Translator;

/// Longest text the public endpoint accepts in one request.
pub const MAX_CHUNK_CHARS: usize = 5000;

/// Client for the public Google Translate `translate_a/single` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslateClient {
    http: reqwest::Client,
    endpoint: String,
    source_lang: String,
    target_lang: String,
}

impl GoogleTranslateClient {
    pub fn new(
        endpoint: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Network(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> AppResult<Self> {
        Self::new(
            config.translate_endpoint.clone(),
            config.source_lang.clone(),
            config.target_lang.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn translate_chunk(&self, chunk: &str) -> AppResult<String> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source_lang.as_str()),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", chunk),
            ])
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::ProviderTimeout
                } else {
                    AppError::Network(err.to_string())
                }
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(AppError::ProviderRateLimited),
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::URI_TOO_LONG => {
                let status = response.status();
                return Err(AppError::Translation(format!("service rejected text ({status})")));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ProviderInvalidResponse(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AppError::ProviderInvalidResponse(err.to_string()))?;
        parse_gtx_response(&body)
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str) -> AppResult<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let mut translated = Vec::new();
        for chunk in split_into_chunks(text, MAX_CHUNK_CHARS) {
            if chunk.trim().is_empty() {
                translated.push(chunk);
            } else {
                translated.push(self.translate_chunk(&chunk).await?);
            }
        }
        Ok(translated.join("\n"))
    }
}

/// The endpoint answers with `[[["translated", "source", ...], ...], ...]`;
/// the translation is the concatenation of the first field of each segment.
pub fn parse_gtx_response(body: &Value) -> AppResult<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::ProviderInvalidResponse("missing translation segments".to_string()))?;

    let mut text = String::new();
    for segment in segments {
        if let Some(part) = segment.get(0).and_then(Value::as_str) {
            text.push_str(part);
        }
    }
    Ok(text)
}

/// Split on line boundaries into chunks of at most `max_chars` characters.
/// Lines longer than the limit are cut at character boundaries.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.split('\n') {
        let line_chars = line.chars().count();

        if line_chars > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { line_chars } else { current_chars + 1 + line_chars };
        if needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
