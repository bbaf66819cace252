// OCR.space-style text recognition over HTTP.
//
// The service takes a form with the image URL and language and answers with
// JSON: `ParsedResults[].ParsedText`, plus `IsErroredOnProcessing` and
// `ErrorMessage` on failure.

use crate::core::media::{OcrError, OcrService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

fn extract_text(body: &str) -> Result<String, OcrError> {
    let response: OcrResponse =
        serde_json::from_str(body).map_err(|e| OcrError::Service(e.to_string()))?;

    if response.is_errored_on_processing {
        let detail = response
            .error_message
            .map(|m| m.to_string())
            .unwrap_or_else(|| "processing error".to_string());
        return Err(OcrError::Service(detail));
    }

    let text = response
        .parsed_results
        .into_iter()
        .map(|r| r.parsed_text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return Err(OcrError::Empty);
    }
    Ok(text)
}

pub struct HttpOcrClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcrClient {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl OcrService for HttpOcrClient {
    async fn recognize_text(&self, image_url: &str, language: &str) -> Result<String, OcrError> {
        let api_key = self.api_key.as_deref().unwrap_or("helloworld");
        let form = [
            ("apikey", api_key),
            ("url", image_url),
            ("language", language),
            ("scale", "true"),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::TimedOut
                } else {
                    OcrError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OcrError::Service(e.to_string()))?;
        if !status.is_success() {
            return Err(OcrError::Service(format!("{} - {}", status, body)));
        }

        extract_text(&body)
    }
}
