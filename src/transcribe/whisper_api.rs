// src/transcribe/whisper_api.rs
// OpenAI Whisper transcription adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{AudioPayload, TranscribeAdapter};
use crate::task::OperationError;

const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const TIMEOUT_SECS: u64 = 120;
const RESPONSE_FORMAT: &str = "json";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct WhisperApiAdapter {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl WhisperApiAdapter {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, WHISPER_API_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        tracing::info!("Whisper API adapter initialized");

        Self {
            api_key,
            endpoint,
            client,
        }
    }

    /// Pull the provider's human-readable message out of an error body so the
    /// display layer can match it against known phrasings.
    fn error_message(status: u16, body: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => parsed.error.message,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl TranscribeAdapter for WhisperApiAdapter {
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        model: &str,
        token: &CancellationToken,
    ) -> Result<String, OperationError> {
        tracing::info!(
            "Whisper API: transcribing '{}' ({} bytes) with model {}",
            audio.file_name,
            audio.bytes.len(),
            model
        );

        let file_part = multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime)
            .map_err(|e| OperationError::Provider {
                status: None,
                message: e.to_string(),
            })?;

        let form = multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", RESPONSE_FORMAT)
            .part("file", file_part);

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send();
        tokio::pin!(request);

        // Response arm first: a result that is already in when the abort
        // lands is still honored.
        let response = tokio::select! {
            biased;
            response = &mut request => response,
            _ = token.cancelled() => return Err(OperationError::Cancelled),
        };

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let parsed: TranscriptionResponse =
                        resp.json().await.map_err(|e| OperationError::Provider {
                            status: None,
                            message: e.to_string(),
                        })?;
                    let text = parsed.text.trim().to_string();
                    if text.is_empty() {
                        return Err(OperationError::Provider {
                            status: None,
                            message: "Empty transcript".to_string(),
                        });
                    }
                    Ok(text)
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    Err(OperationError::Provider {
                        status: Some(status.as_u16()),
                        message: Self::error_message(status.as_u16(), &body),
                    })
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(OperationError::Network("request timed out".to_string()))
                } else {
                    Err(OperationError::Network(e.to_string()))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "OpenAI Whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided: sk-abc","type":"invalid_request_error"}}"#;
        assert_eq!(
            WhisperApiAdapter::error_message(401, body),
            "Incorrect API key provided: sk-abc"
        );
    }

    #[test]
    fn error_message_falls_back_to_raw_body_then_status() {
        assert_eq!(
            WhisperApiAdapter::error_message(502, "bad gateway"),
            "bad gateway"
        );
        assert_eq!(WhisperApiAdapter::error_message(500, "  "), "HTTP 500");
    }
}
