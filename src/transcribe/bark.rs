// src/transcribe/bark.rs
// TalTech Bark subtitling endpoint adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::subtitles::strip_subtitle_markers;
use super::{AudioPayload, TranscribeAdapter};
use crate::task::OperationError;

const BARK_API_URL: &str = "https://bark.cs.taltech.ee/subtitreeri/gradio_api/call/predict";
const TIMEOUT_SECS: u64 = 300;

/// The submit call answers with the id of the prediction to poll.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Keyless Estonian speech-to-subtitles service. The result arrives as a raw
/// subtitle document, so the transcript is recovered by stripping the
/// subtitle markers.
pub struct BarkAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl BarkAdapter {
    pub fn new() -> Self {
        Self::with_endpoint(BARK_API_URL.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        tracing::info!("Bark adapter initialized");

        Self { endpoint, client }
    }

    fn provider_error(status: u16, body: String) -> OperationError {
        OperationError::Provider {
            status: Some(status),
            message: if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            },
        }
    }

    async fn submit(&self, audio: &AudioPayload) -> Result<String, OperationError> {
        let file_part = multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime)
            .map_err(|e| OperationError::Provider {
                status: None,
                message: e.to_string(),
            })?;
        let form = multipart::Form::new().part("file", file_part);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::provider_error(status.as_u16(), body));
        }

        let submit: SubmitResponse = resp.json().await.map_err(|e| OperationError::Provider {
            status: None,
            message: format!("API did not return JSON: {}", e),
        })?;

        submit
            .data
            .first()
            .and_then(|v| v.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| OperationError::Provider {
                status: None,
                message: "No event ID returned from API".to_string(),
            })
    }

    async fn fetch_result(&self, event_id: &str) -> Result<String, OperationError> {
        let resp = self
            .client
            .get(format!("{}/{}", self.endpoint, event_id))
            .send()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::provider_error(status.as_u16(), body));
        }

        resp.text()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))
    }

    async fn run(&self, audio: &AudioPayload) -> Result<String, OperationError> {
        let event_id = self.submit(audio).await?;
        let raw = self.fetch_result(&event_id).await?;
        let text = strip_subtitle_markers(&raw);
        if text.is_empty() {
            return Err(OperationError::Provider {
                status: None,
                message: "Empty transcript".to_string(),
            });
        }
        Ok(text)
    }
}

impl Default for BarkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscribeAdapter for BarkAdapter {
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        model: &str,
        token: &CancellationToken,
    ) -> Result<String, OperationError> {
        tracing::info!(
            "Bark: transcribing '{}' ({} bytes), model hint '{}'",
            audio.file_name,
            audio.bytes.len(),
            model
        );

        let call = self.run(audio);
        tokio::pin!(call);

        // Response arm first so a finished prediction beats a late abort.
        tokio::select! {
            biased;
            result = &mut call => result,
            _ = token.cancelled() => Err(OperationError::Cancelled),
        }
    }

    fn name(&self) -> &str {
        "TalTech Bark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_extracts_first_string_id() {
        let parsed: SubmitResponse =
            serde_json::from_str(r#"{"data":["abc123","ignored"]}"#).unwrap();
        assert_eq!(parsed.data.first().and_then(|v| v.as_str()), Some("abc123"));
    }

    #[test]
    fn submit_response_without_data_is_empty() {
        let parsed: SubmitResponse = serde_json::from_str(r#"{"other":1}"#).unwrap();
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn provider_error_uses_body_when_present() {
        let err = BarkAdapter::provider_error(503, "service warming up".to_string());
        assert_eq!(err.to_string(), "service warming up");

        let err = BarkAdapter::provider_error(503, String::new());
        assert_eq!(err.to_string(), "HTTP 503");
    }
}
