// src/summarize/chat_api.rs
// OpenAI chat-completions summarization adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{SummarizeAdapter, SummarizeRequest};
use crate::task::OperationError;

const CHAT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const TIMEOUT_SECS: u64 = 120;

// Deterministic output for clinical notes.
const TEMPERATURE: f32 = 0.0;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct ChatApiAdapter {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl ChatApiAdapter {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, CHAT_API_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        tracing::info!("Chat API adapter initialized");

        Self {
            api_key,
            endpoint,
            client,
        }
    }

    fn error_message(status: u16, body: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => parsed.error.message,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl SummarizeAdapter for ChatApiAdapter {
    async fn summarize(
        &self,
        request: &SummarizeRequest,
        model: &str,
        token: &CancellationToken,
    ) -> Result<String, OperationError> {
        tracing::info!(
            "Chat API: summarizing {} chars with model {}",
            request.content.len(),
            model
        );

        let body = ChatRequest {
            model,
            temperature: TEMPERATURE,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.content,
                },
            ],
        };

        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        tokio::pin!(send);

        // Response arm first: a result that is already in when the abort
        // lands is still honored.
        let response = tokio::select! {
            biased;
            response = &mut send => response,
            _ = token.cancelled() => return Err(OperationError::Cancelled),
        };

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let chat: ChatResponse =
                        resp.json().await.map_err(|e| OperationError::Provider {
                            status: None,
                            message: e.to_string(),
                        })?;
                    let content = chat
                        .choices
                        .first()
                        .map(|c| c.message.content.trim().to_string())
                        .unwrap_or_default();
                    if content.is_empty() {
                        return Err(OperationError::Provider {
                            status: None,
                            message: "No summary returned".to_string(),
                        });
                    }
                    Ok(content)
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
        "OpenAI Chat"
    }
}
