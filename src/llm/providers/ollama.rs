// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ollama local model backend
//!
//! Posts the flattened history to Ollama's /api/chat endpoint with
//! streaming disabled and reads back a single JSON object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{AnswerBotError, ApiError, Result};
use crate::llm::backend::{self, ChatBackend, MAX_ERROR_BODY_CHARS};
use crate::llm::message::{Message, Role};

/// Ollama local model backend
#[derive(Debug, Default)]
pub struct OllamaBackend;

impl OllamaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Flatten history for /api/chat. Tool turns become user turns; empty
    /// turns are dropped except assistant ones, which keep alternation intact.
    fn convert_messages(history: &[Message]) -> Vec<OllamaMessage<'_>> {
        history
            .iter()
            .filter(|m| !m.content.is_empty() || m.role == Role::Assistant)
            .map(|m| OllamaMessage {
                role: match m.role {
                    Role::Tool => "user",
                    other => other.as_str(),
                },
                content: &m.content,
            })
            .collect()
    }

    fn parse_error(status: u16, headers: &reqwest::header::HeaderMap, body: &str) -> AnswerBotError {
        match serde_json::from_str::<OllamaError>(body) {
            Ok(error_response) => {
                let message = error_response.error;
                if message.contains("model") && message.contains("not found") {
                    AnswerBotError::Api(ApiError::ModelNotFound(message))
                } else {
                    backend::status_error(status, headers, &message)
                }
            }
            Err(_) => backend::status_error(status, headers, body),
        }
    }

    /// Pull `message.content` out of a reply, or explain why it is not there.
    fn extract_content(body: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
            AnswerBotError::Api(ApiError::InvalidResponse(format!(
                "Failed to decode JSON from Ollama ({}): {}",
                e,
                backend::truncate_chars(body, MAX_ERROR_BODY_CHARS)
            )))
        })?;

        if let Some(content) = value.get("message").and_then(|m| m.get("content")) {
            if let Some(text) = content.as_str() {
                return Ok(text.to_string());
            }
            // A present but null content is an empty reply
            if content.is_null() {
                return Ok(String::new());
            }
        }

        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(AnswerBotError::Api(ApiError::InvalidResponse(format!(
                "Ollama API Error: {}",
                message
            ))));
        }

        Err(AnswerBotError::Api(ApiError::InvalidResponse(format!(
            "Ollama returned an unexpected response format: {}",
            backend::truncate_chars(&value.to_string(), MAX_ERROR_BODY_CHARS)
        ))))
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, history: &[Message], settings: &Settings) -> Result<String> {
        backend::ensure_sendable(history, settings)?;
        let base_url = settings
            .endpoint_url()
            .ok_or_else(|| AnswerBotError::Config("Ollama endpoint URL is missing.".to_string()))?
            .trim_end_matches('/');
        let url = format!("{}/api/chat", base_url);

        backend::log_outbound(self.name(), &settings.model, history);

        let body = OllamaRequest {
            model: &settings.model,
            messages: Self::convert_messages(history),
            stream: false,
        };

        let response = backend::http_client(settings)?
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AnswerBotError::Api(ApiError::Network(format!(
                        "Could not connect to Ollama at {}. Is Ollama running? Start the Ollama app or run 'ollama serve'",
                        url
                    )))
                } else {
                    backend::transport_error(e, "Ollama", &url)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &headers, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| backend::transport_error(e, "Ollama", &url))?;
        let content = Self::extract_content(&body)?;
        tracing::debug!(target: "answerbot.llm.ollama", chars = content.len(), "received reply");
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}
