// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible chat completions backend
//!
//! Stateless: every call carries the full history, system message included.
//! Works with any server that speaks the `/chat/completions` dialect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{AnswerBotError, ApiError, Result};
use crate::llm::backend::{self, ChatBackend};
use crate::llm::message::{Message, Role};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Default)]
pub struct OpenAiBackend;

impl OpenAiBackend {
    pub fn new() -> Self {
        Self
    }

    fn convert_messages(history: &[Message]) -> Vec<WireMessage<'_>> {
        history
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Tool => "user",
                    other => other.as_str(),
                },
                content: &m.content,
            })
            .collect()
    }

    fn parse_error(status: u16, headers: &reqwest::header::HeaderMap, body: &str) -> AnswerBotError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let code = envelope.error.code.as_deref().unwrap_or("");
                match code {
                    "invalid_api_key" => AnswerBotError::Api(ApiError::AuthenticationFailed),
                    "model_not_found" => {
                        AnswerBotError::Api(ApiError::ModelNotFound(envelope.error.message))
                    }
                    _ => backend::status_error(status, headers, &envelope.error.message),
                }
            }
            Err(_) => backend::status_error(status, headers, body),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, history: &[Message], settings: &Settings) -> Result<String> {
        backend::ensure_sendable(history, settings)?;
        let api_key = backend::require_api_key(settings)?;
        let base_url = settings
            .endpoint_url()
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/');
        let url = format!("{}/chat/completions", base_url);

        backend::log_outbound(self.name(), &settings.model, history);

        let body = ChatRequest {
            model: &settings.model,
            messages: Self::convert_messages(history),
        };

        let response = backend::http_client(settings)?
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| backend::transport_error(e, "OpenAI", &url))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &headers, &body));
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            AnswerBotError::Api(ApiError::InvalidResponse(format!(
                "OpenAI returned an unexpected response: {}",
                e
            )))
        })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            AnswerBotError::Api(ApiError::InvalidResponse(
                "OpenAI response contained no choices".to_string(),
            ))
        })?;

        // A null content is an empty reply, not a transport failure
        let content = choice.message.content.unwrap_or_default();
        tracing::debug!(
            target: "answerbot.llm.openai",
            chars = content.len(),
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "received completion"
        );
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}
