// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat backend trait and helpers shared by the HTTP adapters
//!
//! Every backend turns the conversation history into one raw model reply.
//! `<thinking>` stripping and protocol parsing happen later, in the
//! orchestrator.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;

use crate::config::Settings;
use crate::error::{AnswerBotError, ApiError, Result};
use crate::llm::message::Message;

/// Longest error body quoted back to the user.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Default provider rate-limit backoff when the server gives no hint.
const DEFAULT_RETRY_AFTER_SECS: u32 = 60;

/// One chat API behind a uniform call contract
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logs ("openai", "gemini", "ollama")
    fn name(&self) -> &str;

    /// Send the history and return the model's raw text reply.
    async fn send(&self, history: &[Message], settings: &Settings) -> Result<String>;

    /// Forget any session state; called when a new chat starts.
    fn reset(&self) {}
}

/// Build the HTTP client used for backend calls.
pub(crate) fn http_client(settings: &Settings) -> Result<Client> {
    Ok(Client::builder()
        .timeout(settings.request_timeout())
        .build()?)
}

/// Configuration errors that must surface before any network attempt.
pub(crate) fn ensure_sendable(history: &[Message], settings: &Settings) -> Result<()> {
    settings.validate()?;
    if history.is_empty() {
        return Err(AnswerBotError::Config(
            "Messages list cannot be empty.".to_string(),
        ));
    }
    Ok(())
}

/// API key for backends that require one.
pub(crate) fn require_api_key(settings: &Settings) -> Result<String> {
    settings.resolved_api_key().ok_or_else(|| {
        AnswerBotError::Config(format!("{} API key is missing.", settings.api_type))
    })
}

/// Map a transport failure from reqwest into our error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error, backend: &str, url: &str) -> AnswerBotError {
    if err.is_timeout() {
        AnswerBotError::Api(ApiError::Timeout)
    } else if err.is_connect() {
        AnswerBotError::Api(ApiError::Network(format!(
            "Could not connect to {} at {}",
            backend, url
        )))
    } else {
        AnswerBotError::Http(err)
    }
}

/// Map a non-success HTTP status to an error.
pub(crate) fn status_error(status: u16, headers: &HeaderMap, message: &str) -> AnswerBotError {
    let message = truncate_chars(message, MAX_ERROR_BODY_CHARS);
    let api_error = match status {
        401 | 403 => ApiError::AuthenticationFailed,
        429 => ApiError::RateLimited(
            parse_retry_after_seconds(headers).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        ),
        404 => ApiError::ModelNotFound(message),
        _ => ApiError::ServerError { status, message },
    };
    AnswerBotError::Api(api_error)
}

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Debug dump of the tail of the history before a call.
pub(crate) fn log_outbound(backend: &str, model: &str, history: &[Message]) {
    tracing::debug!(
        target: "answerbot.llm",
        backend,
        model,
        messages = history.len(),
        "calling backend"
    );
    let start = history.len().saturating_sub(5);
    for message in &history[start..] {
        tracing::trace!(
            target: "answerbot.llm",
            role = message.role.as_str(),
            content = %truncate_chars(&message.content, 100),
            "history tail"
        );
    }
}
