// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for AnswerBot
//!
//! Protocol errors stay inside the automatic loop; everything else halts it.

use thiserror::Error;

use crate::protocol::ParseError;

/// Main error type for AnswerBot operations
#[derive(Error, Debug)]
pub enum AnswerBotError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors (raised before any network attempt)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model output did not follow the tag protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AnswerBotError {
    /// Whether this error must halt the automatic request loop.
    ///
    /// Protocol errors are recoverable: the model gets a failure result
    /// message and another chance. Everything else needs the user.
    pub fn is_backend_failure(&self) -> bool {
        !matches!(self, AnswerBotError::Protocol(_))
    }
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the provider
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Provider refused to answer (safety filter, blocked prompt)
    #[error("Response blocked: {0}")]
    Blocked(String),
}

/// Result type alias for AnswerBot operations
pub type Result<T> = std::result::Result<T, AnswerBotError>;
