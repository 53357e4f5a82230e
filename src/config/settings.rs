// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for AnswerBot
//!
//! Handles loading and saving settings from ~/.answerbot/settings.json

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

mod io;
mod migration;
mod validation;

/// Upper bound for the minimum interval between calls.
pub const MAX_RATE_LIMIT_SECONDS: f64 = 3600.0;

/// Which chat backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ApiType {
    /// OpenAI-compatible chat completions (stateless, full history per call)
    OpenAI,
    /// Google Gemini (turn-based, keeps a chat session)
    Gemini,
    /// Local Ollama server via /api/chat
    #[default]
    Ollama,
}

impl ApiType {
    /// Whether this backend accepts a dedicated system-role message.
    pub fn supports_system_role(&self) -> bool {
        matches!(self, ApiType::OpenAI | ApiType::Ollama)
    }

    /// Whether this backend needs an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ApiType::OpenAI | ApiType::Gemini)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::OpenAI => "OpenAI",
            ApiType::Gemini => "Gemini",
            ApiType::Ollama => "Ollama",
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ApiType::OpenAI),
            "gemini" => Ok(ApiType::Gemini),
            "ollama" => Ok(ApiType::Ollama),
            other => Err(format!(
                "unsupported API type '{}' (expected OpenAI, Gemini or Ollama)",
                other
            )),
        }
    }
}

/// Main settings structure, stored in ~/.answerbot/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Backend to use
    #[serde(default)]
    pub api_type: ApiType,

    /// API key (if stored directly; the env var takes priority)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Custom base URL for the OpenAI-compatible backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_endpoint_url: Option<String>,

    /// Custom base URL for Gemini
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_endpoint_url: Option<String>,

    /// Ollama server base URL
    #[serde(default = "default_ollama_endpoint_url")]
    pub ollama_endpoint_url: String,

    /// Model name passed to the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum delay between outbound calls
    #[serde(default = "default_rate_limit_seconds")]
    pub rate_limit_seconds: f64,

    /// Send the system prompt as a dedicated system message when the backend allows it
    #[serde(default = "default_true", alias = "openai_system_prompt_support")]
    pub use_system_role: bool,

    /// HTTP timeout for a single backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_type: ApiType::default(),
            api_key: None,
            api_key_env: default_api_key_env(),
            openai_endpoint_url: None,
            gemini_endpoint_url: None,
            ollama_endpoint_url: default_ollama_endpoint_url(),
            model: default_model(),
            rate_limit_seconds: default_rate_limit_seconds(),
            use_system_role: true,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    /// Minimum interval between outbound calls, capped at
    /// [`MAX_RATE_LIMIT_SECONDS`].
    pub fn rate_limit(&self) -> Duration {
        if !self.rate_limit_seconds.is_finite() || self.rate_limit_seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.rate_limit_seconds.min(MAX_RATE_LIMIT_SECONDS))
            .unwrap_or(Duration::ZERO)
    }

    /// Request timeout for backend HTTP clients.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Endpoint configured for the active backend, if any.
    pub fn endpoint_url(&self) -> Option<&str> {
        let url = match self.api_type {
            ApiType::OpenAI => self.openai_endpoint_url.as_deref(),
            ApiType::Gemini => self.gemini_endpoint_url.as_deref(),
            ApiType::Ollama => Some(self.ollama_endpoint_url.as_str()),
        };
        url.map(str::trim).filter(|u| !u.is_empty())
    }

    /// Whether the first turn should carry a dedicated system message.
    pub fn uses_system_message(&self) -> bool {
        self.api_type.supports_system_role() && self.use_system_role
    }
}

fn default_api_key_env() -> String {
    "ANSWERBOT_API_KEY".to_string()
}

fn default_ollama_endpoint_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_rate_limit_seconds() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    120
}
