// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AnswerBotError, Result};

use super::{ApiType, Settings, MAX_RATE_LIMIT_SECONDS};

impl Settings {
    /// Get the API key, checking the env var first.
    pub fn resolved_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.api_key_env)
            .ok()
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    /// Check that the active backend can be called at all.
    ///
    /// Runs before every outbound call so configuration problems surface
    /// without a network attempt.
    pub fn validate(&self) -> Result<()> {
        if self.api_type.requires_api_key() && self.resolved_api_key().is_none() {
            return Err(AnswerBotError::Config(format!(
                "{} API key is missing. Set {} or add api_key to settings.json.",
                self.api_type, self.api_key_env
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AnswerBotError::Config(format!(
                "{} model name is missing.",
                self.api_type
            )));
        }

        if self.api_type == ApiType::Ollama && self.endpoint_url().is_none() {
            return Err(AnswerBotError::Config(
                "Ollama endpoint URL is missing.".to_string(),
            ));
        }

        if !self.rate_limit_seconds.is_finite() || self.rate_limit_seconds > MAX_RATE_LIMIT_SECONDS {
            return Err(AnswerBotError::Config(format!(
                "rate_limit_seconds must be at most {} (got {}).",
                MAX_RATE_LIMIT_SECONDS, self.rate_limit_seconds
            )));
        }

        Ok(())
    }
}
