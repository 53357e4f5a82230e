// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Backend factory
//!
//! Picks the adapter for the configured API type.

use std::sync::Arc;

use crate::config::{ApiType, Settings};
use crate::llm::backend::ChatBackend;
use crate::llm::providers::{GeminiBackend, OllamaBackend, OpenAiBackend};

/// Factory for creating chat backends
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend for an API type
    pub fn create(api_type: ApiType) -> Arc<dyn ChatBackend> {
        match api_type {
            ApiType::OpenAI => Arc::new(OpenAiBackend::new()),
            ApiType::Gemini => Arc::new(GeminiBackend::new()),
            ApiType::Ollama => Arc::new(OllamaBackend::new()),
        }
    }

    /// Create the backend selected by `settings`, warning early about
    /// configuration that will fail on the first call.
    pub fn for_settings(settings: &Settings) -> Arc<dyn ChatBackend> {
        if let Err(e) = settings.validate() {
            tracing::warn!(target: "answerbot.llm", error = %e, "backend is not fully configured");
        }
        Self::create(settings.api_type)
    }
}
