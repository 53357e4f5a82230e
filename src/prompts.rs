// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt templates
//!
//! Three text templates drive the protocol: the system prompt (carries the
//! first question), the result prompt (reports tool success back to the
//! model) and the user prompt. Files in the prompts directory override the
//! built-in defaults one by one.

use std::path::Path;

use crate::error::Result;

pub const SYSTEM_PROMPT_FILE: &str = "SystemPrompt.txt";
pub const RESULT_PROMPT_FILE: &str = "ResultPrompt.txt";
pub const USER_PROMPT_FILE: &str = "UserPrompt.txt";

const QUESTION_PLACEHOLDER: &str = "{placeholderQuestion}";
const USER_RESPONSE_PLACEHOLDER: &str = "{userResponsePlaceholder}";
const RESULT_MARKER: &str = "Result:";
const TOOL_MARKER: &str = "[tool]";
const MAX_REASON_CHARS: usize = 200;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/SystemPrompt.txt");
const DEFAULT_RESULT_PROMPT: &str = include_str!("../prompts/ResultPrompt.txt");
const DEFAULT_USER_PROMPT: &str = include_str!("../prompts/UserPrompt.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub system: String,
    pub result: String,
    pub user: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            result: DEFAULT_RESULT_PROMPT.to_string(),
            user: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from `dir`, falling back to the built-in copy of any
    /// file that does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            system: read_or_default(dir, SYSTEM_PROMPT_FILE, DEFAULT_SYSTEM_PROMPT)?,
            result: read_or_default(dir, RESULT_PROMPT_FILE, DEFAULT_RESULT_PROMPT)?,
            user: read_or_default(dir, USER_PROMPT_FILE, DEFAULT_USER_PROMPT)?,
        })
    }

    /// Write the built-in templates into `dir` without touching existing files.
    pub fn write_defaults(dir: &Path) -> Result<Vec<String>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (name, content) in [
            (SYSTEM_PROMPT_FILE, DEFAULT_SYSTEM_PROMPT),
            (RESULT_PROMPT_FILE, DEFAULT_RESULT_PROMPT),
            (USER_PROMPT_FILE, DEFAULT_USER_PROMPT),
        ] {
            let path = dir.join(name);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(name.to_string());
            }
        }
        Ok(written)
    }

    /// System prompt with the user's first question embedded.
    pub fn format_system_prompt(&self, question: &str) -> String {
        if !self.system.contains(QUESTION_PLACEHOLDER) {
            tracing::error!(
                target: "answerbot.prompts",
                "'{}' not found in {}; sending template unchanged",
                QUESTION_PLACEHOLDER,
                SYSTEM_PROMPT_FILE
            );
            return self.system.clone();
        }
        self.system.replace(QUESTION_PLACEHOLDER, question)
    }

    /// Instructions only, for backends that take a dedicated system message.
    pub fn base_system_prompt(&self) -> String {
        self.system
            .split(QUESTION_PLACEHOLDER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Result message reporting the outcome of `tool` back to the model.
    pub fn format_result_prompt(&self, tool: &str, success: bool, reason: Option<&str>) -> String {
        let outcome = match (success, reason) {
            (true, _) => "Successful Tool Use".to_string(),
            (false, Some(reason)) => {
                let reason: String = reason.chars().take(MAX_REASON_CHARS).collect();
                format!("Tool Use Failed: {}", reason)
            }
            (false, None) => "Tool Use Failed, Please Try Again".to_string(),
        };

        self.result
            .replace(RESULT_MARKER, outcome.trim())
            .replace(TOOL_MARKER, &format!("[{}]", tool))
            .trim()
            .to_string()
    }

    /// Wrap a follow-up user reply. Text passes through unchanged unless the
    /// template carries the placeholder exactly once.
    pub fn format_user_prompt(&self, text: &str) -> String {
        if self.user.matches(USER_RESPONSE_PLACEHOLDER).count() == 1 {
            self.user.replace(USER_RESPONSE_PLACEHOLDER, text)
        } else {
            tracing::error!(
                target: "answerbot.prompts",
                "'{}' missing or repeated in {}",
                USER_RESPONSE_PLACEHOLDER,
                USER_PROMPT_FILE
            );
            text.to_string()
        }
    }
}

fn read_or_default(dir: &Path, name: &str, default: &str) -> Result<String> {
    let path = dir.join(name);
    if path.exists() {
        tracing::debug!(target: "answerbot.prompts", path = %path.display(), "loading prompt template");
        Ok(std::fs::read_to_string(&path)?)
    } else {
        Ok(default.to_string())
    }
}
