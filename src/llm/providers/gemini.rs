// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini backend
//!
//! Gemini is driven turn by turn. The backend keeps a client-side chat
//! session (system instruction plus accumulated `user`/`model` turns) for
//! the current model and only appends the newest user message to it. The
//! session is rebuilt from the full history when the model changes, and
//! dropped after any failed call or a new chat. Only the most recently
//! started call may write its turns back; a call overtaken by a newer one
//! leaves the session alone.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{AnswerBotError, ApiError, Result};
use crate::llm::backend::{self, ChatBackend};
use crate::llm::message::{Message, Role};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
struct ChatSession {
    model: String,
    system_instruction: Option<String>,
    contents: Vec<Content>,
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<ChatSession>,
    /// Bumped by every call and by reset. A call commits only while its
    /// generation is still the latest.
    generation: u64,
}

#[derive(Debug, Default)]
pub struct GeminiBackend {
    slot: Mutex<SessionSlot>,
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a session is currently held (for tests and diagnostics).
    pub fn has_session(&self) -> bool {
        self.slot().session.is_some()
    }

    /// Convert history into Gemini turns: assistant becomes model, tool
    /// folds into user, system messages and empty turns are dropped.
    fn convert_history(messages: &[Message]) -> Vec<Content> {
        messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .filter_map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    Role::User | Role::Tool => "user",
                    Role::System => return None,
                };
                Some(Content::text(role, &m.content))
            })
            .collect()
    }

    /// Start or reuse the session and return the turns to send along with
    /// the generation this call owns.
    fn prepare(&self, history: &[Message], model: &str) -> Result<(ChatSession, u64)> {
        let (system_instruction, for_chat) = match history.split_first() {
            Some((first, rest)) if first.role == Role::System => {
                (Some(first.content.clone()), rest)
            }
            _ => (None, history),
        };

        let (last, earlier) = for_chat.split_last().ok_or_else(|| {
            AnswerBotError::InvalidInput("Gemini call needs at least one non-system message.".to_string())
        })?;
        if last.content.is_empty() {
            return Err(AnswerBotError::InvalidInput(
                "Last message in history for Gemini call is empty.".to_string(),
            ));
        }

        let mut slot = self.slot();
        let reusable = slot
            .session
            .as_ref()
            .filter(|session| session.model == model)
            .cloned();

        let mut session = match reusable {
            Some(session) => {
                tracing::debug!(target: "answerbot.llm.gemini", "reusing chat session");
                session
            }
            None => {
                tracing::debug!(target: "answerbot.llm.gemini", model, "starting new chat session");
                slot.session = None;
                ChatSession {
                    model: model.to_string(),
                    system_instruction,
                    contents: Self::convert_history(earlier),
                }
            }
        };
        session.contents.push(Content::text("user", &last.content));
        slot.generation = slot.generation.wrapping_add(1);
        Ok((session, slot.generation))
    }

    fn commit(&self, generation: u64, session: Option<ChatSession>) {
        let mut slot = self.slot();
        if slot.generation == generation {
            slot.session = session;
        } else {
            tracing::debug!(target: "answerbot.llm.gemini", "call was overtaken; leaving chat session as is");
        }
    }

    fn parse_error(status: u16, headers: &reqwest::header::HeaderMap, body: &str) -> AnswerBotError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                if envelope.error.status.as_deref() == Some("PERMISSION_DENIED")
                    || envelope.error.message.contains("API key not valid")
                {
                    AnswerBotError::Api(ApiError::AuthenticationFailed)
                } else {
                    backend::status_error(status, headers, &envelope.error.message)
                }
            }
            Err(_) => backend::status_error(status, headers, body),
        }
    }

    fn extract_text(response: GenerateResponse) -> Result<String> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(AnswerBotError::Api(ApiError::Blocked(format!(
                "Prompt Feedback: {}",
                reason
            ))));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"))
                if text.is_empty() =>
            {
                Err(AnswerBotError::Api(ApiError::Blocked(format!(
                    "Finish Reason: {}",
                    reason
                ))))
            }
            _ => Ok(text),
        }
    }

    async fn call(&self, session: &ChatSession, settings: &Settings) -> Result<String> {
        let api_key = backend::require_api_key(settings)?;
        let base_url = settings
            .endpoint_url()
            .unwrap_or(DEFAULT_GEMINI_URL)
            .trim_end_matches('/');
        let url = format!("{}/models/{}:generateContent", base_url, session.model);

        let body = GenerateRequest {
            system_instruction: session
                .system_instruction
                .as_deref()
                .map(|text| Content::text("user", text)),
            contents: &session.contents,
        };

        let response = backend::http_client(settings)?
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| backend::transport_error(e, "Gemini", &url))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &headers, &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            AnswerBotError::Api(ApiError::InvalidResponse(format!(
                "Gemini returned an unexpected response: {}",
                e
            )))
        })?;
        Self::extract_text(parsed)
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, history: &[Message], settings: &Settings) -> Result<String> {
        backend::ensure_sendable(history, settings)?;
        backend::log_outbound(self.name(), &settings.model, history);

        let (mut session, generation) = self.prepare(history, &settings.model)?;
        match self.call(&session, settings).await {
            Ok(text) => {
                session.contents.push(Content::text("model", &text));
                self.commit(generation, Some(session));
                Ok(text)
            }
            Err(e) => {
                tracing::debug!(target: "answerbot.llm.gemini", error = %e, "dropping chat session");
                self.commit(generation, None);
                Err(e)
            }
        }
    }

    fn reset(&self) {
        let mut slot = self.slot();
        slot.session = None;
        slot.generation = slot.generation.wrapping_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: &'a [Content],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiType;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer, model: &str) -> Settings {
        Settings {
            api_type: ApiType::Gemini,
            api_key: Some("g-key".to_string()),
            api_key_env: "ANSWERBOT_TEST_NONEXISTENT_ENV_12345".to_string(),
            gemini_endpoint_url: Some(server.uri()),
            model: model.to_string(),
            ..Settings::default()
        }
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        }))
    }

    #[test]
    fn test_convert_history_roles() {
        let history = vec![
            Message::system("late system"),
            Message::user("q"),
            Message::assistant(""),
            Message::assistant("a"),
            Message::new(Role::Tool, "t"),
        ];
        let contents = GeminiBackend::convert_history(&history);
        let roles: Vec<&str> = contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_blocked_prompt() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = GeminiBackend::extract_text(response).unwrap_err();
        assert!(matches!(err, AnswerBotError::Api(ApiError::Blocked(ref m)) if m.contains("SAFETY")));
    }

    #[test]
    fn test_safety_finish_without_text() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert!(matches!(
            GeminiBackend::extract_text(response),
            Err(AnswerBotError::Api(ApiError::Blocked(_)))
        ));
    }

    #[tokio::test]
    async fn test_first_call_sends_system_instruction_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "rules"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "q1"}]},
                    {"role": "model", "parts": [{"text": "a1"}]},
                    {"role": "user", "parts": [{"text": "q2"}]}
                ]
            })))
            .respond_with(reply("a2"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        let history = vec![
            Message::system("rules"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let text = backend
            .send(&history, &settings_for(&server, "gemini-pro"))
            .await
            .unwrap();
        assert_eq!(text, "a2");
        assert!(backend.has_session());
    }

    #[tokio::test]
    async fn test_session_reused_for_same_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro:generateContent"))
            .respond_with(reply("ok"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        let settings = settings_for(&server, "gemini-pro");
        backend.send(&[Message::user("first")], &settings).await.unwrap();

        // Only the newest message is taken from history once a session exists
        let history = vec![
            Message::user("ignored"),
            Message::assistant("ignored too"),
            Message::user("second"),
        ];
        backend.send(&history, &settings).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "first"}]},
                {"role": "model", "parts": [{"text": "ok"}]},
                {"role": "user", "parts": [{"text": "second"}]}
            ])
        );
    }

    #[tokio::test]
    async fn test_model_change_rebuilds_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("ok"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        backend
            .send(&[Message::user("first")], &settings_for(&server, "gemini-pro"))
            .await
            .unwrap();

        let history = vec![Message::user("h1"), Message::assistant("h2"), Message::user("h3")];
        backend
            .send(&history, &settings_for(&server, "gemini-flash"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[1].url.path(), "/models/gemini-flash:generateContent");
        let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_error_invalidates_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("ok"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": 500, "message": "internal", "status": "INTERNAL"}
            })))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        let settings = settings_for(&server, "gemini-pro");
        backend.send(&[Message::user("first")], &settings).await.unwrap();
        assert!(backend.has_session());

        let err = backend.send(&[Message::user("second")], &settings).await.unwrap_err();
        assert!(matches!(err, AnswerBotError::Api(ApiError::ServerError { status: 500, .. })));
        assert!(!backend.has_session());
    }

    #[tokio::test]
    async fn test_reset_drops_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("ok"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        backend
            .send(&[Message::user("first")], &settings_for(&server, "gemini-pro"))
            .await
            .unwrap();
        backend.reset();
        assert!(!backend.has_session());
    }

    #[tokio::test]
    async fn test_overtaken_call_does_not_overwrite_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": [{}, {}, {"role": "user", "parts": [{"text": "slow question"}]}]
            })))
            .respond_with(reply("slow reply").set_delay(std::time::Duration::from_millis(300)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(reply("ok"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new();
        let settings = settings_for(&server, "gemini-pro");
        backend.send(&[Message::user("first")], &settings).await.unwrap();

        let slow_history = [Message::user("first"), Message::assistant("ok"), Message::user("slow question")];
        let fast_history = [Message::user("first"), Message::assistant("ok"), Message::user("fast question")];
        let slow = backend.send(&slow_history, &settings);
        let fast = async {
            // Start after the slow call has taken its generation
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            backend.send(&fast_history, &settings).await
        };
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), "slow reply");
        assert_eq!(fast.unwrap(), "ok");

        backend.send(&[Message::user("next")], &settings).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[3].body).unwrap();
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "first"}]},
                {"role": "model", "parts": [{"text": "ok"}]},
                {"role": "user", "parts": [{"text": "fast question"}]},
                {"role": "model", "parts": [{"text": "ok"}]},
                {"role": "user", "parts": [{"text": "next"}]}
            ])
        );
    }
}
