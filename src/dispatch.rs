// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool dispatch
//!
//! Validates a parsed [`ToolInvocation`], draws it through a [`Renderer`], and
//! tells the orchestrator how the conversation proceeds afterwards.

use std::time::Duration;

use crate::llm::message::Role;
use crate::protocol::{Tool, ToolInvocation};

/// Visual treatment requested for a piece of rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Default,
    Answer,
    Error,
    Math,
    MathAnswer,
}

/// Transient status line updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// A backend call is in flight
    Thinking,
    /// Waiting for the rate limit to elapse
    RateLimited { remaining: Duration },
    /// The model broke the protocol and is being asked again
    Retrying,
    /// Something went wrong that needs the user
    Error(String),
    /// Nothing pending
    Clear,
}

/// Presentation callbacks used by the conversation core.
///
/// Implementations decide how things look; the core only decides what is shown.
pub trait Renderer: Send {
    fn render_message(&mut self, role: Role, text: &str, style: TextStyle);

    fn render_titled_box(&mut self, title: &str, text: &str, style: TextStyle);

    /// Code with an optional language hint. Implementations should make the
    /// code easy to copy as-is.
    fn render_code_block(&mut self, code: &str, language: Option<&str>);

    fn set_status(&mut self, _status: Status) {}
}

/// What the orchestrator should do after a tool has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Report the result back to the model and keep going
    Auto,
    /// Stop and wait for the user to supply details
    PauseForUser,
    /// The conversation reached its answer
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub continuation: Continuation,
    /// Why the call failed, when there is something more useful than "failed"
    pub failure_reason: Option<String>,
}

impl DispatchOutcome {
    fn succeeded(continuation: Continuation) -> Self {
        Self {
            success: true,
            continuation,
            failure_reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            continuation: Continuation::Auto,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Execute one tool call against the renderer.
pub fn dispatch(call: &ToolInvocation, renderer: &mut dyn Renderer) -> DispatchOutcome {
    let tool = &call.tool;

    if let Tool::Unknown(name) = tool {
        tracing::warn!(target: "answerbot.dispatch", tool = %name, "unknown tool");
        let message = format!("Error: Received unknown tool '{}'.", name);
        renderer.render_message(Role::Assistant, &message, TextStyle::Error);
        return DispatchOutcome::failed(format!("Unknown tool '{}'", name));
    }

    let value = match tool.required_param() {
        Some(field) => match call.param(field) {
            // request_details is useless without a question to show
            Some(v) if !(v.is_empty() && *tool == Tool::RequestDetails) => v,
            _ => return missing_param(tool, field, renderer),
        },
        None => "",
    };

    tracing::debug!(target: "answerbot.dispatch", tool = %tool, "dispatching tool");

    match tool {
        Tool::RequestDetails => {
            renderer.render_titled_box("Details Requested", value, TextStyle::Default);
            DispatchOutcome::succeeded(Continuation::PauseForUser)
        }
        Tool::ShortAnswer => {
            renderer.render_titled_box("Short Answer", value, TextStyle::Answer);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::LongAnswer => {
            renderer.render_titled_box("Long Answer", value, TextStyle::Answer);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::ChoiceAnswer => {
            renderer.render_titled_box("Multiple Choice Answer", value, TextStyle::Answer);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::ChoiceExplain => {
            renderer.render_message(Role::Assistant, value, TextStyle::Default);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::MathWork => {
            renderer.render_message(Role::Assistant, value, TextStyle::Math);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::MathAnswer => {
            renderer.render_message(Role::Assistant, value, TextStyle::MathAnswer);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::CodeAnswer => {
            let lang = call.param("lang").filter(|l| !l.is_empty());
            renderer.render_code_block(value, lang);
            DispatchOutcome::succeeded(Continuation::Auto)
        }
        Tool::FinalAnswer => {
            renderer.render_message(Role::Assistant, value, TextStyle::Default);
            DispatchOutcome::succeeded(Continuation::Terminate)
        }
        Tool::NoneFurther => DispatchOutcome::succeeded(Continuation::Terminate),
        Tool::Unknown(_) => DispatchOutcome::failed("Unknown tool"),
    }
}

fn missing_param(tool: &Tool, field: &str, renderer: &mut dyn Renderer) -> DispatchOutcome {
    tracing::warn!(
        target: "answerbot.dispatch",
        tool = %tool,
        field,
        "tool called without required parameter"
    );
    let message = format!(
        "Error: '{}' tool called without '{}' parameter.",
        tool.name(),
        field
    );
    renderer.render_message(Role::Assistant, &message, TextStyle::Error);
    DispatchOutcome::failed(format!("Missing required parameter '{}'", field))
}
