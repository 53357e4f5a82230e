// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation orchestrator
//!
//! A single control loop owns the history and the conversation state. It
//! turns user input into history entries, asks the scheduler for a call
//! slot, spawns one background task per backend call and feeds results
//! through the parser and dispatcher. Background tasks only ever report
//! back over the event channel.
//!
//! Supersession: every call gets a fresh [`RequestHandle`]. A completion is
//! applied only if its handle is still current and a response is still
//! expected; anything else is dropped without touching history or state.

mod events;
mod state;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::Settings;
use crate::dispatch::{dispatch, Continuation, Renderer, Status, TextStyle};
use crate::error::{AnswerBotError, Result};
use crate::llm::backend::ChatBackend;
use crate::llm::message::{History, Message, Role};
use crate::prompts::PromptTemplates;
use crate::protocol::{strip_thinking, ToolInvocation};
use crate::scheduler::{RateScheduler, Schedule, TimerEvent};

pub use events::{LoopEvent, RequestHandle};
pub use state::{ConversationState, Phase};

/// Tool name reported when a format error happens before any tool was called.
pub const FORMAT_ERROR_TOOL: &str = "format_error";

pub struct Orchestrator<R: Renderer> {
    settings: Settings,
    prompts: PromptTemplates,
    backend: Arc<dyn ChatBackend>,
    renderer: R,
    history: History,
    state: ConversationState,
    scheduler: RateScheduler,
    current: Option<RequestHandle>,
    next_handle: u64,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
}

impl<R: Renderer> Orchestrator<R> {
    pub fn new(
        settings: Settings,
        prompts: PromptTemplates,
        backend: Arc<dyn ChatBackend>,
        renderer: R,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let timer_tx = events_tx.clone();
        let scheduler = RateScheduler::new(move |event| {
            // The receiver only goes away with the orchestrator itself
            let _ = timer_tx.send(LoopEvent::Timer(event));
        });

        Self {
            settings,
            prompts,
            backend,
            renderer,
            history: History::new(),
            state: ConversationState::default(),
            scheduler,
            current: None,
            next_handle: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn current_handle(&self) -> Option<RequestHandle> {
        self.current
    }

    /// Whether a call is scheduled or in flight.
    pub fn is_busy(&self) -> bool {
        self.state.expecting_response
    }

    /// Take a line typed by the user and start the next call.
    ///
    /// Anything still pending from an earlier automatic cycle is superseded.
    pub fn submit_user_input(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnswerBotError::InvalidInput("message is empty".to_string()));
        }

        if self.state.expecting_response || self.scheduler.is_pending() {
            self.abandon("new user message");
        }
        self.state.active = true;

        if self.state.waiting_for_user_detail {
            tracing::debug!(target: "answerbot.orchestrator", "user replied to request_details");
            self.history.push(Message::user(text));
            self.state.waiting_for_user_detail = false;
        } else if self.history.is_empty() {
            self.push_first_message(text);
        } else {
            self.history.push(Message::user(text));
        }

        self.request_call();
        Ok(())
    }

    /// Drop the conversation and start over.
    pub fn new_chat(&mut self) {
        self.supersede("new chat");
        self.history.reset();
        self.state = ConversationState::default();
        self.backend.reset();
        self.renderer.set_status(Status::Clear);
        tracing::info!(
            target: "answerbot.orchestrator",
            session = %self.history.session(),
            "started new chat"
        );
    }

    /// Abandon the pending call, if any. History is left as it is.
    pub fn cancel(&mut self) {
        self.abandon("cancelled");
        self.renderer.set_status(Status::Clear);
    }

    /// Cancel anything pending and end the conversation. Later events are
    /// ignored.
    pub fn shutdown(&mut self) {
        self.cancel();
        self.state.active = false;
        self.state.waiting_for_user_detail = false;
        tracing::info!(
            target: "answerbot.orchestrator",
            session = %self.history.session(),
            messages = self.history.len(),
            "conversation closed"
        );
    }

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<LoopEvent> {
        self.events_rx.recv().await
    }

    /// Handle every event that is already queued, without waiting.
    pub fn process_ready_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Drive the loop until no response is expected any more.
    pub async fn run_until_idle(&mut self) {
        while self.state.expecting_response {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Timer(TimerEvent::Fire { ticket }) => self.on_timer_fired(ticket),
            LoopEvent::Timer(TimerEvent::Countdown { ticket, remaining }) => {
                if self.scheduler.pending_ticket() == Some(ticket) {
                    self.renderer.set_status(Status::RateLimited { remaining });
                }
            }
            LoopEvent::Response { handle, result } => self.on_response(handle, result),
        }
    }

    fn push_first_message(&mut self, question: &str) {
        if self.settings.uses_system_message() {
            tracing::debug!(target: "answerbot.orchestrator", "using dedicated system role");
            let base = self.prompts.base_system_prompt();
            if !base.is_empty() {
                self.history.push(Message::system(base));
            }
            self.history.push(Message::user(question));
        } else {
            tracing::debug!(target: "answerbot.orchestrator", "embedding system prompt in first user message");
            self.history
                .push(Message::user(self.prompts.format_system_prompt(question)));
        }
    }

    /// Cancel whatever is pending and make any in-flight call stale.
    fn supersede(&mut self, reason: &str) {
        if self.state.expecting_response || self.scheduler.is_pending() {
            tracing::debug!(
                target: "answerbot.orchestrator",
                reason,
                handle = self.current.map(|h| h.id()),
                "superseding pending request"
            );
        }
        self.scheduler.cancel();
        self.current = None;
        self.state.expecting_response = false;
    }

    /// Supersede, and drop any backend-side chat state the abandoned call
    /// may still write to once it returns.
    fn abandon(&mut self, reason: &str) {
        let in_flight = self.state.expecting_response && !self.scheduler.is_pending();
        self.supersede(reason);
        if in_flight {
            tracing::debug!(
                target: "answerbot.orchestrator",
                backend = self.backend.name(),
                "resetting backend session for abandoned call"
            );
            self.backend.reset();
        }
    }

    fn request_call(&mut self) {
        self.next_handle += 1;
        let handle = RequestHandle(self.next_handle);
        self.current = Some(handle);
        self.state.expecting_response = true;

        match self.scheduler.request(handle.id(), self.settings.rate_limit()) {
            Schedule::Immediate => self.start_call(handle),
            Schedule::Deferred(delay) => {
                self.renderer
                    .set_status(Status::RateLimited { remaining: delay });
            }
        }
    }

    fn on_timer_fired(&mut self, ticket: u64) {
        if !self.scheduler.take_fired(ticket) {
            tracing::debug!(target: "answerbot.orchestrator", ticket, "ignoring cancelled timer");
            return;
        }
        match self.current {
            Some(handle) if handle.id() == ticket && self.state.expecting_response => {
                self.start_call(handle)
            }
            _ => tracing::debug!(target: "answerbot.orchestrator", ticket, "timer no longer current"),
        }
    }

    fn start_call(&mut self, handle: RequestHandle) {
        if self.history.is_empty() {
            tracing::error!(target: "answerbot.orchestrator", "call requested with empty history");
            self.current = None;
            self.state.expecting_response = false;
            self.renderer.set_status(Status::Error("No history to send".to_string()));
            return;
        }

        tracing::debug!(
            target: "answerbot.orchestrator",
            handle = handle.id(),
            backend = self.backend.name(),
            messages = self.history.len(),
            "starting backend call"
        );
        self.renderer.set_status(Status::Thinking);

        let backend = Arc::clone(&self.backend);
        let history = self.history.snapshot();
        let settings = self.settings.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.send(&history, &settings).await;
            let _ = tx.send(LoopEvent::Response { handle, result });
        });
    }

    fn on_response(&mut self, handle: RequestHandle, result: Result<String>) {
        if self.current != Some(handle) || !self.state.expecting_response {
            tracing::debug!(
                target: "answerbot.orchestrator",
                handle = handle.id(),
                "discarding stale response"
            );
            return;
        }
        self.current = None;
        self.state.expecting_response = false;

        match result {
            Ok(raw) => self.accept_response(&raw),
            Err(e) => self.on_backend_error(e),
        }
    }

    fn on_backend_error(&mut self, error: AnswerBotError) {
        tracing::warn!(target: "answerbot.orchestrator", error = %error, "backend call failed");
        let message = format!("API Error: {}", error);
        self.renderer
            .render_message(Role::Assistant, &message, TextStyle::Error);
        self.renderer.set_status(Status::Error(error.to_string()));
    }

    fn accept_response(&mut self, raw: &str) {
        self.scheduler.record_accepted(Instant::now());
        tracing::debug!(target: "answerbot.orchestrator", raw, "received response");

        let cleaned = strip_thinking(raw);
        if cleaned.is_empty() {
            self.renderer.render_message(
                Role::Assistant,
                "Error: Received an empty response from the API (after removing <thinking> tags).",
                TextStyle::Error,
            );
            self.renderer
                .set_status(Status::Error("Empty Response".to_string()));
            self.history.push(Message::assistant(""));
            return;
        }

        self.history.push(Message::assistant(cleaned.as_str()));

        match ToolInvocation::parse(&cleaned) {
            Ok(call) => self.run_tool(call),
            Err(e) => {
                tracing::debug!(target: "answerbot.orchestrator", error = %e, "response format error");
                let message = format!("Format Error: AI response was invalid. ({})", e);
                self.renderer
                    .render_message(Role::Assistant, &message, TextStyle::Error);
                self.renderer.set_status(Status::Retrying);

                let failed_tool = self
                    .state
                    .last_tool_invoked
                    .clone()
                    .unwrap_or_else(|| FORMAT_ERROR_TOOL.to_string());
                self.send_result(&failed_tool, false, Some(&e.to_string()));
            }
        }
    }

    fn run_tool(&mut self, call: ToolInvocation) {
        let tool_name = call.tool.name().to_string();
        self.state.last_tool_invoked = Some(tool_name.clone());

        let outcome = dispatch(&call, &mut self.renderer);
        tracing::debug!(
            target: "answerbot.orchestrator",
            tool = %tool_name,
            success = outcome.success,
            continuation = ?outcome.continuation,
            "tool handled"
        );

        match outcome.continuation {
            Continuation::Terminate => {
                self.state.active = false;
                self.state.waiting_for_user_detail = false;
                self.renderer.set_status(Status::Clear);
            }
            Continuation::PauseForUser => {
                self.state.waiting_for_user_detail = true;
                self.renderer.set_status(Status::Clear);
            }
            Continuation::Auto => {
                self.send_result(&tool_name, outcome.success, outcome.failure_reason.as_deref())
            }
        }
    }

    fn send_result(&mut self, tool: &str, success: bool, reason: Option<&str>) {
        let message = self.prompts.format_result_prompt(tool, success, reason);
        tracing::debug!(target: "answerbot.orchestrator", %message, "appending result message");
        self.history.push(Message::user(message));
        self.request_call();
    }
}
