// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation state owned by the control loop

/// Flags describing where the conversation stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// False once the model has given its final answer
    pub active: bool,
    /// The model asked for details; the next user message is a plain reply
    pub waiting_for_user_detail: bool,
    /// Name of the most recently dispatched tool
    pub last_tool_invoked: Option<String>,
    /// A backend response is wanted (scheduled or in flight)
    pub expecting_response: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            active: true,
            waiting_for_user_detail: false,
            last_tool_invoked: None,
            expecting_response: false,
        }
    }
}

/// Coarse state-machine position, derived from [`ConversationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready for user input
    Idle,
    /// A call is scheduled or in flight
    WaitingForAiResponse,
    /// The model asked the user a question
    WaitingForUserDetail,
    /// The model finished; more input starts a new turn
    Terminated,
}

impl ConversationState {
    pub fn phase(&self) -> Phase {
        if self.expecting_response {
            Phase::WaitingForAiResponse
        } else if self.waiting_for_user_detail {
            Phase::WaitingForUserDetail
        } else if !self.active {
            Phase::Terminated
        } else {
            Phase::Idle
        }
    }
}
