// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! AnswerBot - a terminal client that talks to language models through a
//! small tag-based tool-call protocol.
//!
//! This crate exposes the shared runtime used by the `answerbot` CLI
//! (`src/main.rs`).
//!
//! Architecture highlights:
//! - `protocol`: tag parser and the closed tool catalog
//! - `dispatch`: maps a parsed tool call onto renderer output and a continuation
//! - `llm`: chat backends (OpenAI, Gemini, Ollama) behind one async trait
//! - `scheduler`: minimum spacing between outbound calls
//! - `orchestrator`: the control loop tying history, backend and dispatcher together
//! - `prompts`, `config`: prompt templates and user settings

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod protocol;
pub mod scheduler;

pub use error::{AnswerBotError, Result};
