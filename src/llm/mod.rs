// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for AnswerBot
//!
//! Normalizes the supported chat APIs behind [`ChatBackend`].

pub mod backend;
pub mod factory;
pub mod message;
pub mod providers;

pub use backend::ChatBackend;
pub use factory::BackendFactory;
pub use message::*;
