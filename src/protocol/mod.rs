// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tag-delimited tool-call protocol spoken by the model

pub mod parser;
pub mod tool;

pub use parser::{extract_params, extract_tool, strip_thinking, ExtractedTool, ParseError};
pub use tool::{Tool, ToolInvocation};
