// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool catalog and parsed invocations

use std::collections::HashMap;
use std::fmt;

use super::parser::{extract_params, extract_tool, ParseError, IMPLICIT_PARAM};

/// Every tool the model may call, plus a catch-all for names outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tool {
    RequestDetails,
    ShortAnswer,
    LongAnswer,
    ChoiceAnswer,
    ChoiceExplain,
    MathWork,
    MathAnswer,
    CodeAnswer,
    FinalAnswer,
    NoneFurther,
    Unknown(String),
}

impl Tool {
    /// Look up a tool by its (already lower-cased) tag name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "request_details" => Tool::RequestDetails,
            "short_answer" => Tool::ShortAnswer,
            "long_answer" => Tool::LongAnswer,
            "choice_answer" => Tool::ChoiceAnswer,
            "choice_explain" => Tool::ChoiceExplain,
            "math_work" => Tool::MathWork,
            "math_answer" => Tool::MathAnswer,
            "code_answer" => Tool::CodeAnswer,
            "final_answer" => Tool::FinalAnswer,
            "none_further" => Tool::NoneFurther,
            other => Tool::Unknown(other.to_string()),
        }
    }

    /// Tag name as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Tool::RequestDetails => "request_details",
            Tool::ShortAnswer => "short_answer",
            Tool::LongAnswer => "long_answer",
            Tool::ChoiceAnswer => "choice_answer",
            Tool::ChoiceExplain => "choice_explain",
            Tool::MathWork => "math_work",
            Tool::MathAnswer => "math_answer",
            Tool::CodeAnswer => "code_answer",
            Tool::FinalAnswer => "final_answer",
            Tool::NoneFurther => "none_further",
            Tool::Unknown(name) => name,
        }
    }

    /// The parameter that must be present for the call to succeed.
    pub fn required_param(&self) -> Option<&'static str> {
        match self {
            Tool::RequestDetails => Some("msg"),
            Tool::ShortAnswer
            | Tool::LongAnswer
            | Tool::ChoiceAnswer
            | Tool::ChoiceExplain
            | Tool::MathAnswer
            | Tool::FinalAnswer => Some("ans"),
            Tool::MathWork => Some("work"),
            Tool::CodeAnswer => Some("code"),
            Tool::NoneFurther | Tool::Unknown(_) => None,
        }
    }

    /// Every known tool, in catalog order.
    pub fn catalog() -> [Tool; 10] {
        [
            Tool::RequestDetails,
            Tool::ShortAnswer,
            Tool::LongAnswer,
            Tool::ChoiceAnswer,
            Tool::ChoiceExplain,
            Tool::MathWork,
            Tool::MathAnswer,
            Tool::CodeAnswer,
            Tool::FinalAnswer,
            Tool::NoneFurther,
        ]
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed tool call from an assistant turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub params: HashMap<String, String>,
}

impl ToolInvocation {
    pub fn new(tool: Tool, params: HashMap<String, String>) -> Self {
        Self { tool, params }
    }

    /// Parse a (thinking-stripped) model response into exactly one invocation.
    ///
    /// `final_answer` is special: its `ans` is the `<ans>` child when present,
    /// otherwise the whole trimmed body, which is also what plain prose becomes.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let extracted = extract_tool(text)?;
        let tool = Tool::from_name(&extracted.name);

        let params = if tool == Tool::FinalAnswer {
            let mut params = if extracted.implicit {
                HashMap::new()
            } else {
                extract_params(extracted.inner)
            };
            params
                .entry(IMPLICIT_PARAM.to_string())
                .or_insert_with(|| extracted.inner.trim().to_string());
            params
        } else {
            extract_params(extracted.inner)
        };

        Ok(Self { tool, params })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_roundtrip_catalog() {
        for tool in Tool::catalog() {
            assert_eq!(Tool::from_name(tool.name()), tool);
        }
    }

    #[test]
    fn test_unknown_tool_keeps_name() {
        let tool = Tool::from_name("web_search");
        assert_eq!(tool, Tool::Unknown("web_search".to_string()));
        assert_eq!(tool.name(), "web_search");
        assert_eq!(tool.required_param(), None);
    }

    #[test]
    fn test_required_params() {
        assert_eq!(Tool::RequestDetails.required_param(), Some("msg"));
        assert_eq!(Tool::MathWork.required_param(), Some("work"));
        assert_eq!(Tool::CodeAnswer.required_param(), Some("code"));
        assert_eq!(Tool::NoneFurther.required_param(), None);
    }

    #[test]
    fn test_parse_with_params() {
        let call =
            ToolInvocation::parse("<code_answer><code>print(1)</code><lang>python</lang></code_answer>")
                .unwrap();
        assert_eq!(call.tool, Tool::CodeAnswer);
        assert_eq!(call.param("code"), Some("print(1)"));
        assert_eq!(call.param("lang"), Some("python"));
    }

    #[test]
    fn test_parse_implicit_final_answer() {
        let call = ToolInvocation::parse("It is 4.").unwrap();
        assert_eq!(call.tool, Tool::FinalAnswer);
        assert_eq!(call.param("ans"), Some("It is 4."));
        assert_eq!(call.params.len(), 1);
    }

    #[test]
    fn test_parse_explicit_final_answer_without_child() {
        let call = ToolInvocation::parse("<final_answer>\nDone.\n</final_answer>").unwrap();
        assert_eq!(call.param("ans"), Some("Done."));
    }

    #[test]
    fn test_parse_explicit_final_answer_with_ans_child() {
        let call = ToolInvocation::parse("<final_answer><ans>Done.</ans></final_answer>").unwrap();
        assert_eq!(call.param("ans"), Some("Done."));
    }

    #[test]
    fn test_parse_propagates_errors() {
        assert_eq!(
            ToolInvocation::parse("text <a>b</a>").unwrap_err(),
            ParseError::AmbiguousFormat
        );
    }
}
