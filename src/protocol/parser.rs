// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tag protocol scanner
//!
//! The model must answer with exactly one `<tool>...</tool>` span whose body
//! holds one level of `<param>value</param>` children. This is a hand-written
//! scanner rather than a regex so each failure class is decided exactly:
//!
//! - the whole trimmed text is one tag pair: success
//! - a tag pair exists but other text surrounds it: [`ParseError::AmbiguousFormat`]
//! - angle brackets without any well-formed pair: [`ParseError::MalformedTag`]
//! - no angle brackets at all: implicit `final_answer`
//!
//! Tag names are `\w+` identifiers compared case-insensitively, and a closing
//! tag always matches the nearest `</name>` after its opening tag.

use std::collections::HashMap;

use thiserror::Error;

/// Name used when the model answers in plain prose.
pub const IMPLICIT_TOOL: &str = "final_answer";

/// Parameter carrying the prose of an implicit `final_answer`.
pub const IMPLICIT_PARAM: &str = "ans";

const THINKING_TAG: &str = "thinking";

/// Classified protocol violation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("AI response was empty.")]
    EmptyResponse,

    #[error("Invalid format: Found tool call but also content outside the tags.")]
    AmbiguousFormat,

    #[error("Invalid format: No valid tool call found, but contains tag-like characters.")]
    MalformedTag,
}

/// A successfully extracted tool call, before parameter extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTool<'a> {
    /// Lower-cased tool name
    pub name: String,
    /// Raw body between the opening and closing tag
    pub inner: &'a str,
    /// True when the text had no tags and was taken as `final_answer`
    pub implicit: bool,
}

/// A `<name>inner</name>` span located in a haystack.
#[derive(Debug, Clone, Copy)]
struct TagSpan<'a> {
    name: &'a str,
    inner: &'a str,
    start: usize,
    end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Length in bytes of the `\w+` run starting at the beginning of `text`.
fn word_len(text: &str) -> usize {
    text.char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Parse an opening tag `<name>` at byte offset `pos`.
/// Returns the name and the offset just past `>`.
fn opening_tag_at(text: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = text.get(pos..)?.strip_prefix('<')?;
    let len = word_len(rest);
    if len == 0 {
        return None;
    }
    let name = &rest[..len];
    rest[len..].starts_with('>').then(|| (name, pos + 1 + len + 1))
}

/// Whether a closing tag `</name>` starts at byte offset `pos`.
/// Returns the offset just past `>`.
fn closing_tag_at(text: &str, pos: usize, name: &str) -> Option<usize> {
    let rest = text.get(pos..)?.strip_prefix("</")?;
    let len = word_len(rest);
    if len == 0 || !names_match(&rest[..len], name) {
        return None;
    }
    rest[len..].starts_with('>').then(|| pos + 2 + len + 1)
}

/// Nearest closing tag for `name` at or after `from`.
/// Returns `(closing_start, closing_end)`.
fn find_closing(text: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(offset) = text.get(search..)?.find("</") {
        let candidate = search + offset;
        if let Some(end) = closing_tag_at(text, candidate, name) {
            return Some((candidate, end));
        }
        search = candidate + 2;
    }
    None
}

/// Leftmost tag pair starting at or after `from`.
fn find_tag_span(text: &str, from: usize) -> Option<TagSpan<'_>> {
    let mut search = from;
    while let Some(offset) = text.get(search..)?.find('<') {
        let start = search + offset;
        if let Some((name, inner_start)) = opening_tag_at(text, start) {
            if let Some((close_start, end)) = find_closing(text, inner_start, name) {
                return Some(TagSpan {
                    name,
                    inner: &text[inner_start..close_start],
                    start,
                    end,
                });
            }
        }
        search = start + 1;
    }
    None
}

/// The whole of `text` as a single `<name>...</name>` pair.
///
/// The closing tag must sit at the very end, so inner content may itself
/// contain further `</name>` sequences.
fn full_tag_match(text: &str) -> Option<TagSpan<'_>> {
    let (name, inner_start) = opening_tag_at(text, 0)?;
    let close_start = text.rfind("</")?;
    if close_start < inner_start {
        return None;
    }
    let end = closing_tag_at(text, close_start, name)?;
    (end == text.len()).then(|| TagSpan {
        name,
        inner: &text[inner_start..close_start],
        start: 0,
        end,
    })
}

/// Extract the single top-level tool call from a model response.
pub fn extract_tool(text: &str) -> Result<ExtractedTool<'_>, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    if let Some(span) = full_tag_match(trimmed) {
        tracing::debug!(target: "answerbot.protocol", tool = span.name, "extracted tool call");
        return Ok(ExtractedTool {
            name: span.name.to_lowercase(),
            inner: span.inner,
            implicit: false,
        });
    }

    if find_tag_span(trimmed, 0).is_some() {
        return Err(ParseError::AmbiguousFormat);
    }

    if trimmed.contains('<') || trimmed.contains('>') {
        return Err(ParseError::MalformedTag);
    }

    tracing::debug!(
        target: "answerbot.protocol",
        "no tool tag found; treating response as implicit final_answer"
    );
    Ok(ExtractedTool {
        name: IMPLICIT_TOOL.to_string(),
        inner: trimmed,
        implicit: true,
    })
}

/// Collect `<key>value</key>` children of a tool body.
///
/// Spans are found left to right without overlap. Keys are lower-cased and
/// values trimmed; a repeated key keeps its last value.
pub fn extract_params(inner: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut pos = 0;

    while let Some(span) = find_tag_span(inner, pos) {
        let key = span.name.to_lowercase();
        if params
            .insert(key.clone(), span.inner.trim().to_string())
            .is_some()
        {
            tracing::warn!(
                target: "answerbot.protocol",
                param = %key,
                "duplicate parameter in tool call; keeping the last value"
            );
        }
        pos = span.end;
    }

    params
}

/// Remove every `<thinking>...</thinking>` span and trim the result.
///
/// An unterminated `<thinking>` is left in place; the parser then reports it
/// as a protocol error.
pub fn strip_thinking(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        let opening = opening_tag_at(text, start)
            .filter(|(name, _)| names_match(name, THINKING_TAG))
            .and_then(|(name, inner_start)| find_closing(text, inner_start, name));

        match opening {
            Some((_, end)) => {
                out.push_str(&text[pos..start]);
                pos = end;
            }
            None => {
                out.push_str(&text[pos..=start]);
                pos = start + 1;
            }
        }
    }
    out.push_str(&text[pos..]);

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_tool() {
        let tool = extract_tool("<short_answer><ans>42</ans></short_answer>").unwrap();
        assert_eq!(tool.name, "short_answer");
        assert_eq!(tool.inner, "<ans>42</ans>");
        assert!(!tool.implicit);
    }

    #[test]
    fn test_extract_trims_surrounding_whitespace() {
        let tool = extract_tool("\n  <none_further></none_further>  \n").unwrap();
        assert_eq!(tool.name, "none_further");
        assert_eq!(tool.inner, "");
    }

    #[test]
    fn test_extract_case_insensitive_names() {
        let tool = extract_tool("<Short_Answer><ans>x</ans></SHORT_ANSWER>").unwrap();
        assert_eq!(tool.name, "short_answer");
    }

    #[test]
    fn test_extract_multiline_body() {
        let text = "<long_answer>\n<ans>\nline one\nline two\n</ans>\n</long_answer>";
        let tool = extract_tool(text).unwrap();
        assert_eq!(tool.name, "long_answer");
        assert!(tool.inner.contains("line two"));
    }

    #[test]
    fn test_extract_empty() {
        assert_eq!(extract_tool("").unwrap_err(), ParseError::EmptyResponse);
        assert_eq!(extract_tool("   \n\t").unwrap_err(), ParseError::EmptyResponse);
    }

    #[test]
    fn test_extract_leading_text_is_ambiguous() {
        let err = extract_tool("Sure! <short_answer><ans>1</ans></short_answer>").unwrap_err();
        assert_eq!(err, ParseError::AmbiguousFormat);
    }

    #[test]
    fn test_extract_trailing_text_is_ambiguous() {
        let err = extract_tool("<short_answer><ans>1</ans></short_answer> hope that helps").unwrap_err();
        assert_eq!(err, ParseError::AmbiguousFormat);
    }

    #[test]
    fn test_extract_mismatched_close_is_ambiguous_when_child_pair_exists() {
        // The outer pair is broken but <ans>..</ans> is still a well-formed span.
        let err = extract_tool("<short_answer><ans>1</ans></long_answer>").unwrap_err();
        assert_eq!(err, ParseError::AmbiguousFormat);
    }

    #[test]
    fn test_extract_malformed_brackets() {
        assert_eq!(extract_tool("<short_answer>42").unwrap_err(), ParseError::MalformedTag);
        assert_eq!(extract_tool("x > y").unwrap_err(), ParseError::MalformedTag);
        assert_eq!(extract_tool("<a>b</c>").unwrap_err(), ParseError::MalformedTag);
    }

    #[test]
    fn test_extract_plain_text_is_implicit_final_answer() {
        let tool = extract_tool("  The capital of France is Paris.  ").unwrap();
        assert_eq!(tool.name, IMPLICIT_TOOL);
        assert_eq!(tool.inner, "The capital of France is Paris.");
        assert!(tool.implicit);
    }

    #[test]
    fn test_full_match_allows_repeated_close_inside() {
        // Same behaviour as an anchored lazy match: the outermost close wins.
        let tool = extract_tool("<a>x</a><a>y</a>").unwrap();
        assert_eq!(tool.name, "a");
        assert_eq!(tool.inner, "x</a><a>y");
    }

    #[test]
    fn test_closing_tag_must_match_whole_name() {
        assert_eq!(extract_tool("<a>x</ab>").unwrap_err(), ParseError::MalformedTag);
    }

    #[test]
    fn test_tag_names_reject_spaces_and_attributes() {
        let err = extract_tool("<short answer>x</short answer>").unwrap_err();
        assert_eq!(err, ParseError::MalformedTag);
    }

    #[test]
    fn test_extract_params_basic() {
        let params = extract_params("<ans> 42 </ans>");
        assert_eq!(params.len(), 1);
        assert_eq!(params["ans"], "42");
    }

    #[test]
    fn test_extract_params_multiple_and_case() {
        let params = extract_params("\n<CODE>\nfn main() {}\n</code>\n<Lang>rust</LANG>\n");
        assert_eq!(params["code"], "fn main() {}");
        assert_eq!(params["lang"], "rust");
    }

    #[test]
    fn test_extract_params_duplicate_keeps_last() {
        let params = extract_params("<ans>first</ans><ans>second</ans>");
        assert_eq!(params.len(), 1);
        assert_eq!(params["ans"], "second");
    }

    #[test]
    fn test_extract_params_nested_markup_kept_in_value() {
        let params = extract_params("<msg>use <b>bold</b> here</msg>");
        assert_eq!(params["msg"], "use <b>bold</b> here");
    }

    #[test]
    fn test_extract_params_ignores_loose_text() {
        let params = extract_params("noise <ans>ok</ans> more noise < >");
        assert_eq!(params.len(), 1);
        assert_eq!(params["ans"], "ok");
    }

    #[test]
    fn test_extract_params_empty() {
        assert!(extract_params("").is_empty());
        assert!(extract_params("just text").is_empty());
    }

    #[test]
    fn test_strip_thinking_prefix() {
        let text = "<thinking>let me see</thinking>\n<short_answer><ans>4</ans></short_answer>";
        assert_eq!(strip_thinking(text), "<short_answer><ans>4</ans></short_answer>");
    }

    #[test]
    fn test_strip_thinking_multiple_and_case() {
        let text = "<Thinking>a</THINKING>hello<thinking>\nb\n</thinking> world";
        assert_eq!(strip_thinking(text), "hello world");
    }

    #[test]
    fn test_strip_thinking_only() {
        assert_eq!(strip_thinking("<thinking>hmm</thinking>"), "");
    }

    #[test]
    fn test_strip_thinking_unterminated_left_alone() {
        assert_eq!(strip_thinking("<thinking>never closed"), "<thinking>never closed");
    }

    #[test]
    fn test_strip_thinking_keeps_other_tags() {
        let text = "<math_work><work>a < b</work></math_work>";
        assert_eq!(strip_thinking(text), text);
    }

    #[test]
    fn test_strip_thinking_handles_multibyte_text() {
        assert_eq!(strip_thinking("héllo <thinking>ü</thinking>wörld"), "héllo wörld");
    }
}
