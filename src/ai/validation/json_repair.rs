//! Quiz JSON extraction and repair
//!
//! Recovers the quiz object from model output that may be wrapped in prose,
//! fenced as markdown, or truncated mid-array by the output token ceiling.
//!
//! Strategies, first success wins:
//! 1. Greedy match of a brace-delimited object containing `"questions"`
//! 2. Fenced code block
//! 3. Truncation repair: close open structures, else salvage the complete
//!    elements of the `questions` array into a minimal object
//! 4. The original text, unchanged

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::types::{QuizDraft, QuizError, Result};

static QUESTIONS_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?s)\{.*"questions".*\}"#).ok());

static FENCED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok());

static QUESTIONS_ARRAY_START: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""questions"\s*:\s*\["#).ok());

static TITLE_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""title"\s*:\s*("(?:[^"\\]|\\.)*")"#).ok());

// =============================================================================
// Convenience Functions
// =============================================================================

/// Best-effort extraction of the quiz JSON from raw model text.
///
/// May return unparsable text; callers still decode and handle failure.
pub fn extract_json(raw: &str) -> String {
    JsonExtractor.extract(raw)
}

/// Strictly decode an extracted payload.
///
/// Unknown fields and type mismatches are errors. Only the first JSON value is
/// read, so trailing prose after a complete object is ignored.
pub fn decode_quiz(json: &str) -> Result<QuizDraft> {
    let mut stream = serde_json::Deserializer::from_str(json).into_iter::<QuizDraft>();
    match stream.next() {
        Some(Ok(quiz)) => Ok(quiz),
        Some(Err(e)) => Err(QuizError::Extraction(e.to_string())),
        None => Err(QuizError::NoJsonContent),
    }
}

// =============================================================================
// JsonExtractor
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    pub fn extract(&self, raw: &str) -> String {
        if let Some(found) = self.match_questions_object(raw) {
            debug!(strategy = "object", "Extracted quiz JSON");
            return found;
        }
        if let Some(found) = self.match_fenced_block(raw) {
            debug!(strategy = "fenced", "Extracted quiz JSON");
            return found;
        }
        if let Some(found) = self.repair_truncated(raw) {
            debug!(strategy = "repair", "Recovered truncated quiz JSON");
            return found;
        }
        raw.to_string()
    }

    fn match_questions_object(&self, text: &str) -> Option<String> {
        let re = QUESTIONS_OBJECT.as_ref()?;
        let candidate = re.find(text)?.as_str();
        parses(candidate).then(|| candidate.to_string())
    }

    fn match_fenced_block(&self, text: &str) -> Option<String> {
        let re = FENCED_OBJECT.as_ref()?;
        let candidate = re.captures(text)?.get(1)?.as_str();
        parses(candidate).then(|| candidate.to_string())
    }

    fn repair_truncated(&self, text: &str) -> Option<String> {
        let key = text.find("\"questions\"")?;

        // Try each opening brace before the key; prose may contain stray braces.
        for (start, _) in text[..key].match_indices('{') {
            let closed = close_open_structures(&text[start..]);
            if parses(&closed) {
                return Some(closed);
            }
        }

        self.salvage_questions(text)
    }

    /// Re-wrap the complete elements of a truncated `questions` array
    fn salvage_questions(&self, text: &str) -> Option<String> {
        let array_start = QUESTIONS_ARRAY_START.as_ref()?.find(text)?.end();
        let body = &text[array_start..];
        let complete = last_complete_element_end(body)?;

        let title = TITLE_FIELD
            .as_ref()
            .and_then(|re| re.captures(&text[..array_start]))
            .and_then(|c| c.get(1))
            .map(|m| format!("\"title\":{},", m.as_str()))
            .unwrap_or_default();

        let rebuilt = format!("{{{}\"questions\":[{}]}}", title, &body[..complete]);
        parses(&rebuilt).then_some(rebuilt)
    }
}

// =============================================================================
// Scanning Helpers
// =============================================================================

fn parses(candidate: &str) -> bool {
    serde_json::Deserializer::from_str(candidate)
        .into_iter::<Value>()
        .next()
        .is_some_and(|r| r.is_ok())
}

/// Append the closers for every structure still open at the end of `s`
fn close_open_structures(s: &str) -> String {
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                if open.last() == Some(&ch) {
                    open.pop();
                }
            }
            _ => {}
        }
    }

    let mut repaired = s.trim_end().to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = open.pop() {
        repaired.push(closer);
    }
    repaired
}

/// Byte offset just past the last array element object that closed at depth 0,
/// stopping at the array's own `]`
fn last_complete_element_end(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end = None;

    for (i, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    last_end = Some(i + 1);
                }
            }
            ']' if depth == 0 => break,
            ']' => depth -= 1,
            _ => {}
        }
    }

    last_end
}
