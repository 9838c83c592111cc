//! Resilient parsing of the structured payload channel
//!
//! The payload buffer is whatever the model produced outside the thinking
//! region: ideally a bare JSON array of records, in practice often wrapped in
//! prose, fenced in a markdown code block, or carrying a handful of
//! recurring near-miss JSON mistakes. [`parse_records`] runs a fixed chain of
//! fallback strategies and never panics; every failure path comes back as a
//! [`PayloadError`].
//!
//! Each repair rule is a pure function over the input text, so the rules are
//! testable in isolation and the chain stays idempotent.

use crate::record::Record;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// How much of the offending input an error message carries.
const ERROR_PREVIEW_CHARS: usize = 120;

/// Failure of every fallback parse strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("structured payload unparseable: {reason} (input starts: {preview:?})")]
pub struct PayloadError {
    pub reason: String,
    pub preview: String,
}

impl PayloadError {
    fn new(reason: impl Into<String>, input: &str) -> Self {
        Self {
            reason: reason.into(),
            preview: input.chars().take(ERROR_PREVIEW_CHARS).collect(),
        }
    }
}

/// Parse the finalized payload buffer into records.
///
/// Strategies, in order, each tried only if the previous failed:
/// 1. direct parse of the trimmed input;
/// 2. strip a fenced code block (prose around the fence is tolerated) and
///    retry, with and without repairs;
/// 3. repair known model mistakes (comma-for-colon after a key, trailing
///    commas) and retry;
/// 4. extract the first balanced `{...}`/`[...]` slice and retry, with and
///    without repairs.
///
/// A bare object is coerced to a one-element array. Elements are mapped
/// through [`Record::from_value`], so nothing is dropped for having an
/// unknown or missing `type`.
pub fn parse_records(raw: &str) -> Result<Vec<Record>, PayloadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::new("payload is empty", raw));
    }

    if let Some(records) = try_parse(trimmed) {
        return Ok(records);
    }

    if let Some(unfenced) = strip_code_fence(trimmed) {
        if let Some(records) = try_parse(&unfenced).or_else(|| try_parse(&repair(&unfenced))) {
            tracing::debug!("payload recovered after stripping code fence");
            return Ok(records);
        }
    }

    if let Some(records) = try_parse(&repair(trimmed)) {
        tracing::debug!("payload recovered after regex repairs");
        return Ok(records);
    }

    if let Some(slice) = extract_json_slice(trimmed) {
        if let Some(records) = try_parse(slice).or_else(|| try_parse(&repair(slice))) {
            tracing::debug!("payload recovered from embedded JSON slice");
            return Ok(records);
        }
    }

    Err(PayloadError::new("no parse strategy succeeded", trimmed))
}

fn try_parse(input: &str) -> Option<Vec<Record>> {
    let value: Value = serde_json::from_str(input).ok()?;
    let elements = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return None,
    };
    Some(elements.into_iter().map(Record::from_value).collect())
}

/// Run the repair rules in their fixed order.
fn repair(input: &str) -> String {
    fix_trailing_commas(&fix_comma_for_colon(input))
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Extract the body of the first markdown code fence, if any.
///
/// The fence may sit anywhere in the text ("以下是结果：\n```json\n...```"),
/// and an unterminated fence loses only its opening line.
pub(crate) fn strip_code_fence(input: &str) -> Option<String> {
    if let Some(captures) = FENCE_RE.captures(input) {
        return Some(captures[1].trim().to_string());
    }
    let trimmed = input.trim_start();
    let rest = trimmed.strip_prefix("```")?;
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    Some(body.trim().to_string())
}

// `"key", <value>` where a colon was required. Anchored to key position
// (after `{` or `,`) so value-position strings are left alone; the value
// start may be a quoted string, object, array, number, or boolean.
static KEY_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([{,]\s*)"((?:[^"\\]|\\.)*)"\s*,\s*("|\{|\[|-?\d|true\b|false\b)"#).unwrap()
});

/// Rewrite `"key", X` to `"key": X` for keys in key position.
pub(crate) fn fix_comma_for_colon(input: &str) -> String {
    KEY_COMMA_RE
        .replace_all(input, "${1}\"${2}\": ${3}")
        .to_string()
}

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Drop a trailing comma before a closing `]` or `}`.
pub(crate) fn fix_trailing_commas(input: &str) -> String {
    TRAILING_COMMA_RE.replace_all(input, "${1}").to_string()
}

/// Locate the first balanced top-level `{...}` or `[...]` substring,
/// skipping brackets inside string literals, so JSON embedded in
/// conversational wrapper text can be parsed on its own.
pub(crate) fn extract_json_slice(input: &str) -> Option<&str> {
    let start = input.find(['[', '{'])?;
    let bytes = input.as_bytes();
    let open = bytes[start];
    let close = if open == b'[' { b']' } else { b'}' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        if byte == b'"' {
            in_string = true;
        } else if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(&input[start..=i]);
            }
        }
    }
    None
}
