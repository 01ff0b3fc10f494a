//! Cleaning and repair of language-model output
//!
//! Models routinely ignore "raw JSON only" instructions: they wrap answers in code fences,
//! prepend `#` commentary, leave trailing commas or emit Python literals. Everything here
//! treats the completion as untrusted text. Nothing is ever evaluated.
//!
//! ```rust
//! use knowflow_core::llm_output::{clean_response, parse_lenient};
//!
//! let raw = "```json\n{nodes: [], relationships: [],}\n```";
//! let value = parse_lenient(&clean_response(raw)).unwrap();
//! assert!(value["nodes"].as_array().unwrap().is_empty());
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static FENCE_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+\-]*[ \t]*\r?\n?").unwrap());
static FENCE_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?[ \t]*```\s*$").unwrap());
static COMMENT_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#[^\n]*(\n|$)").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static UNQUOTED_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*):").unwrap());
static UNQUOTED_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(:\s*)([A-Za-z_][A-Za-z0-9_ .\-]*?)(\s*[,}\]])").unwrap());
static PY_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([:\[,]\s*)(True|False|None)(\s*[,}\]])").unwrap());
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Normalize a raw completion before parsing
///
/// Strips a leading/trailing code fence (with optional language tag), drops `#` comment
/// lines, removes stray backticks and collapses whitespace runs to a single space.
pub fn clean_response(raw: &str) -> String {
    let text = FENCE_OPEN_RE.replace(raw, "");
    let text = FENCE_CLOSE_RE.replace(&text, "");
    let text = COMMENT_LINE_RE.replace_all(&text, "");
    let text = text.replace('`', "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Permissive repair of almost-JSON text
///
/// Applied once after a failed parse. The passes are textual and may damage strings that
/// contain `key: value` fragments, which is acceptable because the input already failed
/// strict parsing.
pub fn repair_json(text: &str) -> String {
    let mut repaired = text.trim().to_string();

    // Python dict output: only safe to swap quotes when no double quote is present
    if !repaired.contains('"') && repaired.contains('\'') {
        repaired = repaired.replace('\'', "\"");
    }
    repaired = replace_until_stable(&PY_LITERAL_RE, &repaired, |caps| {
        let literal = match &caps[2] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        };
        format!("{}{}{}", &caps[1], literal, &caps[3])
    });

    repaired = UNQUOTED_KEY_RE
        .replace_all(&repaired, r#"${1}"${2}"${3}:"#)
        .into_owned();

    repaired = replace_until_stable(&UNQUOTED_VALUE_RE, &repaired, |caps| {
        let value = caps[2].trim();
        if matches!(value, "true" | "false" | "null") {
            caps[0].to_string()
        } else {
            format!("{}\"{}\"{}", &caps[1], value, &caps[3])
        }
    });

    TRAILING_COMMA_RE.replace_all(&repaired, "${1}").into_owned()
}

/// Parse JSON strictly, falling back to one repair-and-retry
///
/// Prose surrounding a single top-level object is trimmed off before the retry.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::debug!(error = %err, "strict JSON parse failed, attempting repair");
            let candidate = outermost_object(text).unwrap_or(text);
            serde_json::from_str(&repair_json(candidate))
        }
    }
}

/// Slice from the first `{` to the last `}`
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Adjacent matches share their delimiter, so a single pass can skip every other one
fn replace_until_stable<F>(re: &Regex, text: &str, mut replacer: F) -> String
where
    F: FnMut(&Captures) -> String,
{
    let mut current = text.to_string();
    // Each pass fixes at least one match; the bound keeps pathological input finite
    for _ in 0..8 {
        let next = re.replace_all(&current, |caps: &Captures| replacer(caps)).into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}
