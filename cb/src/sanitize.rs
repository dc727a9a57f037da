//! Recover a JSON array of objects from noisy model output
//!
//! Models asked for "JSON only" still wrap answers in code fences, prose,
//! quotes, or literal escape sequences. [`sanitize`] runs an ordered list of
//! small transforms, each a no-op when it does not apply, then extracts and
//! parses the array.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Opening or closing code fence, with an optional language tag
static FENCE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+.\-]*").ok());

/// Longest candidate kept on an error for diagnostics
const CANDIDATE_PREVIEW_LEN: usize = 2000;

/// Ways structured output extraction can fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("No JSON array found in model output")]
    NoStructuredOutput,

    #[error("Malformed JSON array: {diagnostic}")]
    MalformedStructuredOutput { diagnostic: String, candidate: String },
}

impl SanitizeError {
    fn malformed(diagnostic: impl Into<String>, candidate: &str) -> Self {
        SanitizeError::MalformedStructuredOutput {
            diagnostic: diagnostic.into(),
            candidate: preview(candidate),
        }
    }

    /// Parser diagnostic, if the failure got as far as parsing
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            SanitizeError::NoStructuredOutput => None,
            SanitizeError::MalformedStructuredOutput { diagnostic, .. } => Some(diagnostic),
        }
    }
}

/// Run every sanitizer step and return the array's objects in order
pub fn sanitize(raw: &str) -> Result<Vec<Map<String, Value>>, SanitizeError> {
    debug!(raw_len = raw.len(), "sanitize: called");
    let text = trim(raw);
    let text = strip_enclosing_quotes(&text);
    let text = strip_fences(&text);
    let text = unescape_literals(&text);
    let candidate = extract_array(&text)?;
    parse_objects(candidate)
}

/// Step 1: trim surrounding whitespace
pub fn trim(text: &str) -> String {
    text.trim().to_string()
}

/// Step 2: strip one pair of enclosing quotes
///
/// A double-quoted JSON string literal is decoded so its escapes resolve.
pub fn strip_enclosing_quotes(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return text.to_string();
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first != last || !(first == b'"' || first == b'\'') {
        return text.to_string();
    }

    if first == b'"'
        && let Ok(decoded) = serde_json::from_str::<String>(text)
    {
        debug!("strip_enclosing_quotes: decoded JSON string literal");
        return decoded.trim().to_string();
    }

    text[1..text.len() - 1].trim().to_string()
}

/// Step 3: drop code fence delimiters and their language tags, keep the body
pub fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    match FENCE.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.replace("```", "").trim().to_string(),
    }
}

/// Step 4: reverse literal `\n`, `\t`, `\"`, `\\` escapes
///
/// Skipped when the text has no such markers or its array already parses,
/// so valid JSON with escaped strings is left alone.
pub fn unescape_literals(text: &str) -> String {
    let has_markers = ["\\n", "\\t", "\\\"", "\\\\"].iter().any(|m| text.contains(m));
    if !has_markers {
        return text.to_string();
    }
    if let Ok(candidate) = extract_array(text)
        && serde_json::from_str::<Value>(candidate).is_ok()
    {
        return text.to_string();
    }

    debug!("unescape_literals: reversing literal escapes");
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('t') => {
                out.push('\t');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Step 5: slice from the first `[` to the last `]`
pub fn extract_array(text: &str) -> Result<&str, SanitizeError> {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(SanitizeError::NoStructuredOutput),
    }
}

/// Step 6: parse the candidate as an array whose elements are all objects
pub fn parse_objects(candidate: &str) -> Result<Vec<Map<String, Value>>, SanitizeError> {
    let values: Vec<Value> = serde_json::from_str(candidate).map_err(|e| {
        debug!(error = %e, "parse_objects: parse failed");
        SanitizeError::malformed(e.to_string(), candidate)
    })?;

    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Value::Object(map) => Ok(map),
            other => Err(SanitizeError::malformed(
                format!("element {} is {}, expected an object", idx, kind(&other)),
                candidate,
            )),
        })
        .collect()
}

/// Strip a single code fence enclosing the whole text
///
/// Unlike [`strip_fences`] this only fires when the fence wraps everything,
/// so code that merely contains fenced snippets stays verbatim.
pub fn strip_enclosing_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return text.to_string();
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    // First line after the opening fence is the language tag
    let body = match inner.find('\n') {
        Some(pos) => &inner[pos + 1..],
        None => inner,
    };
    body.trim_end_matches(['\n', '\r']).to_string()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(candidate: &str) -> String {
    if candidate.len() <= CANDIDATE_PREVIEW_LEN {
        return candidate.to_string();
    }
    let mut end = CANDIDATE_PREVIEW_LEN;
    while !candidate.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &candidate[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filenames(objects: &[Map<String, Value>]) -> Vec<String> {
        objects
            .iter()
            .map(|o| o["filename"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_plain_array() {
        let objs = sanitize(r#"[{"filename": "index.html", "task": "markup"}]"#).unwrap();
        assert_eq!(filenames(&objs), vec!["index.html"]);
    }

    #[test]
    fn test_fenced_with_leading_prose() {
        let raw = "Sure! Here is the breakdown you asked for:\n\n```json\n[\n  {\"filename\": \"index.html\", \"task\": \"page\"},\n  {\"filename\": \"style.css\", \"task\": \"styles\"}\n]\n```\nLet me know if you need more.";
        let objs = sanitize(raw).unwrap();
        assert_eq!(filenames(&objs), vec!["index.html", "style.css"]);
    }

    #[test]
    fn test_quoted_json_string() {
        let raw = r#""[{\"filename\": \"app.js\", \"task\": \"logic\"}]""#;
        let objs = sanitize(raw).unwrap();
        assert_eq!(filenames(&objs), vec!["app.js"]);
    }

    #[test]
    fn test_single_quoted() {
        let raw = r#"'[{"filename": "a.txt", "task": "t"}]'"#;
        assert_eq!(filenames(&sanitize(raw).unwrap()), vec!["a.txt"]);
    }

    #[test]
    fn test_literal_escapes_reversed() {
        let raw = r#"[\n  {\"filename\": \"main.py\",\n \"task\": \"entry\"}\n]"#;
        let objs = sanitize(raw).unwrap();
        assert_eq!(filenames(&objs), vec!["main.py"]);
    }

    #[test]
    fn test_valid_escapes_left_alone() {
        let raw = r#"[{"filename": "notes.md", "task": "line one\nline two"}]"#;
        let objs = sanitize(raw).unwrap();
        assert_eq!(objs[0]["task"], "line one\nline two");
    }

    #[test]
    fn test_nested_brackets() {
        let raw = r#"Plan: [{"filename": "data.json", "task": "store [1, 2, 3]", "deps": ["x"]}] done"#;
        let objs = sanitize(raw).unwrap();
        assert_eq!(objs[0]["task"], "store [1, 2, 3]");
    }

    #[test]
    fn test_escaped_unicode() {
        let raw = r#"[{"filename": "caf\u00e9.txt", "task": "menu"}]"#;
        assert_eq!(filenames(&sanitize(raw).unwrap()), vec!["café.txt"]);
    }

    #[test]
    fn test_no_array() {
        assert_eq!(sanitize("I cannot help with that."), Err(SanitizeError::NoStructuredOutput));
        assert_eq!(sanitize("] backwards ["), Err(SanitizeError::NoStructuredOutput));
        assert_eq!(sanitize(""), Err(SanitizeError::NoStructuredOutput));
    }

    #[test]
    fn test_malformed_carries_candidate() {
        let err = sanitize(r#"[{"filename": "a.js", "task": }]"#).unwrap_err();
        match err {
            SanitizeError::MalformedStructuredOutput { diagnostic, candidate } => {
                assert!(!diagnostic.is_empty());
                assert!(candidate.starts_with('['));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_object_elements_rejected() {
        let err = sanitize(r#"["index.html", "style.css"]"#).unwrap_err();
        assert!(err.diagnostic().unwrap().contains("element 0 is a string"));
    }

    #[test]
    fn test_empty_array_is_ok() {
        assert_eq!(sanitize("[]").unwrap(), Vec::<Map<String, Value>>::new());
    }

    #[test]
    fn test_strip_fences_keeps_body() {
        assert_eq!(strip_fences("```js\nlet a = 1;\n```"), "let a = 1;");
        assert_eq!(strip_fences("no fences"), "no fences");
    }

    #[test]
    fn test_strip_enclosing_fence() {
        assert_eq!(strip_enclosing_fence("```html\n<p>hi</p>\n```"), "<p>hi</p>");
        assert_eq!(strip_enclosing_fence("```\nbody\n```\n"), "body");

        let readme = "# Title\n\n```sh\nmake\n```\n";
        assert_eq!(strip_enclosing_fence(readme), readme);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(CANDIDATE_PREVIEW_LEN);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.len() <= CANDIDATE_PREVIEW_LEN + 3);
    }

    fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
        ("[a-zA-Z0-9_./-]{1,16}", "[a-zA-Z0-9 ,.:;!?'-]{0,40}").prop_map(|(f, t)| {
            let mut map = Map::new();
            map.insert("filename".to_string(), Value::String(f));
            map.insert("task".to_string(), Value::String(t));
            map
        })
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_total(raw in ".{0,200}") {
            match sanitize(&raw) {
                Ok(_) | Err(SanitizeError::NoStructuredOutput) | Err(SanitizeError::MalformedStructuredOutput { .. }) => {}
            }
        }

        #[test]
        fn prop_sanitize_is_idempotent(objs in prop::collection::vec(object_strategy(), 0..6)) {
            let serialized = serde_json::to_string(&objs).unwrap();
            let first = sanitize(&serialized).unwrap();
            let again = sanitize(&serde_json::to_string(&first).unwrap()).unwrap();
            prop_assert_eq!(&first, &objs);
            prop_assert_eq!(first, again);
        }

        #[test]
        fn prop_fenced_prose_is_recovered(
            objs in prop::collection::vec(object_strategy(), 1..5),
            lead in "[a-zA-Z ,.:!]{0,60}",
            tail in "[a-zA-Z ,.:!]{0,60}",
        ) {
            let raw = format!("{}\n```json\n{}\n```\n{}", lead, serde_json::to_string_pretty(&objs).unwrap(), tail);
            prop_assert_eq!(sanitize(&raw).unwrap(), objs);
        }
    }
}
