//! JSON recovery from free-text model replies
//!
//! Models wrap JSON in markdown fences or prose despite instructions. Recovery is
//! an ordered list of strategies, each returning its own result; the first success
//! wins and every failure is kept for the error message.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::synthesis::SynthesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole reply is JSON.
    Direct,
    /// The body of the first ```json fenced block.
    FencedBlock,
    /// From the first `{` to the last `}`.
    BraceSpan,
}

/// Strategies in the order they are tried.
pub const PARSE_ORDER: [ParseStrategy; 3] = [
    ParseStrategy::Direct,
    ParseStrategy::FencedBlock,
    ParseStrategy::BraceSpan,
];

fn fenced_json_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("static fence pattern"))
}

impl ParseStrategy {
    pub fn name(self) -> &'static str {
        match self {
            ParseStrategy::Direct => "direct",
            ParseStrategy::FencedBlock => "fenced block",
            ParseStrategy::BraceSpan => "brace span",
        }
    }

    /// Try this strategy alone.
    pub fn attempt(self, text: &str) -> Result<Value, String> {
        match self {
            ParseStrategy::Direct => serde_json::from_str(text).map_err(|e| e.to_string()),
            ParseStrategy::FencedBlock => {
                let caps = fenced_json_regex()
                    .captures(text)
                    .ok_or_else(|| "no ```json block".to_string())?;
                serde_json::from_str(&caps[1]).map_err(|e| e.to_string())
            }
            ParseStrategy::BraceSpan => {
                let start = text.find('{').ok_or_else(|| "no '{' found".to_string())?;
                let end = text.rfind('}').ok_or_else(|| "no '}' found".to_string())?;
                if end <= start {
                    return Err("no '{...}' span".to_string());
                }
                serde_json::from_str(&text[start..=end]).map_err(|e| e.to_string())
            }
        }
    }
}

/// Parse a model reply as JSON, trying each strategy of [`PARSE_ORDER`] in turn.
pub fn parse_model_json(text: &str) -> Result<(Value, ParseStrategy), SynthesisError> {
    if text.trim().is_empty() {
        return Err(SynthesisError::EmptyReply);
    }

    let mut failures = Vec::with_capacity(PARSE_ORDER.len());
    for strategy in PARSE_ORDER {
        match strategy.attempt(text) {
            Ok(value) => return Ok((value, strategy)),
            Err(reason) => failures.push(format!("{}: {reason}", strategy.name())),
        }
    }

    Err(SynthesisError::Unparsable(failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_json_parses() {
        let (value, strategy) = parse_model_json(r#"{"a":1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::Direct);
    }

    #[test]
    fn fenced_block_parses() {
        let (value, strategy) = parse_model_json("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::FencedBlock);
    }

    #[test]
    fn fence_label_is_case_insensitive() {
        let text = "Here you go:\n```JSON\n{\"a\": [1, 2]}\n```\nThanks";
        let (value, _) = parse_model_json(text).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn brace_span_parses_surrounding_noise() {
        let (value, strategy) = parse_model_json(r#"noise {"a":1} noise"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strategy, ParseStrategy::BraceSpan);
    }

    #[test]
    fn empty_reply_fails() {
        assert!(matches!(parse_model_json(""), Err(SynthesisError::EmptyReply)));
        assert!(matches!(parse_model_json("  \n"), Err(SynthesisError::EmptyReply)));
    }

    #[test]
    fn garbage_without_braces_fails_with_every_reason() {
        let err = parse_model_json("I cannot help with that.").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("direct"));
        assert!(message.contains("fenced block"));
        assert!(message.contains("brace span"));
    }

    #[test]
    fn broken_brace_span_fails() {
        assert!(parse_model_json("} backwards {").is_err());
        assert!(parse_model_json("{ not: json }").is_err());
    }
}
