//! Candidate fact extraction
//!
//! A relevance filter, not NLP: a line is kept when it is long enough to be a
//! claim and either carries a digit or mentions one of the strategy keywords the
//! source documents are written with (Czech and English).

use regex::Regex;
use std::sync::OnceLock;

use crate::{truncate_chars, CandidateFact, SourceDocument};

pub const MIN_FACT_LINE_CHARS: usize = 28;
pub const MAX_FACTS_PER_SOURCE: usize = 25;
pub const MAX_CLAIM_CHARS: usize = 400;

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(cíl|target|expanze|priorit|pilot|retence|členství|trh)")
            .expect("static keyword pattern")
    })
}

fn has_digit(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit())
}

/// Whether a trimmed line qualifies as a candidate fact.
pub fn is_candidate_line(line: &str) -> bool {
    line.chars().count() >= MIN_FACT_LINE_CHARS
        && (has_digit(line) || keyword_regex().is_match(line))
}

/// Extract up to [`MAX_FACTS_PER_SOURCE`] candidate facts, in document order.
pub fn extract_facts(source: &SourceDocument) -> Vec<CandidateFact> {
    source
        .content
        .lines()
        .map(str::trim)
        .filter(|line| is_candidate_line(line))
        .take(MAX_FACTS_PER_SOURCE)
        .enumerate()
        .map(|(idx, line)| CandidateFact {
            id: format!("{}-f{}", source.id, idx + 1),
            source_id: source.id.clone(),
            claim: truncate_chars(line, MAX_CLAIM_CHARS),
            has_numeric_signal: has_digit(line),
        })
        .collect()
}

/// Facts for every source, grouped by source in input order.
pub fn extract_all_facts(sources: &[SourceDocument]) -> Vec<CandidateFact> {
    sources.iter().flat_map(extract_facts).collect()
}
