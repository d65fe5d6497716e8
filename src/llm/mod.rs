//! LLM Module
//!
//! Chat back-ends plus the two prompt-driven helpers that feed and extend
//! the resolver: contradiction extraction and per-principle solutions.

mod extraction;
mod provider;
mod solutions;

pub use extraction::{parse_contradiction, ContradictionExtractor, TechnicalContradiction};
pub use provider::{ChatSettings, LlmProvider, OllamaProvider, OpenAiCompatibleProvider};
pub use solutions::{parse_solutions, PrincipleSolution, SolutionWriter};

/// Strip list markers, `1.` / `2)` enumerators, markdown emphasis and
/// surrounding whitespace from a reply line.
pub(crate) fn clean_line(line: &str) -> &str {
    let line = line.trim().trim_start_matches(['-', '*', '#', '>']).trim();
    strip_enumerator(line).trim_matches('*').trim()
}

fn strip_enumerator(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    match rest.strip_prefix(['.', ')']) {
        Some(after) if after.is_empty() || after.starts_with(char::is_whitespace) => after.trim_start(),
        _ => line,
    }
}
