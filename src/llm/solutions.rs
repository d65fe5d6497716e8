//! Per-principle solution drafting.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{clean_line, LlmProvider};

const SYSTEM_PROMPT: &str = r#"You propose engineering solutions using TRIZ inventive principles.
The user gives a problem description and a list of principles.

## Rules:
1. Write exactly one solution per principle, using only that principle.
2. Start each solution with a line containing only the principle name, unchanged.
3. Keep the principles in the order given.
4. Use technical language and no text besides the solutions.
"#;

/// One principle with the solution the model proposed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipleSolution {
    pub principle: String,
    pub solution: String,
}

pub struct SolutionWriter {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl SolutionWriter {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Ask for one solution per distinct principle, in the given order.
    pub async fn draft(&self, description: &str, principles: &[String]) -> Result<Vec<PrincipleSolution>> {
        let mut distinct: Vec<String> = Vec::new();
        for p in principles {
            if !distinct.contains(p) {
                distinct.push(p.clone());
            }
        }
        if distinct.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = format!(
            "description: {}\nPrinciples:\n{}",
            description.trim(),
            distinct
                .iter()
                .map(|p| format!("    \"{}\"", p))
                .collect::<Vec<_>>()
                .join(",\n")
        );

        let reply = self
            .provider
            .generate(&self.model, prompt, Some(SYSTEM_PROMPT.to_string()))
            .await
            .context("Failed to get solution drafting response")?;
        debug!("Solution reply: {}", reply);

        let solutions = parse_solutions(&reply, &distinct);
        if solutions.len() < distinct.len() {
            warn!(
                "Model answered {} of {} principles",
                solutions.len(),
                distinct.len()
            );
        }
        Ok(solutions)
    }
}

/// Split a reply into sections headed by principle names.
///
/// A heading is a line whose cleaned text equals a principle name, ignoring
/// case and a trailing colon. Text before the first heading is dropped, as
/// are principles without a non-empty section. Output follows `principles`.
pub fn parse_solutions(reply: &str, principles: &[String]) -> Vec<PrincipleSolution> {
    let lookup: HashMap<String, &String> = principles
        .iter()
        .map(|p| (p.to_lowercase(), p))
        .collect();

    let mut sections: HashMap<&String, Vec<&str>> = HashMap::new();
    let mut current: Option<&String> = None;

    for line in reply.lines() {
        let heading = clean_line(line).trim_end_matches(':').trim().to_lowercase();
        if let Some(principle) = lookup.get(&heading) {
            current = Some(*principle);
            sections.entry(*principle).or_default();
            continue;
        }
        if let Some(principle) = current {
            sections.entry(principle).or_default().push(line.trim());
        }
    }

    principles
        .iter()
        .filter_map(|p| {
            let text = sections.get(p)?.join("\n").trim().to_string();
            (!text.is_empty()).then(|| PrincipleSolution {
                principle: p.clone(),
                solution: text,
            })
        })
        .collect()
}
