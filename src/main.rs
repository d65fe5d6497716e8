//! TRIZ Contradiction Resolver - interactive console
//!
//! Describe a problem (or give the two effects directly) and get the
//! matching engineering parameters and inventive principles.

use anyhow::{Context, Result};
use std::io::{self, Write};
use tracing::info;

use triz_resolver::llm::{ContradictionExtractor, SolutionWriter};
use triz_resolver::services::bootstrap;
use triz_resolver::utils::init_logging;
use triz_resolver::{ContradictionResolver, ResolverConfig};

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn run_query(
    resolver: &ContradictionResolver,
    writer: &SolutionWriter,
    description: Option<&str>,
    positive: &str,
    negative: &str,
    candidates: usize,
) -> Result<()> {
    let (result, report) = resolver
        .resolve_with_candidates(positive, negative, candidates)
        .await?;

    println!("\nClosest parameters:\n{}", "-".repeat(60));
    for (label, hits) in [("Improving", &report.positive), ("Worsening", &report.negative)] {
        println!("{}:", label);
        for hit in hits {
            println!("   {:>2}. {} (distance {:.4})", hit.position, hit.name, hit.distance);
        }
    }

    println!(
        "\nContradiction: {} vs {}",
        result.positive_match.name, result.negative_match.name
    );
    if result.principles.is_empty() {
        println!("No inventive principles are documented for this pair.");
    } else {
        println!("Inventive principles:");
        for (i, name) in result.principles.iter().enumerate() {
            println!("   {}. {}", i + 1, name);
        }
    }

    if let Some(description) = description.filter(|_| !result.principles.is_empty()) {
        if prompt("\nDraft solutions with these principles? [y/N] ")?.eq_ignore_ascii_case("y") {
            match writer.draft(description, &result.principles).await {
                Ok(solutions) => {
                    for s in solutions {
                        println!("\n{}\n{}", s.principle, s.solution);
                    }
                }
                Err(e) => println!("Solution drafting failed: {:#}", e),
            }
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let config = ResolverConfig::from_env().context("Invalid configuration")?;

    println!("\n{}", "=".repeat(60));
    println!("TRIZ Contradiction Resolver v{}", env!("CARGO_PKG_VERSION"));
    println!("{}\n", "=".repeat(60));

    let embedder = bootstrap::embedder_from_config(&config)?;
    let resolver = bootstrap::load_resolver(&config, embedder).await?;
    let provider = bootstrap::chat_provider_from_config(&config)?;
    let extractor = ContradictionExtractor::new(provider.clone(), config.chat_model.clone());
    let writer = SolutionWriter::new(provider, config.chat_model.clone());

    println!("Commands: 'quit' | 'pair' (enter both effects yourself)\n");

    loop {
        let input = prompt("Problem description: ")?;
        if input.is_empty() {
            continue;
        }

        let outcome = match input.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "pair" => {
                let positive = prompt("Positive effect: ")?;
                let negative = prompt("Negative effect: ")?;
                if positive.is_empty() || negative.is_empty() {
                    continue;
                }
                run_query(&resolver, &writer, None, &positive, &negative, config.candidates).await
            }
            _ => match extractor.extract(&input).await {
                Ok(c) => {
                    info!("Extracted contradiction for action {:?}", c.action);
                    println!("\nAction: {}", c.action);
                    println!("Positive effect: {}", c.positive_effect);
                    println!("Negative effect: {}", c.negative_effect);
                    run_query(
                        &resolver,
                        &writer,
                        Some(&input),
                        &c.positive_effect,
                        &c.negative_effect,
                        config.candidates,
                    )
                    .await
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = outcome {
            println!("Error: {:#}\n", e);
        }
    }

    Ok(())
}
