use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use triz_resolver::retrieval::ParameterIndex;
use triz_resolver::services::bootstrap;
use triz_resolver::utils::init_logging;
use triz_resolver::ResolverConfig;

/// Re-embed the parameter list and overwrite the index cache.
/// Usage: build_index [OUTPUT_PATH]
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let mut config = ResolverConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = std::env::args().nth(1) {
        config.index_path = PathBuf::from(path);
    }

    let start = Instant::now();
    let names = ParameterIndex::read_names(&config.parameters_path)?;
    info!("Read {} parameter names from {:?}", names.len(), config.parameters_path);

    let embedder = bootstrap::embedder_from_config(&config)?;
    let index = ParameterIndex::build(&names, embedder.as_ref(), config.build)
        .await
        .context("Index build aborted; existing cache left untouched")?;
    index.save(&config.index_path)?;

    info!(
        "Saved {} parameters ({} dims) to {:?} in {:?}",
        index.len(),
        index.dimensions(),
        config.index_path,
        start.elapsed()
    );
    Ok(())
}
