use anyhow::Result;

use triz_resolver::services::run_resolver_server;
use triz_resolver::utils::init_logging;
use triz_resolver::ResolverConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();
    run_resolver_server(ResolverConfig::from_env()?).await
}
