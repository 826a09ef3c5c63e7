use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nginxop_controller::cli::OperatorOpt;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    OperatorOpt::parse().process().await
}
