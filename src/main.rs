use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use youtube_relay::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    youtube_relay::run(Config::parse()).await
}
