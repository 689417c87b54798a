pub mod config;
pub mod downloader;
pub mod server;

use anyhow::Result;
use tracing::info;

pub use config::Config;

/// Build the extractor stack from `config` and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    // Backend probes spawn `--version` subprocesses synchronously.
    let state = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || config.build_state()).await??
    };
    info!(
        "starting youtube-relay {} with backend '{}'",
        env!("CARGO_PKG_VERSION"),
        config.backend
    );
    server::serve(config.listen_addr(), state).await
}
