// Extractor module - metadata and media streams from yt-dlp
//
// Backends:
// - Python mode: `python3 -m yt_dlp` (better for YouTube, avoids bot detection)
// - CLI mode: native `yt-dlp` binary (faster, no Python dependency)
// - Auto: Python first, CLI as fallback
//
// Any backend can be wrapped in `ProxiedExtractor` to rotate egress proxies.

mod cli;
mod command;
pub mod diagnostics;
mod fallback;
mod proxied;
mod python;
mod traits;

pub use cli::CliExtractor;
pub use command::parse_metadata;
pub use diagnostics::{diagnose_error, BlockingReason};
pub use fallback::FallbackExtractor;
pub use proxied::ProxiedExtractor;
pub use python::PythonExtractor;
pub use traits::{BackendKind, Extractor, ExtractorConfig};

use std::sync::Arc;

use super::proxy::ProxyRotator;

/// Build the configured backend, wrapped in proxy rotation when a pool is given.
pub fn build_extractor(
    kind: BackendKind,
    config: ExtractorConfig,
    rotator: Option<Arc<ProxyRotator>>,
) -> Arc<dyn Extractor> {
    let backend: Arc<dyn Extractor> = match kind {
        BackendKind::Python => Arc::new(PythonExtractor::new(config)),
        BackendKind::Cli => Arc::new(CliExtractor::new(config)),
        BackendKind::Auto => Arc::new(FallbackExtractor::new(vec![
            Arc::new(PythonExtractor::new(config.clone())) as Arc<dyn Extractor>,
            Arc::new(CliExtractor::new(config)),
        ])),
    };

    match rotator {
        Some(rotator) => Arc::new(ProxiedExtractor::new(backend, rotator)),
        None => backend,
    }
}
