// Downloader module - extraction backends and the streaming download path

pub mod errors;
pub mod extractors;
pub mod filename;
pub mod format_selector;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod proxy;
pub mod reference;
pub mod stream;
pub mod utils;

pub use errors::DownloadError;
pub use extractors::{build_extractor, BackendKind, Extractor, ExtractorConfig};
pub use filename::sanitize_filename;
pub use format_selector::{FormatSelector, OutputContainer};
pub use lifecycle::{LifecycleState, ResponseLifecycle};
pub use models::{MediaKind, NetworkConfig, VideoMetadata};
pub use orchestrator::DownloadOrchestrator;
pub use proxy::{ProxyCredential, ProxyRotator};
pub use reference::VideoReference;
pub use stream::MediaByteStream;
pub use utils::RetryPolicy;
