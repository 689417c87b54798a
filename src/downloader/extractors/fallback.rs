// Fallback extractor - automatic backend selection
//
// Strategy:
// 1. Python mode first (better anti-bot bypass on YouTube)
// 2. CLI binary when Python is missing or failed
// 3. Stop early on failures no backend can fix

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::traits::Extractor;
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{NetworkConfig, VideoMetadata};
use crate::downloader::reference::VideoReference;
use crate::downloader::stream::MediaByteStream;

/// Tries each backend in order, skipping those whose tools are missing
pub struct FallbackExtractor {
    backends: Vec<Arc<dyn Extractor>>,
}

impl FallbackExtractor {
    pub fn new(backends: Vec<Arc<dyn Extractor>>) -> Self {
        Self { backends }
    }

    /// Names of the backends that are installed, in try order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.backends
            .iter()
            .filter(|b| b.is_available())
            .map(|b| b.name())
            .collect()
    }

    fn no_backend() -> DownloadError {
        DownloadError::ToolNotFound("Neither Python yt_dlp nor yt-dlp binary available".to_string())
    }
}

/// Whether a failure on one backend is worth another backend's attempt.
fn should_fall_back(e: &DownloadError) -> bool {
    match e {
        DownloadError::InvalidUrl(_) => false,
        _ => !e.blocking_reason().is_some_and(|r| r.is_permanent()),
    }
}

#[async_trait]
impl Extractor for FallbackExtractor {
    fn name(&self) -> &'static str {
        "auto"
    }

    // Probes every backend, so none is left to probe later on a request path.
    fn is_available(&self) -> bool {
        !self.available_backends().is_empty()
    }

    async fn fetch_metadata(
        &self,
        video: &VideoReference,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        let mut last_error = None;

        for backend in self.backends.iter().filter(|b| b.is_available()) {
            info!("[Fallback] Trying {} for {}", backend.name(), video);

            match backend.fetch_metadata(video, net).await {
                Ok(meta) => return Ok(meta),
                Err(e) => {
                    warn!("[Fallback] {} failed: {}", backend.name(), e);
                    let fall_back = should_fall_back(&e);
                    last_error = Some(e);
                    if !fall_back {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(Self::no_backend))
    }

    async fn open_media_stream(
        &self,
        video: &VideoReference,
        selector: &FormatSelector,
        net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError> {
        let mut last_error = None;

        for backend in self.backends.iter().filter(|b| b.is_available()) {
            match backend.open_media_stream(video, selector, net).await {
                Ok(stream) => {
                    info!("[Fallback] Streaming {} through {}", selector.label, backend.name());
                    return Ok(stream);
                }
                Err(e) => {
                    warn!("[Fallback] {} could not open stream: {}", backend.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(Self::no_backend))
    }
}
