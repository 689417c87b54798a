// Proxy rotation decorator

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::Extractor;
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{NetworkConfig, VideoMetadata};
use crate::downloader::proxy::ProxyRotator;
use crate::downloader::reference::VideoReference;
use crate::downloader::stream::MediaByteStream;

/// Wraps a backend so that every call leaves through the next pool entry.
///
/// One credential is drawn per call; a metadata fetch and the stream open of
/// the same request may therefore use different proxies.
pub struct ProxiedExtractor {
    inner: Arc<dyn Extractor>,
    rotator: Arc<ProxyRotator>,
}

impl ProxiedExtractor {
    pub fn new(inner: Arc<dyn Extractor>, rotator: Arc<ProxyRotator>) -> Self {
        Self { inner, rotator }
    }

    fn rotate(&self, net: &NetworkConfig) -> NetworkConfig {
        let proxy = self.rotator.next();
        debug!("[{}] using proxy {}", self.inner.name(), proxy);
        net.clone().with_proxy(Some(proxy))
    }
}

#[async_trait]
impl Extractor for ProxiedExtractor {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    async fn fetch_metadata(
        &self,
        video: &VideoReference,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        let net = self.rotate(net);
        let result = self.inner.fetch_metadata(video, &net).await;
        if let Err(e) = &result {
            if e.blocking_reason().is_some_and(|r| r.proxy_might_help()) {
                if let Some(proxy) = &net.proxy {
                    warn!("[{}] {} may be flagged: {}", self.inner.name(), proxy, e);
                }
            }
        }
        result
    }

    async fn open_media_stream(
        &self,
        video: &VideoReference,
        selector: &FormatSelector,
        net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError> {
        let net = self.rotate(net);
        self.inner.open_media_stream(video, selector, &net).await
    }
}
