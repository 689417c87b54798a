// CLI extractor - uses native `yt-dlp` binary
//
// Advantages:
// - Faster than Python mode
// - No Python dependency
//
// Disadvantages:
// - More likely to trigger YouTube bot detection
// - May require different player clients

use async_trait::async_trait;
use std::process::Command as StdCommand;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::command::YtDlpInvocation;
use super::traits::{Extractor, ExtractorConfig};
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{NetworkConfig, VideoMetadata};
use crate::downloader::reference::VideoReference;
use crate::downloader::stream::MediaByteStream;
use crate::downloader::utils::retry_with_backoff;

/// Player clients tried in order when none is forced.
/// android is faster and less likely to be blocked, web handles age gates.
const DEFAULT_CLIENTS: [&str; 3] = ["android", "tv", "web"];

/// CLI-based extractor using the yt-dlp binary
pub struct CliExtractor {
    invocation: YtDlpInvocation,
    config: ExtractorConfig,
    available: OnceLock<bool>,
}

impl CliExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let path = config.ytdlp_path.clone().unwrap_or_else(Self::find_ytdlp);
        Self {
            invocation: YtDlpInvocation::binary(path),
            config,
            available: OnceLock::new(),
        }
    }

    /// Find yt-dlp binary
    fn find_ytdlp() -> String {
        let common_paths = [
            "/usr/local/bin/yt-dlp",    // pip / manual install
            "/usr/bin/yt-dlp",          // System installation
            "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        ];

        for path in common_paths {
            if std::path::Path::new(path).exists() {
                return path.to_string();
            }
        }

        // Try to find via `which`
        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                if let Ok(path) = String::from_utf8(output.stdout) {
                    let trimmed = path.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        "yt-dlp".to_string()
    }

    fn clients(&self) -> Vec<&str> {
        match &self.config.player_client {
            Some(client) => vec![client.as_str()],
            None => DEFAULT_CLIENTS.to_vec(),
        }
    }

    /// Try metadata extraction with each player client in turn.
    ///
    /// Permanent failures (private, removed, DRM) end the loop early since no
    /// other client will see a different video.
    async fn try_with_clients(
        &self,
        video: &VideoReference,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        let mut last_error = DownloadError::Unknown("No clients to try".to_string());

        for client in self.clients() {
            debug!("[CliExtractor] Trying client '{}' for {}", client, video);

            match self
                .invocation
                .fetch_metadata("CliExtractor", video, &self.config, Some(client), net)
                .await
            {
                Ok(meta) => {
                    debug!("[CliExtractor] Success with client '{}'", client);
                    return Ok(meta);
                }
                Err(e) => {
                    warn!("[CliExtractor] Client '{}' failed: {}", client, e);
                    let permanent = e.blocking_reason().is_some_and(|r| r.is_permanent());
                    last_error = e;
                    if permanent {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }

    fn ensure_available(&self) -> Result<(), DownloadError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(DownloadError::ToolNotFound("yt-dlp binary not found".to_string()))
        }
    }
}

#[async_trait]
impl Extractor for CliExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.invocation.probe())
    }

    async fn fetch_metadata(
        &self,
        video: &VideoReference,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        self.ensure_available()?;

        let meta = retry_with_backoff(self.name(), &self.config.retry, |_| {
            self.try_with_clients(video, net)
        })
        .await?;

        info!("[CliExtractor] Resolved '{}' ({}s)", meta.title, meta.duration_seconds);
        Ok(meta)
    }

    async fn open_media_stream(
        &self,
        video: &VideoReference,
        selector: &FormatSelector,
        net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError> {
        self.ensure_available()?;

        // Streaming cannot be retried per client once bytes flow, so only the
        // preferred client is used.
        let client = self.clients().first().copied();
        self.invocation
            .open_stream("CliExtractor", video, selector, &self.config, client, net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_client_replaces_defaults() {
        let cli = CliExtractor::new(
            ExtractorConfig::default()
                .with_ytdlp_path(Some("yt-dlp".into()))
                .with_player_client(Some("tv".into())),
        );
        assert_eq!(cli.clients(), vec!["tv"]);

        let cli = CliExtractor::new(ExtractorConfig::default().with_ytdlp_path(Some("yt-dlp".into())));
        assert_eq!(cli.clients(), vec!["android", "tv", "web"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let cli = CliExtractor::new(
            ExtractorConfig::default().with_ytdlp_path(Some("/nonexistent/yt-dlp-7f3a".into())),
        );
        let video = VideoReference::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();

        assert!(!cli.is_available());
        let err = cli
            .open_media_stream(&video, &FormatSelector::video(), &NetworkConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
