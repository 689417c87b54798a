// Extractor trait and common types

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{NetworkConfig, VideoMetadata};
use crate::downloader::reference::VideoReference;
use crate::downloader::stream::MediaByteStream;
use crate::downloader::utils::RetryPolicy;

/// Which extraction backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Python module yt_dlp (better for YouTube, avoids bot detection)
    Python,
    /// CLI binary yt-dlp (faster, no Python dependency)
    Cli,
    /// Python first, CLI binary as fallback
    #[default]
    Auto,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "library" => Ok(Self::Python),
            "cli" | "binary" => Ok(Self::Cli),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown backend '{}' (expected python, cli or auto)",
                other
            )),
        }
    }
}

/// Process-level settings shared by the subprocess backends
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Explicit yt-dlp binary; searched in common locations when unset
    pub ytdlp_path: Option<String>,
    /// Explicit Python interpreter; `python3` when unset
    pub python_path: Option<String>,
    /// ffmpeg used for MP3 transcoding
    pub ffmpeg_path: String,
    /// Timeout for a metadata run in seconds
    pub timeout_seconds: u64,
    /// Retry policy for metadata runs
    pub retry: RetryPolicy,
    /// Forced YouTube player client (android, web, tv)
    pub player_client: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            python_path: None,
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_seconds: 30,
            retry: RetryPolicy::default(),
            player_client: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_python_path(mut self, path: Option<String>) -> Self {
        self.python_path = path;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_player_client(mut self, client: Option<String>) -> Self {
        self.player_client = client;
        self
    }
}

/// Source of metadata and media bytes for one video.
///
/// Implementations must be cheap to share across requests. Retries belong
/// inside the implementation; callers invoke each operation once.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Whether the tools this backend shells out to are installed
    fn is_available(&self) -> bool;

    /// Resolve title, author, duration and the rest of [`VideoMetadata`].
    async fn fetch_metadata(
        &self,
        video: &VideoReference,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError>;

    /// Start producing media bytes for `selector`.
    ///
    /// Only precondition failures are returned here. Anything that goes wrong
    /// after the transfer started arrives as an `Err` item of the stream.
    async fn open_media_stream(
        &self,
        video: &VideoReference,
        selector: &FormatSelector,
        net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Python".parse::<BackendKind>(), Ok(BackendKind::Python));
        assert_eq!("binary".parse::<BackendKind>(), Ok(BackendKind::Cli));
        assert_eq!(" auto ".parse::<BackendKind>(), Ok(BackendKind::Auto));
        assert!("lux".parse::<BackendKind>().is_err());
    }
}
