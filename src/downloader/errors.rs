// Error types for extractor backends

use thiserror::Error;

use super::extractors::diagnostics::{diagnose_error, BlockingReason};

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Timed out waiting for the extractor
    #[error("Network timeout: YouTube is not responding")]
    NetworkTimeout,

    /// YouTube blocked the request (429, bot detection, etc.)
    #[error("YouTube is throttling or blocking requests from this address")]
    BlockedByYouTube,

    /// yt-dlp, python or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Not a playable YouTube video URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Blocking reason behind this error, if the message carries one.
    pub fn blocking_reason(&self) -> Option<BlockingReason> {
        match self {
            Self::NetworkTimeout => Some(BlockingReason::NetworkTimeout),
            Self::BlockedByYouTube => Some(BlockingReason::RateLimited),
            Self::ToolNotFound(_) | Self::InvalidUrl(_) => None,
            Self::ParseError(msg) | Self::ExecutionError(msg) | Self::Unknown(msg) => {
                diagnose_error(msg)
            }
        }
    }

    /// Whether trying again (possibly through another proxy) might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout | Self::BlockedByYouTube => true,
            Self::ToolNotFound(_) | Self::InvalidUrl(_) | Self::ParseError(_) => false,
            Self::ExecutionError(_) | Self::Unknown(_) => self
                .blocking_reason()
                .is_some_and(|reason| reason.is_retryable()),
        }
    }
}

// Classify raw extractor stderr
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();
        let timed_out = lower.contains("timeout") || lower.contains("timed out");

        // IP blocking detection (most important)
        if timed_out && lower.contains("youtube.com") {
            return Self::BlockedByYouTube;
        }

        if timed_out {
            return Self::NetworkTimeout;
        }

        if lower.contains("429") || lower.contains("bot") || lower.contains("blocked") {
            return Self::BlockedByYouTube;
        }

        // Case-sensitive: "HTTP Error 404: Not Found" is not a missing tool
        if s.contains("not found") || s.contains("No such file") || s.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        if lower.contains("parse") || lower.contains("json") {
            return Self::ParseError(s);
        }

        if lower.contains("invalid url") || lower.contains("unsupported url") {
            return Self::InvalidUrl(s);
        }

        Self::Unknown(s)
    }
}
