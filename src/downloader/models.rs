// Common data models for the relay

use serde::{Deserialize, Serialize};

use super::format_selector::FormatSelector;
use super::proxy::ProxyCredential;

/// Substituted when the source has no description.
pub const DESCRIPTION_PLACEHOLDER: &str = "No description available";

/// Substituted when the source has no uploader name.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Video information resolved by an extractor.
///
/// Built once per request and never shared between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author_name: String,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub thumbnail_url: String,
    pub description: String,
}

impl VideoMetadata {
    /// Builds metadata, substituting placeholders for missing author and description.
    pub fn new(
        title: Option<String>,
        author_name: Option<String>,
        duration_seconds: u64,
        view_count: u64,
        thumbnail_url: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            title: title.unwrap_or_default(),
            author_name: non_empty(author_name).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            duration_seconds,
            view_count,
            thumbnail_url: thumbnail_url.unwrap_or_default(),
            description: non_empty(description)
                .unwrap_or_else(|| DESCRIPTION_PLACEHOLDER.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// What a download route produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Audio => "audio/mpeg",
            Self::Video => "video/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Base file name used when the title yields nothing usable.
    pub fn default_base_name(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// The fixed selector for this kind; clients never choose formats.
    pub fn selector(&self) -> FormatSelector {
        match self {
            Self::Audio => FormatSelector::audio(),
            Self::Video => FormatSelector::video(),
        }
    }

    /// JSON error returned when the download fails before any byte is sent.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Audio => "Failed to download audio",
            Self::Video => "Failed to download video",
        }
    }
}

/// Per-call network options handed to an extractor
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Egress proxy for this call
    pub proxy: Option<ProxyCredential>,

    pub user_agent: String,

    pub accept_language: String,
}

impl NetworkConfig {
    pub fn with_proxy(mut self, proxy: Option<ProxyCredential>) -> Self {
        self.proxy = proxy;
        self
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}
