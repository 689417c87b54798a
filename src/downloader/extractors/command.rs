// yt-dlp invocation shared by the Python and CLI backends
//
// Both backends run the same yt-dlp; they only differ in the program that
// hosts it (`python3 -m yt_dlp` vs the native binary).

use serde::Deserialize;
use std::process::Command as StdCommand;
use tracing::{debug, warn};

use super::diagnostics::diagnose_error;
use super::traits::ExtractorConfig;
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{NetworkConfig, VideoMetadata};
use crate::downloader::reference::VideoReference;
use crate::downloader::stream::MediaByteStream;
use crate::downloader::utils::{run_output_with_timeout, spawn_media_pipeline, PipelineStage};

/// How to start yt-dlp: a program plus the arguments that precede yt-dlp's own.
#[derive(Debug, Clone)]
pub struct YtDlpInvocation {
    pub program: String,
    pub prefix: Vec<String>,
}

impl YtDlpInvocation {
    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            program: path.into(),
            prefix: Vec::new(),
        }
    }

    pub fn python_module(interpreter: impl Into<String>) -> Self {
        Self {
            program: interpreter.into(),
            prefix: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    fn args(&self, rest: Vec<String>) -> Vec<String> {
        let mut args = self.prefix.clone();
        args.extend(rest);
        args
    }

    /// `<program> <prefix> --version` exits successfully.
    pub fn probe(&self) -> bool {
        match StdCommand::new(&self.program)
            .args(self.args(vec!["--version".to_string()]))
            .output()
        {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    /// Run `--dump-json` and parse the result.
    pub async fn fetch_metadata(
        &self,
        label: &str,
        video: &VideoReference,
        config: &ExtractorConfig,
        client: Option<&str>,
        net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        let args = self.args(metadata_args(video, config, client, net));
        debug!("[{}] Running: {} {}", label, self.program, redact(&args).join(" "));

        let output = run_output_with_timeout(&self.program, args, config.timeout_seconds).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if let Some(reason) = diagnose_error(&stderr) {
                warn!("[{}] {} for {}: {}", label, reason.description(), video, stderr.trim());
            }
            return Err(DownloadError::from(stderr));
        }

        parse_metadata(&output.stdout)
    }

    /// Spawn yt-dlp writing the selected format to stdout, followed by an
    /// ffmpeg stage when the selector asks for MP3.
    pub fn open_stream(
        &self,
        label: &str,
        video: &VideoReference,
        selector: &FormatSelector,
        config: &ExtractorConfig,
        client: Option<&str>,
        net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError> {
        let args = self.args(stream_args(video, selector, client, net));
        debug!("[{}] Streaming {} via {} {}", label, selector, self.program, redact(&args).join(" "));

        let mut stages = vec![PipelineStage::new(self.program.clone(), args)];
        if selector.needs_transcode() {
            stages.push(PipelineStage::new(config.ffmpeg_path.clone(), mp3_transcode_args()));
        }
        spawn_media_pipeline(stages)
    }
}

fn network_args(net: &NetworkConfig) -> Vec<String> {
    let mut args = vec![
        "--user-agent".to_string(),
        net.user_agent.clone(),
        "--add-header".to_string(),
        format!("Accept-Language:{}", net.accept_language),
    ];

    if let Some(proxy) = &net.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.to_url());
    }

    args
}

fn client_args(client: Option<&str>) -> Vec<String> {
    match client {
        Some(client) => vec![
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", client),
        ],
        None => Vec::new(),
    }
}

pub(crate) fn metadata_args(
    video: &VideoReference,
    config: &ExtractorConfig,
    client: Option<&str>,
    net: &NetworkConfig,
) -> Vec<String> {
    let mut args = vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--skip-download".to_string(),
        "--socket-timeout".to_string(),
        config.timeout_seconds.to_string(),
        "--retries".to_string(),
        "2".to_string(),
    ];
    args.extend(client_args(client));
    args.extend(network_args(net));
    args.push(video.url().to_string());
    args
}

pub(crate) fn stream_args(
    video: &VideoReference,
    selector: &FormatSelector,
    client: Option<&str>,
    net: &NetworkConfig,
) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        selector.format_spec.clone(),
        "-o".to_string(),
        "-".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-part".to_string(),
        "--quiet".to_string(),
    ];
    args.extend(client_args(client));
    args.extend(network_args(net));
    args.push(video.url().to_string());
    args
}

fn mp3_transcode_args() -> Vec<String> {
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-vn",
        "-acodec",
        "libmp3lame",
        "-b:a",
        "192k",
        "-f",
        "mp3",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// Keep proxy passwords out of the logs
fn redact(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut next_is_proxy = false;
    for arg in args {
        if next_is_proxy {
            out.push("<proxy>".to_string());
            next_is_proxy = false;
        } else {
            next_is_proxy = arg == "--proxy";
            out.push(arg.clone());
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

/// The subset of yt-dlp's `--dump-json` output the relay reads
#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    description: Option<String>,
}

/// Parse `--dump-json` output into [`VideoMetadata`].
pub fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, DownloadError> {
    let raw: RawVideoInfo = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    // yt-dlp lists thumbnails from lowest to highest preference
    let thumbnail = raw
        .thumbnails
        .iter()
        .rev()
        .find_map(|t| t.url.clone())
        .or(raw.thumbnail);

    let duration = raw.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0);

    Ok(VideoMetadata::new(
        raw.title,
        raw.uploader.or(raw.channel),
        duration.round() as u64,
        raw.view_count.unwrap_or(0),
        thumbnail,
        raw.description,
    ))
}
