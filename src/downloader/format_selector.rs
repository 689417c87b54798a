// FormatSelector - fixed per-route format policies
//
// Each download route owns one selector. Selectors are never built from
// client input; the yt-dlp format expression below is the only format
// string that ever reaches a subprocess.

use serde::Serialize;

/// Container/codec the relay must emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputContainer {
    /// Transcoded MP3 (needs ffmpeg)
    Mp3,
    /// MP4 as served by YouTube, no transcoding
    Mp4,
}

/// Declarative description of which stream to request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSelector {
    /// Display label for logs
    pub label: &'static str,

    /// yt-dlp `-f` expression
    pub format_spec: String,

    pub container: OutputContainer,

    /// Height cap for video selectors
    pub max_height: Option<u32>,
}

/// Default height cap for the video route.
pub const DEFAULT_VIDEO_HEIGHT: u32 = 720;

impl FormatSelector {
    /// Best audio-only stream, transcoded to MP3.
    pub fn audio() -> Self {
        Self {
            label: "audio-mp3",
            format_spec: "ba/b".to_string(),
            container: OutputContainer::Mp3,
            max_height: None,
        }
    }

    /// Progressive (audio+video) MP4 capped at [`DEFAULT_VIDEO_HEIGHT`].
    pub fn video() -> Self {
        Self::video_capped(DEFAULT_VIDEO_HEIGHT)
    }

    /// Progressive MP4 capped at `height`.
    ///
    /// Stdout output cannot be merged by yt-dlp, so only formats that already
    /// carry both tracks are eligible.
    pub fn video_capped(height: u32) -> Self {
        Self {
            label: "video-mp4",
            format_spec: format!(
                "b[height<={h}][ext=mp4][acodec!=none][vcodec!=none]/b[ext=mp4][acodec!=none][vcodec!=none]/b",
                h = height
            ),
            container: OutputContainer::Mp4,
            max_height: Some(height),
        }
    }

    pub fn needs_transcode(&self) -> bool {
        matches!(self.container, OutputContainer::Mp3)
    }
}

impl std::fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.format_spec)
    }
}
