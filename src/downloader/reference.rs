// Video reference validation
//
// Accepts the same shapes as the common YouTube URL validators:
// - watch URLs on youtube.com / www / m / music / gaming hosts (`?v=ID`)
// - youtu.be/ID
// - youtube.com/{embed,v,shorts,live}/ID

use regex::Regex;
use url::Url;

use super::errors::DownloadError;

lazy_static::lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

const QUERY_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
];

const PATH_PREFIXES: [&str; 4] = ["embed", "v", "shorts", "live"];

/// A URL that passed validation, together with its video id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    url: String,
    video_id: String,
}

impl VideoReference {
    pub fn parse(raw: &str) -> Result<Self, DownloadError> {
        let raw = raw.trim();
        let invalid = || DownloadError::InvalidUrl(raw.to_string());

        let parsed = Url::parse(raw).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();

        let candidate = if host == "youtu.be" {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next())
                .map(str::to_string)
        } else if QUERY_HOSTS.contains(&host.as_str()) {
            let from_query = parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned());

            from_query.or_else(|| {
                let mut segments = parsed.path_segments()?;
                let prefix = segments.next()?;
                if PATH_PREFIXES.contains(&prefix) {
                    segments.next().map(str::to_string)
                } else {
                    None
                }
            })
        } else {
            None
        };

        let video_id = candidate.ok_or_else(invalid)?;
        if !VIDEO_ID_RE.is_match(&video_id) {
            return Err(invalid());
        }

        Ok(Self {
            url: raw.to_string(),
            video_id,
        })
    }

    /// The URL exactly as the client supplied it (trimmed).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
