// Axum request handlers for the relay routes.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::error::{parse_video_param, ApiError};
use super::AppState;
use crate::downloader::{DownloadOrchestrator, MediaKind, VideoMetadata, VideoReference};

#[derive(Debug, Default, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

/// Query extraction result; rejections are answered through `ApiError`.
type UrlParam = Result<Query<UrlQuery>, QueryRejection>;

/// Body of `GET /api/info`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub title: String,
    pub author: String,
    pub length_seconds: u64,
    pub view_count: u64,
    pub thumbnail: String,
    pub description: String,
}

impl From<VideoMetadata> for InfoResponse {
    fn from(meta: VideoMetadata) -> Self {
        Self {
            title: meta.title,
            author: meta.author_name,
            length_seconds: meta.duration_seconds,
            view_count: meta.view_count,
            thumbnail: meta.thumbnail_url,
            description: meta.description,
        }
    }
}

/// Body of `GET /api/get`: summary plus ready-made download links.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinksResponse {
    pub title: String,
    pub thumbnail: String,
    pub author: String,
    pub duration: u64,
    pub views: u64,
    pub audio_url: String,
    pub video_url: String,
}

async fn fetch(
    state: &AppState,
    video: &VideoReference,
    message: &'static str,
) -> Result<VideoMetadata, ApiError> {
    state
        .extractor
        .fetch_metadata(video, &state.net)
        .await
        .map_err(|e| {
            error!("Error fetching video info for {}: {}", video, e);
            ApiError::Internal(message)
        })
}

/// GET /api/info
pub async fn info(
    State(state): State<AppState>,
    query: UrlParam,
) -> Result<Json<InfoResponse>, ApiError> {
    let Query(query) = query?;
    let video = parse_video_param(query.url.as_deref())?;
    let meta = fetch(&state, &video, "Failed to fetch video information").await?;
    Ok(Json(meta.into()))
}

/// GET /api/get
pub async fn links(
    State(state): State<AppState>,
    query: UrlParam,
    headers: HeaderMap,
) -> Result<Json<LinksResponse>, ApiError> {
    let Query(query) = query?;
    let video = parse_video_param(query.url.as_deref())?;
    let meta = fetch(&state, &video, "Failed to fetch video data").await?;

    let base = base_url(state.public_base_url.as_deref(), &headers);
    let encoded = urlencoding::encode(video.url());

    Ok(Json(LinksResponse {
        title: meta.title,
        thumbnail: meta.thumbnail_url,
        author: meta.author_name,
        duration: meta.duration_seconds,
        views: meta.view_count,
        audio_url: format!("{}/api/download/audio?url={}", base, encoded),
        video_url: format!("{}/api/download/video?url={}", base, encoded),
    }))
}

/// GET /api/download/audio
pub async fn download_audio(State(state): State<AppState>, query: UrlParam) -> Response {
    download(state, query, MediaKind::Audio).await
}

/// GET /api/download/video
pub async fn download_video(State(state): State<AppState>, query: UrlParam) -> Response {
    download(state, query, MediaKind::Video).await
}

async fn download(state: AppState, query: UrlParam, kind: MediaKind) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    DownloadOrchestrator::new(state.extractor, state.net, kind)
        .run(query.url.as_deref())
        .await
}

/// Absolute origin of this service as seen by the client.
fn base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }

    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header_str(header::HeaderName::from_static("x-forwarded-proto")).unwrap_or("http");
    let host = header_str(header::HeaderName::from_static("x-forwarded-host"))
        .or_else(|| header_str(header::HOST))
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
