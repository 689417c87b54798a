use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use tower::ServiceExt;

use youtube_relay::downloader::{
    DownloadError, Extractor, FormatSelector, MediaByteStream, NetworkConfig, VideoMetadata,
    VideoReference,
};
use youtube_relay::server::{router, AppState};

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// What the stub stream does after being opened.
#[derive(Clone)]
enum Media {
    Bytes(Vec<&'static [u8]>),
    FailAfter(&'static [u8]),
}

struct StubExtractor {
    title: Option<&'static str>,
    description: Option<&'static str>,
    fail_metadata: bool,
    media: Media,
    metadata_calls: AtomicUsize,
    open_calls: AtomicUsize,
    releases: Arc<AtomicUsize>,
    selectors: parking_lot::Mutex<Vec<String>>,
}

impl StubExtractor {
    fn new() -> Self {
        Self {
            title: Some("My Video!! 2024"),
            description: Some("A description"),
            fail_metadata: false,
            media: Media::Bytes(vec![b"ID3", b"payload"]),
            metadata_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            selectors: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.metadata_calls.load(Ordering::SeqCst),
            self.open_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn fetch_metadata(
        &self,
        _video: &VideoReference,
        _net: &NetworkConfig,
    ) -> Result<VideoMetadata, DownloadError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata {
            return Err(DownloadError::Unknown("ERROR: Video unavailable".to_string()));
        }
        Ok(VideoMetadata::new(
            self.title.map(str::to_string),
            Some("Channel".to_string()),
            212,
            1_000,
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".to_string()),
            self.description.map(str::to_string),
        ))
    }

    async fn open_media_stream(
        &self,
        _video: &VideoReference,
        selector: &FormatSelector,
        _net: &NetworkConfig,
    ) -> Result<MediaByteStream, DownloadError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.selectors.lock().push(selector.label.to_string());

        let items: Vec<io::Result<Bytes>> = match &self.media {
            Media::Bytes(chunks) => chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect(),
            Media::FailAfter(prefix) => vec![
                Ok(Bytes::from_static(prefix)),
                Err(io::Error::other("yt-dlp exited with exit status: 1")),
            ],
        };

        let releases = Arc::clone(&self.releases);
        Ok(
            MediaByteStream::new(futures::stream::iter(items)).with_release(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }
}

async fn send(stub: Arc<StubExtractor>, uri: &str) -> Response {
    send_with(AppState::new(stub), uri).await
}

async fn send_with(state: AppState, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(header::HOST, "relay.local:5000")
        .body(Body::empty())
        .unwrap();
    router(state).oneshot(request).await.unwrap()
}

async fn json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn download_uri(kind: &str) -> String {
    format!(
        "/api/download/{}?url={}",
        kind,
        urlencoding::encode(VIDEO_URL)
    )
}

#[tokio::test]
async fn missing_or_invalid_url_is_rejected_without_extractor_calls() {
    let stub = Arc::new(StubExtractor::new());

    for uri in [
        "/api/info",
        "/api/get?url=",
        "/api/download/audio",
        "/api/download/video?url=",
    ] {
        let response = send(stub.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json(response).await["error"], "URL parameter is required");
    }

    for uri in [
        "/api/info?url=not-a-url",
        "/api/download/audio?url=https%3A%2F%2Fvimeo.com%2F12345",
        "/api/get?url=https%3A%2F%2Fyoutu.be%2Fshort",
    ] {
        let response = send(stub.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json(response).await["error"], "Invalid YouTube video URL");
    }

    assert_eq!(stub.calls(), (0, 0));
}

#[tokio::test]
async fn malformed_query_string_gets_json_error() {
    let stub = Arc::new(StubExtractor::new());
    let encoded = urlencoding::encode(VIDEO_URL);

    for route in ["/api/info", "/api/get", "/api/download/audio", "/api/download/video"] {
        let uri = format!("{route}?url={encoded}&url={encoded}");
        let response = send(stub.clone(), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json",
            "{uri}"
        );
        assert_eq!(json(response).await["error"], "Invalid YouTube video URL");
    }

    assert_eq!(stub.calls(), (0, 0));
}

#[tokio::test]
async fn audio_download_streams_with_sanitized_filename() {
    let stub = Arc::new(StubExtractor::new());
    let response = send(stub.clone(), &download_uri("audio")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"My_Video_2024.mp3\""
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ID3payload");
    assert_eq!(stub.calls(), (1, 1));
    assert_eq!(*stub.selectors.lock(), vec!["audio-mp3".to_string()]);
    assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_title_falls_back_to_default_name() {
    let mut stub = StubExtractor::new();
    stub.title = Some("");
    let stub = Arc::new(stub);

    let response = send(stub.clone(), &download_uri("video")).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"video.mp4\""
    );
    assert_eq!(*stub.selectors.lock(), vec!["video-mp4".to_string()]);
}

#[tokio::test]
async fn metadata_failure_returns_json_and_never_opens_stream() {
    let mut stub = StubExtractor::new();
    stub.fail_metadata = true;
    let stub = Arc::new(stub);

    let response = send(stub.clone(), &download_uri("audio")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to download audio");

    let response = send(stub.clone(), &download_uri("video")).await;
    assert_eq!(json(response).await["error"], "Failed to download video");

    assert_eq!(stub.calls(), (2, 0));
}

#[tokio::test]
async fn transport_error_after_first_bytes_ends_body_without_json() {
    let mut stub = StubExtractor::new();
    stub.media = Media::FailAfter(b"0123456789");
    let stub = Arc::new(stub);

    let response = send(stub.clone(), &download_uri("audio")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(first.len(), 10);

    let next = body.frame().await.unwrap();
    assert!(next.is_err());
    drop(body);

    assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_disconnect_releases_stream_exactly_once() {
    let mut stub = StubExtractor::new();
    stub.media = Media::Bytes(vec![b"first", b"second", b"third"]);
    let stub = Arc::new(stub);

    let response = send(stub.clone(), &download_uri("video")).await;
    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(&first[..], b"first");
    assert_eq!(stub.releases.load(Ordering::SeqCst), 0);

    drop(body);
    assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_stream_still_gets_json_error() {
    let mut stub = StubExtractor::new();
    stub.media = Media::Bytes(Vec::new());
    let stub = Arc::new(stub);

    let response = send(stub.clone(), &download_uri("video")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to download video");
    assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn info_shapes_metadata_with_placeholders() {
    let mut stub = StubExtractor::new();
    stub.description = None;
    let stub = Arc::new(stub);

    let uri = format!("/api/info?url={}", urlencoding::encode(VIDEO_URL));
    let response = send(stub.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["title"], "My Video!! 2024");
    assert_eq!(body["author"], "Channel");
    assert_eq!(body["lengthSeconds"], 212);
    assert_eq!(body["viewCount"], 1000);
    assert_eq!(
        body["thumbnail"],
        "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
    );
    assert_eq!(body["description"], "No description available");
    assert_eq!(stub.calls(), (1, 0));
}

#[tokio::test]
async fn info_failure_is_json_500() {
    let mut stub = StubExtractor::new();
    stub.fail_metadata = true;

    let uri = format!("/api/info?url={}", urlencoding::encode(VIDEO_URL));
    let response = send(Arc::new(stub), &uri).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to fetch video information");
}

#[tokio::test]
async fn get_returns_absolute_download_links() {
    let stub = Arc::new(StubExtractor::new());
    let uri = format!("/api/get?url={}", urlencoding::encode(VIDEO_URL));

    let body = json(send(stub.clone(), &uri).await).await;
    let encoded = "https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ";
    assert_eq!(
        body["audioUrl"],
        format!("http://relay.local:5000/api/download/audio?url={encoded}")
    );
    assert_eq!(
        body["videoUrl"],
        format!("http://relay.local:5000/api/download/video?url={encoded}")
    );
    assert_eq!(body["duration"], 212);
    assert_eq!(body["views"], 1000);

    let state = AppState::new(stub.clone())
        .with_public_base_url(Some("https://relay.example.com".to_string()));
    let body = json(send_with(state, &uri).await).await;
    assert_eq!(
        body["audioUrl"],
        format!("https://relay.example.com/api/download/audio?url={encoded}")
    );

    assert_eq!(stub.calls(), (2, 0));
}

#[tokio::test]
async fn get_failure_is_json_500() {
    let mut stub = StubExtractor::new();
    stub.fail_metadata = true;

    let uri = format!("/api/get?url={}", urlencoding::encode(VIDEO_URL));
    let response = send(Arc::new(stub), &uri).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to fetch video data");
}
