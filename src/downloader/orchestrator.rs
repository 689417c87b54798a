// Per-request download orchestration
//
// validate -> fetch metadata -> stage headers -> open stream -> pipe bytes
//
// JSON errors are only produced while the lifecycle allows it. Once the
// first byte is handed to the server, failures end the connection instead.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use super::errors::DownloadError;
use super::extractors::Extractor;
use super::filename::sanitize_filename;
use super::lifecycle::{LifecycleState, ResponseLifecycle};
use super::models::{MediaKind, NetworkConfig};
use super::stream::MediaByteStream;
use crate::server::error::{parse_video_param, ApiError};

/// Drives one download request from query parameter to response body.
pub struct DownloadOrchestrator {
    extractor: Arc<dyn Extractor>,
    net: NetworkConfig,
    kind: MediaKind,
    lifecycle: ResponseLifecycle,
}

impl DownloadOrchestrator {
    pub fn new(extractor: Arc<dyn Extractor>, net: NetworkConfig, kind: MediaKind) -> Self {
        Self {
            extractor,
            net,
            kind,
            lifecycle: ResponseLifecycle::new(),
        }
    }

    /// Handle on this request's lifecycle, valid after `run` returns.
    pub fn lifecycle(&self) -> ResponseLifecycle {
        self.lifecycle.clone()
    }

    pub async fn run(self, raw_url: Option<&str>) -> Response {
        match self.prepare(raw_url).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn prepare(&self, raw_url: Option<&str>) -> Result<Response, ApiError> {
        let video = parse_video_param(raw_url)?;

        let meta = self
            .extractor
            .fetch_metadata(&video, &self.net)
            .await
            .map_err(|e| self.fail("fetch metadata", &e))?;

        let filename = format!(
            "{}.{}",
            sanitize_filename(&meta.title, self.kind.default_base_name()),
            self.kind.extension()
        );
        let headers = [
            (header::CONTENT_TYPE, self.kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ];
        self.lifecycle.advance(LifecycleState::HeadersPending);

        let selector = self.kind.selector();
        let mut media = self
            .extractor
            .open_media_stream(&video, &selector, &self.net)
            .await
            .map_err(|e| self.fail("open stream", &e))?;

        // Nothing reaches the client until the first chunk exists, so a
        // stream that dies immediately still gets a JSON answer.
        let first = loop {
            match media.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => {
                    media.close();
                    return Err(self.fail("first chunk", &DownloadError::ExecutionError(e.to_string())));
                }
                None => {
                    media.close();
                    return Err(self.fail(
                        "first chunk",
                        &DownloadError::ExecutionError("stream ended before any data".to_string()),
                    ));
                }
            }
        };

        self.lifecycle.advance(LifecycleState::Streaming);
        info!(
            "[{}] streaming {} '{}' as {}",
            self.extractor.name(),
            video.video_id(),
            meta.title,
            filename
        );

        let body = LifecycleBody {
            pending: Some(first),
            media,
            lifecycle: self.lifecycle.clone(),
            filename,
            bytes_sent: 0,
        };

        Ok((headers, Body::from_stream(body)).into_response())
    }

    fn fail(&self, stage: &str, e: &DownloadError) -> ApiError {
        error!("[{}] {} failed: {}", self.extractor.name(), stage, e);
        if let Some(reason) = e.blocking_reason() {
            warn!("[{}] blocking reason: {}", self.extractor.name(), reason.description());
        }

        debug_assert!(self.lifecycle.can_report_error());
        if self.lifecycle.state() == LifecycleState::HeadersPending {
            self.lifecycle.advance(LifecycleState::Aborted);
        }
        ApiError::Internal(self.kind.failure_message())
    }
}

/// Response body: the peeked first chunk, then the rest of the media stream.
///
/// Natural end marks the lifecycle completed, a transport error marks it
/// aborted and is passed on so the server drops the connection. Dropping the
/// body mid-stream (client gone) closes the media stream right away.
struct LifecycleBody {
    pending: Option<Bytes>,
    media: MediaByteStream,
    lifecycle: ResponseLifecycle,
    filename: String,
    bytes_sent: u64,
}

impl Stream for LifecycleBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if let Some(first) = this.pending.take() {
            this.bytes_sent += first.len() as u64;
            return Poll::Ready(Some(Ok(first)));
        }
        if this.media.is_closed() {
            return Poll::Ready(None);
        }

        match this.media.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                error!(
                    "stream for {} failed after {} bytes: {}",
                    this.filename, this.bytes_sent, e
                );
                this.lifecycle.advance(LifecycleState::Aborted);
                this.media.close();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                info!("finished {} ({} bytes)", this.filename, this.bytes_sent);
                this.lifecycle.advance(LifecycleState::Completed);
                this.media.close();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for LifecycleBody {
    fn drop(&mut self) {
        if self.lifecycle.state() == LifecycleState::Streaming {
            warn!(
                "client disconnected from {} after {} bytes, stopping upstream",
                self.filename, self.bytes_sent
            );
            self.lifecycle.advance(LifecycleState::Aborted);
        }
        self.media.close();
        debug!("released stream for {}", self.filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{FormatSelector, VideoMetadata, VideoReference};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum OpenBehaviour {
        Fail,
        Empty,
        Chunks(Vec<&'static [u8]>),
    }

    struct Stub {
        title: Option<String>,
        metadata_fails: bool,
        open: OpenBehaviour,
        opens: AtomicUsize,
        releases: Arc<AtomicUsize>,
    }

    impl Stub {
        fn new(open: OpenBehaviour) -> Self {
            Self {
                title: Some("My Video!! 2024".to_string()),
                metadata_fails: false,
                open,
                opens: AtomicUsize::new(0),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Extractor for Stub {
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
            if self.metadata_fails {
                return Err(DownloadError::BlockedByYouTube);
            }
            Ok(VideoMetadata::new(self.title.clone(), None, 60, 1, None, None))
        }

        async fn open_media_stream(
            &self,
            _video: &VideoReference,
            _selector: &FormatSelector,
            _net: &NetworkConfig,
        ) -> Result<MediaByteStream, DownloadError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let releases = Arc::clone(&self.releases);
            let items: Vec<io::Result<Bytes>> = match &self.open {
                OpenBehaviour::Fail => {
                    return Err(DownloadError::ToolNotFound("ffmpeg".to_string()))
                }
                OpenBehaviour::Empty => Vec::new(),
                OpenBehaviour::Chunks(chunks) => chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c)))
                    .collect(),
            };
            Ok(MediaByteStream::new(futures::stream::iter(items)).with_release(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    const URL: Option<&str> = Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ");

    async fn run(stub: Arc<Stub>, kind: MediaKind) -> (Response, ResponseLifecycle) {
        let orchestrator = DownloadOrchestrator::new(stub, NetworkConfig::default(), kind);
        let lifecycle = orchestrator.lifecycle();
        (orchestrator.run(URL).await, lifecycle)
    }

    #[tokio::test]
    async fn test_streams_with_headers() {
        let stub = Arc::new(Stub::new(OpenBehaviour::Chunks(vec![b"ab", b"cd"])));
        let (response, lifecycle) = run(stub.clone(), MediaKind::Audio).await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"My_Video_2024.mp3\""
        );
        assert_eq!(lifecycle.state(), LifecycleState::Streaming);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"abcd");
        assert_eq!(lifecycle.state(), LifecycleState::Completed);
        assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_json() {
        let stub = Arc::new(Stub::new(OpenBehaviour::Fail));
        let (response, lifecycle) = run(stub, MediaKind::Video).await;

        assert_eq!(response.status(), 500);
        assert_eq!(lifecycle.state(), LifecycleState::Aborted);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Failed to download video"}"#);
    }

    #[tokio::test]
    async fn test_empty_stream_is_json_and_released() {
        let stub = Arc::new(Stub::new(OpenBehaviour::Empty));
        let (response, _) = run(stub.clone(), MediaKind::Audio).await;

        assert_eq!(response.status(), 500);
        assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metadata_failure_stays_idle() {
        let mut stub = Stub::new(OpenBehaviour::Chunks(vec![b"x"]));
        stub.metadata_fails = true;
        let stub = Arc::new(stub);
        let (response, lifecycle) = run(stub.clone(), MediaKind::Audio).await;

        assert_eq!(response.status(), 500);
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        assert_eq!(stub.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_body_aborts_and_releases_once() {
        let stub = Arc::new(Stub::new(OpenBehaviour::Chunks(vec![b"ab", b"cd", b"ef"])));
        let (response, lifecycle) = run(stub.clone(), MediaKind::Video).await;
        drop(response);

        assert_eq!(lifecycle.state(), LifecycleState::Aborted);
        assert_eq!(stub.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_untitled_video_uses_default_name() {
        let mut stub = Stub::new(OpenBehaviour::Chunks(vec![b"x"]));
        stub.title = None;
        let (response, _) = run(Arc::new(stub), MediaKind::Video).await;

        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"video.mp4\""
        );
    }
}
