// Media byte stream with an explicit release hook

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A live, ordered, finite sequence of media bytes.
///
/// Mid-transfer failures are reported as an `Err` item. The release hook
/// (killing a subprocess, closing a socket) runs at most once: on [`close`],
/// or on drop if the owner never closed it.
///
/// [`close`]: MediaByteStream::close
pub struct MediaByteStream {
    inner: BoxStream<'static, io::Result<Bytes>>,
    release: Option<ReleaseFn>,
    closed: bool,
}

impl MediaByteStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            release: None,
            closed: false,
        }
    }

    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Stop producing bytes and release the underlying resource.
    pub fn close(&mut self) {
        self.closed = true;
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Stream for MediaByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for MediaByteStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MediaByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaByteStream")
            .field("closed", &self.closed)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}
