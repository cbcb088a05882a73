//! Playback proxy: manifests are rewritten to point back at this service,
//! segments are streamed through with the client's byte range.

use crate::domain::hls::{is_safe_segment_name, rewrite_for_proxy};
use crate::domain::shorts::{segment_key, Short, ShortStatus};
use crate::error::AppError;
use crate::ports::repository::ShortRepository;
use crate::ports::storage::{StorageError, StoragePort, StoredObject};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pub struct PlaybackService {
    shorts: Arc<dyn ShortRepository>,
    storage: Arc<dyn StoragePort>,
    public_base_url: String,
}

impl PlaybackService {
    pub fn new(shorts: Arc<dyn ShortRepository>, storage: Arc<dyn StoragePort>, public_base_url: impl Into<String>) -> Self {
        Self {
            shorts,
            storage,
            public_base_url: public_base_url.into(),
        }
    }

    /// Where rewritten manifests send clients for a short's segments.
    pub fn segment_base(&self, short_id: &str) -> String {
        format!("{}/shorts/segment/{}", self.public_base_url, short_id)
    }

    async fn active_short(&self, short_id: &str) -> Result<Short, AppError> {
        self.shorts
            .get(short_id)
            .await?
            .filter(|s| s.status == ShortStatus::Active)
            .ok_or_else(|| AppError::NotFound(format!("short {} is not available", short_id)))
    }

    #[tracing::instrument(name = "playback_manifest", skip(self))]
    pub async fn manifest(&self, short_id: &str) -> Result<String, AppError> {
        let short = self.active_short(short_id).await?;
        let object = self.storage.fetch(&short.video_url, None).await?;
        let text = object.into_text().await.map_err(StorageError::Io)?;
        Ok(rewrite_for_proxy(&text, &self.segment_base(short_id))?)
    }

    #[tracing::instrument(name = "playback_segment", skip(self))]
    pub async fn segment(&self, short_id: &str, segment: &str, range: Option<String>) -> Result<StoredObject, AppError> {
        if !is_safe_segment_name(segment) {
            return Err(AppError::bad_request("INVALID_SEGMENT", format!("invalid segment name {:?}", segment)));
        }
        self.active_short(short_id).await?;

        let key = segment_key(short_id, segment);
        let mut object = self.storage.fetch(&key, range).await?;
        let body = std::mem::replace(&mut object.body, Box::pin(futures::stream::empty()));
        object.body = Box::pin(ProxiedBody::new(body, key, object.content_length));
        Ok(object)
    }
}

/// Segment body on its way to the client. Dropping it early (the client
/// went away) drops the upstream stream with it.
struct ProxiedBody {
    inner: BoxStream<'static, io::Result<Bytes>>,
    key: String,
    sent: u64,
    expected: Option<u64>,
    finished: bool,
}

impl ProxiedBody {
    fn new(inner: BoxStream<'static, io::Result<Bytes>>, key: String, expected: Option<u64>) -> Self {
        Self {
            inner,
            key,
            sent: 0,
            expected,
            finished: false,
        }
    }
}

impl Stream for ProxiedBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.as_mut().poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => self.sent += chunk.len() as u64,
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(key = %self.key, sent = self.sent, "upstream stream failed: {}", e);
                self.finished = true;
            }
            Poll::Ready(None) => self.finished = true,
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for ProxiedBody {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                key = %self.key,
                sent = self.sent,
                expected = ?self.expected,
                "client went away, upstream read aborted"
            );
        }
    }
}
