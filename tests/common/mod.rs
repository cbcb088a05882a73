#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tourly::adapters::local::{ChannelQueue, FsStorage, MemoryStore};
use tourly::application::{IngestService, PlaybackService, WorkerService};
use tourly::domain::jobs::Job;
use tourly::domain::media::{HlsOutput, TranscodeProfile};
use tourly::domain::upload::UploadPolicy;
use tourly::http::{router, AppState};
use tourly::ports::media::{MediaError, MediaToolkit};
use tourly::ports::queue::JobQueuePort;
use tower::ServiceExt;

pub const BOUNDARY: &str = "tourly-test-boundary";

/// Reads the "video" as text: `duration=<secs>` sets the probed duration,
/// a `broken` marker makes the transcode fail.
pub struct ScriptedMedia;

#[async_trait]
impl MediaToolkit for ScriptedMedia {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let text = tokio::fs::read_to_string(path).await?;
        text.lines()
            .find_map(|l| l.strip_prefix("duration="))
            .and_then(|d| d.trim().parse().ok())
            .ok_or_else(|| MediaError::NoDuration(path.to_path_buf()))
    }

    async fn transcode_hls(&self, source: &Path, out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let text = tokio::fs::read_to_string(source).await?;
        if text.contains("broken") {
            return Err(MediaError::Failed {
                tool: "ffmpeg",
                code: Some(1),
                stderr: "moov atom not found".to_string(),
            });
        }
        let mut segments = Vec::new();
        for (i, body) in ["0123456789", "abcdefghij"].iter().enumerate() {
            let path = out_dir.join(format!("segment_{:03}.ts", i));
            tokio::fs::write(&path, body).await?;
            segments.push(path);
        }
        let manifest = profile.manifest_path(out_dir);
        tokio::fs::write(
            &manifest,
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n\
             #EXTINF:6.000000,\nsegment_000.ts\n#EXTINF:4.000000,\nsegment_001.ts\n#EXT-X-ENDLIST\n",
        )
        .await?;
        Ok(HlsOutput { manifest, segments })
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: MemoryStore,
    pub queue: ChannelQueue,
    pub worker: WorkerService,
    pub app: Router,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(UploadPolicy::default())
    }

    pub fn with_policy(policy: UploadPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let queue = ChannelQueue::new();
        let storage = Arc::new(FsStorage::new(dir.path().join("bucket")));
        let media: Arc<dyn MediaToolkit> = Arc::new(ScriptedMedia);

        let ingest = IngestService::new(
            Arc::new(store.clone()),
            Arc::new(queue.clone()),
            media.clone(),
            policy,
            dir.path().join("transcode"),
        );
        let playback = PlaybackService::new(Arc::new(store.clone()), storage.clone(), "");
        let worker = WorkerService::new(Arc::new(queue.clone()), Arc::new(store.clone()), storage, media);

        let app = router(AppState {
            ingest: Arc::new(ingest),
            playback: Arc::new(playback),
            shorts: Arc::new(store.clone()),
            consultations: Arc::new(store.clone()),
            airports: Arc::new(store.clone()),
            uploads_dir: dir.path().join("uploads"),
        });

        Self {
            dir,
            store,
            queue,
            worker,
            app,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn transcode_dir(&self, id: &str) -> PathBuf {
        self.dir.path().join("transcode").join(id)
    }

    pub fn bucket(&self) -> PathBuf {
        self.dir.path().join("bucket")
    }

    /// Files left in the uploads directory.
    pub fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(self.uploads_dir()).map(|d| d.count()).unwrap_or(0)
    }

    /// Runs the next queued publish job to completion.
    pub async fn run_next_job(&self) {
        let job = self
            .queue
            .dequeue_job(Duration::from_millis(200))
            .await
            .unwrap()
            .expect("a queued job");
        let Job::Publish(job) = job;
        let _ = self.worker.process(&job).await;
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn upload(&self, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/shorts")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
