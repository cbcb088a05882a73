use super::discard;
use crate::domain::hls::MediaPlaylist;
use crate::domain::jobs::{Job, PublishJob};
use crate::domain::media::{HlsOutput, TranscodeProfile};
use crate::domain::shorts::segment_key;
use crate::error::AppError;
use crate::ports::media::{MediaError, MediaToolkit};
use crate::ports::queue::{JobQueuePort, QueueError};
use crate::ports::repository::ShortRepository;
use crate::ports::storage::{content_type_for, StoragePort};
use chrono::Utc;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Background half of an upload: transcode, publish, flip the status.
#[derive(Clone)]
pub struct WorkerService {
    queue: Arc<dyn JobQueuePort>,
    shorts: Arc<dyn ShortRepository>,
    storage: Arc<dyn StoragePort>,
    media: Arc<dyn MediaToolkit>,
    profile: TranscodeProfile,
}

impl WorkerService {
    pub fn new(
        queue: Arc<dyn JobQueuePort>,
        shorts: Arc<dyn ShortRepository>,
        storage: Arc<dyn StoragePort>,
        media: Arc<dyn MediaToolkit>,
    ) -> Self {
        Self {
            queue,
            shorts,
            storage,
            media,
            profile: TranscodeProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: TranscodeProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Pulls jobs until the queue closes.
    pub async fn run(&self, worker_id: usize) {
        tracing::info!(worker_id, "worker started");
        loop {
            match self.queue.dequeue_job(DEQUEUE_TIMEOUT).await {
                Ok(Some(Job::Publish(job))) => {
                    // Failures are recorded on the short and logged inside.
                    let _ = self.process(&job).await;
                }
                Ok(None) => continue,
                Err(QueueError::Closed) => {
                    tracing::info!(worker_id, "job queue closed, worker stopping");
                    break;
                }
                Err(e) => {
                    tracing::error!(worker_id, "queue error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Runs one publish job to a terminal status. Local files for the job
    /// are gone when this returns, whatever the outcome.
    #[tracing::instrument(name = "publish_short", skip(self, job), fields(short_id = %job.short_id))]
    pub async fn process(&self, job: &PublishJob) -> Result<(), AppError> {
        let result = self.publish(job).await;

        if let Err(e) = &result {
            tracing::error!("publishing failed: {}", e);
            match self.shorts.mark_deleted(&job.short_id, Utc::now()).await {
                Ok(true) => tracing::info!("short marked deleted"),
                Ok(false) => tracing::warn!("short was no longer inactive"),
                Err(mark) => tracing::error!("could not mark short deleted: {}", mark),
            }
        }

        discard(&job.source_path).await;
        discard(&job.work_dir).await;
        result
    }

    async fn publish(&self, job: &PublishJob) -> Result<(), AppError> {
        let hls = self
            .media
            .transcode_hls(&job.source_path, &job.work_dir, &self.profile)
            .await?;
        check_manifest(&hls).await?;

        let uploads = hls.files().map(|path| self.upload_one(&job.short_id, path));
        try_join_all(uploads).await?;

        let manifest = file_name(&hls.manifest)?;
        let video_url = segment_key(&job.short_id, manifest);
        if self.shorts.mark_active(&job.short_id, &video_url, Utc::now()).await? {
            tracing::info!(%video_url, segments = hls.segments.len(), "short published");
        } else {
            tracing::warn!("short was no longer inactive, status left unchanged");
        }
        Ok(())
    }

    async fn upload_one(&self, short_id: &str, path: &Path) -> Result<(), AppError> {
        let key = segment_key(short_id, file_name(path)?);
        let content_type = content_type_for(path);
        self.storage.upload(path, &key, &content_type).await?;
        Ok(())
    }
}

/// Every segment the manifest lists must be among the produced files.
async fn check_manifest(hls: &HlsOutput) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(&hls.manifest).await.map_err(MediaError::Io)?;
    let playlist = MediaPlaylist::parse(&text)?;
    for segment in &playlist.segments {
        let produced = hls
            .segments
            .iter()
            .any(|p| p.file_name().and_then(|n| n.to_str()) == Some(segment.uri.as_str()));
        if !produced {
            return Err(MediaError::MissingOutput(segment.uri.clone()).into());
        }
    }
    tracing::debug!(duration = playlist.total_duration(), segments = playlist.segments.len(), "manifest checked");
    Ok(())
}

fn file_name(path: &Path) -> Result<&str, AppError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MediaError::MissingOutput(format!("file name for {:?}", path)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::{FsStorage, MemoryStore};
    use crate::domain::shorts::{NewShort, Short, ShortStatus};
    use crate::ports::storage::{MockStoragePort, StorageError};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes two segments and a manifest stamped with the source name.
    struct FakeMedia;

    #[async_trait]
    impl MediaToolkit for FakeMedia {
        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            Ok(30.0)
        }

        async fn transcode_hls(&self, source: &Path, out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
            tokio::fs::create_dir_all(out_dir).await?;
            let stamp = source.file_name().unwrap().to_string_lossy().into_owned();
            let mut segments = Vec::new();
            for i in 0..2 {
                let path = out_dir.join(format!("segment_{:03}.ts", i));
                tokio::fs::write(&path, format!("{}-{}", stamp, i)).await?;
                segments.push(path);
            }
            let manifest = profile.manifest_path(out_dir);
            tokio::fs::write(
                &manifest,
                "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment_000.ts\n#EXTINF:6.0,\nsegment_001.ts\n#EXT-X-ENDLIST\n",
            )
            .await?;
            Ok(HlsOutput { manifest, segments })
        }
    }

    struct BrokenMedia;

    #[async_trait]
    impl MediaToolkit for BrokenMedia {
        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            Ok(30.0)
        }

        async fn transcode_hls(&self, _source: &Path, out_dir: &Path, _profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
            // Leave partial output behind like a crashed ffmpeg would.
            tokio::fs::create_dir_all(out_dir).await?;
            tokio::fs::write(out_dir.join("segment_000.ts"), b"partial").await?;
            Err(MediaError::Failed {
                tool: "ffmpeg",
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            })
        }
    }

    /// Manifest lists a segment that was never written.
    struct DanglingMedia;

    #[async_trait]
    impl MediaToolkit for DanglingMedia {
        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            Ok(30.0)
        }

        async fn transcode_hls(&self, _source: &Path, out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
            tokio::fs::create_dir_all(out_dir).await?;
            let segment = out_dir.join("segment_000.ts");
            tokio::fs::write(&segment, b"x").await?;
            let manifest = profile.manifest_path(out_dir);
            tokio::fs::write(
                &manifest,
                "#EXTM3U\n#EXTINF:6.0,\nsegment_000.ts\n#EXTINF:6.0,\nsegment_001.ts\n#EXT-X-ENDLIST\n",
            )
            .await?;
            Ok(HlsOutput { manifest, segments: vec![segment] })
        }
    }

    struct Fixture {
        dir: TempDir,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                store: MemoryStore::new(),
            }
        }

        fn storage_root(&self) -> PathBuf {
            self.dir.path().join("bucket")
        }

        fn worker(&self, storage: Arc<dyn StoragePort>, media: Arc<dyn MediaToolkit>) -> WorkerService {
            WorkerService::new(
                Arc::new(crate::adapters::local::ChannelQueue::new()),
                Arc::new(self.store.clone()),
                storage,
                media,
            )
        }

        async fn job(&self, id: &str) -> PublishJob {
            let uploads = self.dir.path().join("uploads");
            tokio::fs::create_dir_all(&uploads).await.unwrap();
            let source = uploads.join(format!("{}.mp4", id));
            tokio::fs::write(&source, b"source").await.unwrap();

            let short = Short::placeholder(
                id.to_string(),
                NewShort {
                    title: format!("short {}", id),
                    ..Default::default()
                },
                format!("short-{}", id),
                Utc::now(),
            );
            self.store.insert(&short).await.unwrap();
            PublishJob::new(id, source, &self.dir.path().join("work"))
        }
    }

    #[tokio::test]
    async fn test_success_publishes_and_cleans_up() {
        let fx = Fixture::new();
        let worker = fx.worker(Arc::new(FsStorage::new(fx.storage_root())), Arc::new(FakeMedia));
        let job = fx.job("a").await;

        worker.process(&job).await.unwrap();

        let short = fx.store.get("a").await.unwrap().unwrap();
        assert_eq!(short.status, ShortStatus::Active);
        assert_eq!(short.video_url, "shorts/a/playlist.m3u8");
        for name in ["playlist.m3u8", "segment_000.ts", "segment_001.ts"] {
            assert!(fx.storage_root().join("shorts/a").join(name).exists(), "{} missing", name);
        }
        assert!(!job.source_path.exists());
        assert!(!job.work_dir.exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_marks_deleted_and_cleans_up() {
        let fx = Fixture::new();
        let worker = fx.worker(Arc::new(FsStorage::new(fx.storage_root())), Arc::new(BrokenMedia));
        let job = fx.job("b").await;

        assert!(worker.process(&job).await.is_err());

        let short = fx.store.get("b").await.unwrap().unwrap();
        assert_eq!(short.status, ShortStatus::Deleted);
        assert!(short.deleted_at.is_some());
        assert!(short.video_url.is_empty());
        assert!(!job.source_path.exists());
        assert!(!job.work_dir.exists());
    }

    #[tokio::test]
    async fn test_upload_failure_marks_deleted_and_cleans_up() {
        let fx = Fixture::new();
        let mut storage = MockStoragePort::new();
        storage.expect_upload().returning(|_, _, _| {
            Err(StorageError::Unauthorized("bad_auth_token".to_string()))
        });
        let worker = fx.worker(Arc::new(storage), Arc::new(FakeMedia));
        let job = fx.job("c").await;

        let err = worker.process(&job).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(StorageError::Unauthorized(_))));

        let short = fx.store.get("c").await.unwrap().unwrap();
        assert_eq!(short.status, ShortStatus::Deleted);
        assert!(!job.source_path.exists());
        assert!(!job.work_dir.exists());
    }

    #[tokio::test]
    async fn test_manifest_naming_missing_segment_fails() {
        let fx = Fixture::new();
        let mut storage = MockStoragePort::new();
        storage.expect_upload().times(0);
        let worker = fx.worker(Arc::new(storage), Arc::new(DanglingMedia));
        let job = fx.job("d").await;

        let err = worker.process(&job).await.unwrap_err();
        assert!(matches!(err, AppError::Media(MediaError::MissingOutput(ref name)) if name == "segment_001.ts"));
        assert_eq!(fx.store.get("d").await.unwrap().unwrap().status, ShortStatus::Deleted);
        assert!(!job.work_dir.exists());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_stay_isolated() {
        let fx = Fixture::new();
        let worker = fx.worker(Arc::new(FsStorage::new(fx.storage_root())), Arc::new(FakeMedia));
        let first = fx.job("one").await;
        let second = fx.job("two").await;
        assert_ne!(first.work_dir, second.work_dir);

        let (a, b) = tokio::join!(worker.process(&first), worker.process(&second));
        a.unwrap();
        b.unwrap();

        let one = tokio::fs::read_to_string(fx.storage_root().join("shorts/one/segment_000.ts")).await.unwrap();
        let two = tokio::fs::read_to_string(fx.storage_root().join("shorts/two/segment_000.ts")).await.unwrap();
        assert_eq!(one, "one.mp4-0");
        assert_eq!(two, "two.mp4-0");
        assert!(!fx.dir.path().join("work").join("one").exists());
        assert!(!fx.dir.path().join("work").join("two").exists());
    }

    #[tokio::test]
    async fn test_run_stops_when_queue_closes() {
        let mut queue = crate::ports::queue::MockJobQueuePort::new();
        queue.expect_dequeue_job().returning(|_| Err(QueueError::Closed));
        let worker = WorkerService::new(
            Arc::new(queue),
            Arc::new(MemoryStore::new()),
            Arc::new(MockStoragePort::new()),
            Arc::new(FakeMedia),
        );
        tokio::time::timeout(Duration::from_secs(1), worker.run(0)).await.unwrap();
    }
}
