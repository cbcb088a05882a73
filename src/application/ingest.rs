//! Synchronous half of an upload: validate, gate on duration, persist the
//! placeholder and hand the rest to the workers.

use super::discard;
use crate::domain::jobs::{Job, PublishJob};
use crate::domain::shorts::{disambiguate_slug, unique_slug, NewShort, Short};
use crate::domain::upload::{Rejection, UploadPolicy};
use crate::error::AppError;
use crate::ports::media::MediaToolkit;
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::{RepoError, ShortRepository};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Slug candidates tried before an insert conflict is returned.
const SLUG_ATTEMPTS: usize = 3;

/// A video already written to a temporary file, plus its metadata.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub source_path: PathBuf,
    pub short: NewShort,
}

pub struct IngestService {
    shorts: Arc<dyn ShortRepository>,
    queue: Arc<dyn JobQueuePort>,
    media: Arc<dyn MediaToolkit>,
    policy: UploadPolicy,
    transcode_root: PathBuf,
}

impl IngestService {
    pub fn new(
        shorts: Arc<dyn ShortRepository>,
        queue: Arc<dyn JobQueuePort>,
        media: Arc<dyn MediaToolkit>,
        policy: UploadPolicy,
        transcode_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            shorts,
            queue,
            media,
            policy,
            transcode_root: transcode_root.into(),
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Accepts an upload and returns the `inactive` placeholder.
    /// Any error removes the temporary source file.
    #[tracing::instrument(name = "ingest_accept", skip(self, upload), fields(source = ?upload.source_path))]
    pub async fn accept(&self, upload: IncomingUpload) -> Result<Short, AppError> {
        let source = upload.source_path.clone();
        match self.admit(upload).await {
            Ok(short) => {
                tracing::info!(short_id = %short.id, slug = %short.slug, "upload accepted");
                Ok(short)
            }
            Err(e) => {
                discard(&source).await;
                Err(e)
            }
        }
    }

    async fn admit(&self, upload: IncomingUpload) -> Result<Short, AppError> {
        let IncomingUpload { source_path, mut short } = upload;
        short.title = short.title.trim().to_string();
        if short.title.is_empty() {
            return Err(Rejection::MissingTitle.into());
        }

        self.check_duration(&source_path).await?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = self.insert_placeholder(&id, short, now).await?;

        let job = PublishJob::new(&id, source_path, &self.transcode_root);
        if let Err(e) = self.queue.enqueue_job(Job::Publish(job)).await {
            if let Err(mark) = self.shorts.mark_deleted(&id, Utc::now()).await {
                tracing::error!(short_id = %id, "could not mark short deleted: {}", mark);
            }
            return Err(e.into());
        }

        Ok(record)
    }

    /// Persists the placeholder under the timestamped slug, falling back to
    /// id-suffixed slugs when uploads with the same title land in the same
    /// millisecond.
    async fn insert_placeholder(
        &self,
        id: &str,
        short: NewShort,
        now: DateTime<Utc>,
    ) -> Result<Short, AppError> {
        let base = unique_slug(&short.title, now);
        let mut record = Short::placeholder(id.to_string(), short, base.clone(), now);
        let mut attempt = 0;
        loop {
            match self.shorts.insert(&record).await {
                Ok(()) => return Ok(record),
                Err(RepoError::Conflict(reason)) if attempt + 1 < SLUG_ATTEMPTS => {
                    attempt += 1;
                    record.slug = disambiguate_slug(&base, id, attempt);
                    tracing::debug!(
                        short_id = %id,
                        slug = %record.slug,
                        "slug taken ({}), retrying",
                        reason
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn check_duration(&self, source: &Path) -> Result<(), AppError> {
        let seconds = self.media.probe_duration(source).await.map_err(|e| {
            tracing::warn!("probe failed: {}", e);
            Rejection::CorruptVideo(e.to_string())
        })?;
        tracing::debug!(seconds, "probed duration");
        self.policy.check_duration(seconds)?;
        Ok(())
    }
}
