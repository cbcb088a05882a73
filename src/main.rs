//! Tourly server
//!
//! Wires up:
//! - Object storage (local directory or B2)
//! - Repositories and job queue (in-memory or Redis)
//! - Publish workers draining the job queue
//! - The axum HTTP layer

use anyhow::Context;
use std::sync::Arc;
use tourly::adapters::b2::B2Storage;
use tourly::adapters::ffmpeg::FfmpegToolkit;
use tourly::adapters::local::{ChannelQueue, FsStorage, MemoryStore};
use tourly::adapters::redis::RedisPool;
use tourly::application::{IngestService, PlaybackService, WorkerService};
use tourly::config::{AppConfig, RepositoryBackend, StorageBackend};
use tourly::domain::airports::Airport;
use tourly::http::{self, AppState};
use tourly::ports::media::MediaToolkit;
use tourly::ports::queue::JobQueuePort;
use tourly::ports::repository::{AirportRepository, ConsultationRepository, ShortRepository};
use tourly::ports::storage::StoragePort;
use tourly::telemetry;

struct Repositories {
    shorts: Arc<dyn ShortRepository>,
    consultations: Arc<dyn ConsultationRepository>,
    airports: Arc<dyn AirportRepository>,
    queue: Arc<dyn JobQueuePort>,
}

fn repositories(backend: &RepositoryBackend) -> anyhow::Result<Repositories> {
    Ok(match backend {
        RepositoryBackend::Memory => {
            let store = MemoryStore::new();
            Repositories {
                shorts: Arc::new(store.clone()),
                consultations: Arc::new(store.clone()),
                airports: Arc::new(store),
                queue: Arc::new(ChannelQueue::new()),
            }
        }
        RepositoryBackend::Redis { url } => {
            let pool = RedisPool::new(url).context("Failed to create Redis pool")?;
            Repositories {
                shorts: Arc::new(pool.clone()),
                consultations: Arc::new(pool.clone()),
                airports: Arc::new(pool.clone()),
                queue: Arc::new(pool),
            }
        }
    })
}

async fn seed_airports(config: &AppConfig, airports: &dyn AirportRepository) -> anyhow::Result<()> {
    let Some(path) = &config.airports_seed else {
        return Ok(());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read airport seed {:?}", path))?;
    let parsed: Vec<Airport> = serde_json::from_str(&raw).context("Airport seed is not a JSON array of airports")?;
    let count = airports.upsert_many(parsed).await?;
    tracing::info!(count, "seeded airports from {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init();
    let config = AppConfig::from_env()?;

    // 1. Adapters
    let storage: Arc<dyn StoragePort> = match &config.storage {
        StorageBackend::Fs { root } => {
            tracing::info!("storing objects under {:?}", root);
            Arc::new(FsStorage::new(root))
        }
        StorageBackend::B2(b2) => {
            tracing::info!(bucket = %b2.bucket_name, "storing objects in B2");
            Arc::new(B2Storage::new(b2.clone()))
        }
    };
    let repos = repositories(&config.repository)?;
    let media: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::default());

    let uploads_dir = config.work_dir.join("uploads");
    let transcode_root = config.work_dir.join("transcode");
    tokio::fs::create_dir_all(&uploads_dir).await?;
    tokio::fs::create_dir_all(&transcode_root).await?;

    seed_airports(&config, repos.airports.as_ref()).await?;

    // 2. Application services
    let ingest = Arc::new(IngestService::new(
        repos.shorts.clone(),
        repos.queue.clone(),
        media.clone(),
        config.upload.clone(),
        transcode_root,
    ));
    let playback = Arc::new(PlaybackService::new(
        repos.shorts.clone(),
        storage.clone(),
        config.public_base_url.clone(),
    ));
    let worker = WorkerService::new(repos.queue.clone(), repos.shorts.clone(), storage, media);

    // 3. Workers
    for i in 0..config.workers {
        let w = worker.clone();
        tokio::spawn(async move {
            w.run(i).await;
        });
    }
    tracing::info!("Started {} publish workers", config.workers);

    // 4. HTTP layer
    let app = http::router(AppState {
        ingest,
        playback,
        shorts: repos.shorts,
        consultations: repos.consultations,
        airports: repos.airports,
        uploads_dir,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!("Listening at {}", config.bind_addr());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
