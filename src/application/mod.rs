//! Application layer - services that drive the ports.

pub mod ingest;
pub mod playback;
pub mod worker;

pub use ingest::{IngestService, IncomingUpload};
pub use playback::PlaybackService;
pub use worker::WorkerService;

use std::io::ErrorKind;
use std::path::Path;

/// Removes a temporary file or directory. Failures are logged, never returned.
pub async fn discard(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => tracing::debug!("removed {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove {:?}: {}", path, e),
    }
}
