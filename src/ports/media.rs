use crate::domain::media::{HlsOutput, TranscodeProfile};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("could not run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{tool} exited with {code:?}: {stderr}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("no usable duration in probe output for {0}")]
    NoDuration(PathBuf),
    #[error("transcode produced no {0}")]
    MissingOutput(String),
    #[error("media io error: {0}")]
    Io(#[from] io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Segment `source` into `out_dir` following `profile`
    async fn transcode_hls(&self, source: &Path, out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError>;
}
