use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Transcode-and-publish work for one accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishJob {
    /// Short record the job belongs to; also scopes the storage folder.
    pub short_id: String,
    /// Uploaded source file, removed once the job ends.
    pub source_path: PathBuf,
    /// Per-record directory receiving segments and the manifest.
    pub work_dir: PathBuf,
}

impl PublishJob {
    pub fn new(short_id: &str, source_path: PathBuf, work_root: &Path) -> Self {
        Self {
            short_id: short_id.to_string(),
            source_path,
            work_dir: work_root.join(short_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Job {
    Publish(PublishJob),
}
