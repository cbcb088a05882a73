use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("requested range not satisfiable for {0}")]
    RangeNotSatisfiable(String),
    #[error("storage authorization failed: {0}")]
    Unauthorized(String),
    #[error("storage responded {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
}

/// An object (or a byte range of one) being streamed out of storage.
pub struct StoredObject {
    /// 200 for a full body, 206 for a range.
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub accept_ranges: bool,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl StoredObject {
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// Buffers the whole body; only meant for small objects like manifests.
    pub async fn into_text(self) -> io::Result<String> {
        use futures::TryStreamExt;
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        let bytes = chunks.concat();
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Upload a file from a local path to storage
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<(), StorageError>;

    /// Stream an object back, honouring an HTTP `Range` header value
    async fn fetch(&self, key: &str, range: Option<String>) -> Result<StoredObject, StorageError>;
}

/// Content type stored alongside an uploaded object.
pub fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/mp2t".to_string(),
        Some("m4s") => "video/iso.segment".to_string(),
        _ => mime_guess::from_path(path).first_or_octet_stream().to_string(),
    }
}
