use crate::ports::storage::{content_type_for, StorageError, StoragePort, StoredObject};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Object store backed by a directory: key `a/b.ts` lives at `<root>/a/b.ts`.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Inclusive byte range resolved against an object length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range header: serve the whole object.
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Resolves a single `bytes=` range. Malformed or multi-range headers fall
/// back to the full object.
pub fn resolve_range(header: Option<&str>, total: u64) -> RangeOutcome {
    let Some(byte_range) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if byte_range.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = byte_range.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    let range = match (first.is_empty(), last.is_empty()) {
        (true, true) => return RangeOutcome::Full,
        // Suffix: the last N bytes.
        (true, false) => {
            let Ok(n) = last.parse::<u64>() else {
                return RangeOutcome::Full;
            };
            if n == 0 || total == 0 {
                return RangeOutcome::Unsatisfiable;
            }
            ByteRange {
                start: total.saturating_sub(n),
                end: total - 1,
            }
        }
        (false, _) => {
            let Ok(start) = first.parse::<u64>() else {
                return RangeOutcome::Full;
            };
            let end = if last.is_empty() {
                total.saturating_sub(1)
            } else {
                match last.parse::<u64>() {
                    Ok(end) if end >= start => end.min(total.saturating_sub(1)),
                    _ => return RangeOutcome::Full,
                }
            };
            if start >= total {
                return RangeOutcome::Unsatisfiable;
            }
            ByteRange { start, end }
        }
    };
    RangeOutcome::Partial(range)
}

#[async_trait]
impl StoragePort for FsStorage {
    async fn upload(&self, local_path: &Path, key: &str, _content_type: &str) -> Result<(), StorageError> {
        let key_path = self.path_for(key)?;
        if let Some(parent) = key_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &key_path).await?;
        Ok(())
    }

    async fn fetch(&self, key: &str, range: Option<String>) -> Result<StoredObject, StorageError> {
        let path = self.path_for(key)?;
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let total = file.metadata().await?.len();
        let content_type = Some(content_type_for(&path));

        match resolve_range(range.as_deref(), total) {
            RangeOutcome::Unsatisfiable => Err(StorageError::RangeNotSatisfiable(key.to_string())),
            RangeOutcome::Full => Ok(StoredObject {
                status: 200,
                content_type,
                content_length: Some(total),
                content_range: None,
                accept_ranges: true,
                body: Box::pin(ReaderStream::new(file)),
            }),
            RangeOutcome::Partial(r) => {
                file.seek(SeekFrom::Start(r.start)).await?;
                let reader = file.take(r.len());
                Ok(StoredObject {
                    status: 206,
                    content_type,
                    content_length: Some(r.len()),
                    content_range: Some(r.content_range(total)),
                    accept_ranges: true,
                    body: Box::pin(ReaderStream::new(reader)),
                })
            }
        }
    }
}
