//! Upload intake policy: accepted containers, size and duration limits.

use std::path::Path;

pub const DEFAULT_MAX_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_DURATION_SECS: f64 = 120.0;

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/webm",
    "video/x-m4v",
];

/// Client input errors, each carrying a machine-readable reason code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("a video file is required")]
    MissingFile,
    #[error("a title is required")]
    MissingTitle,
    #[error("unsupported video type: {0}")]
    UnsupportedType(String),
    #[error("video exceeds the {limit} byte upload limit")]
    FileTooLarge { limit: u64 },
    #[error("video is {actual:.1}s long, the limit is {limit:.0}s")]
    TooLong { actual: f64, limit: f64 },
    #[error("video could not be read: {0}")]
    CorruptVideo(String),
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingFile => "MISSING_FILE",
            Rejection::MissingTitle => "MISSING_TITLE",
            Rejection::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            Rejection::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Rejection::TooLong { .. } => "VIDEO_TOO_LONG",
            Rejection::CorruptVideo(_) => "CORRUPT_VIDEO",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub max_duration_secs: f64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

impl UploadPolicy {
    /// Checks the file name and declared content type, returning the
    /// lowercased extension to keep on the temporary file.
    pub fn check_file(&self, file_name: &str, content_type: Option<&str>) -> Result<String, Rejection> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Rejection::UnsupportedType(file_name.to_string()))?;

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Rejection::UnsupportedType(ext));
        }

        if let Some(mime) = content_type {
            let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            if essence != "application/octet-stream" && !ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
                return Err(Rejection::UnsupportedType(essence));
            }
        }

        Ok(ext)
    }

    pub fn check_size(&self, written: u64) -> Result<(), Rejection> {
        if written > self.max_bytes {
            return Err(Rejection::FileTooLarge { limit: self.max_bytes });
        }
        Ok(())
    }

    pub fn check_duration(&self, seconds: f64) -> Result<(), Rejection> {
        if seconds > self.max_duration_secs {
            return Err(Rejection::TooLong {
                actual: seconds,
                limit: self.max_duration_secs,
            });
        }
        Ok(())
    }
}
