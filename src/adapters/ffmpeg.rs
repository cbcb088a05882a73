//! `ffmpeg`/`ffprobe` backed media toolkit.

use crate::domain::media::{duration_from_ffprobe_json, HlsOutput, TranscodeProfile};
use crate::ports::media::{MediaError, MediaToolkit};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    #[cfg(not(feature = "libav"))]
    async fn probe(&self, path: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_format")
            .arg("-print_format")
            .arg("json")
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn { tool: "ffprobe", source })?;
        let output = check_status("ffprobe", output)?;

        duration_from_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| MediaError::NoDuration(path.to_path_buf()))
    }

    #[cfg(feature = "libav")]
    async fn probe(&self, path: &Path) -> Result<f64, MediaError> {
        use ffmpeg_next as ffmpeg;

        let path_clone = path.to_path_buf();
        let micros = tokio::task::spawn_blocking(move || -> Result<i64, ffmpeg::Error> {
            ffmpeg::init()?;
            let context = ffmpeg::format::input(&path_clone)?;
            Ok(context.duration())
        })
        .await
        .map_err(|e| MediaError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        .map_err(|e| MediaError::Failed {
            tool: "libav",
            code: None,
            stderr: e.to_string(),
        })?;

        if micros <= 0 {
            return Err(MediaError::NoDuration(path.to_path_buf()));
        }
        Ok(micros as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE))
    }
}

fn check_status(tool: &'static str, output: Output) -> Result<Output, MediaError> {
    if output.status.success() {
        return Ok(output);
    }
    Err(MediaError::Failed {
        tool,
        code: output.status.code(),
        stderr: stderr_tail(&output.stderr, 5),
    })
}

/// Last `n` lines of a tool's stderr; ffmpeg puts the actual error last.
fn stderr_tail(stderr: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Segments (`.ts`/`.m4s`) sitting next to the manifest, in name order.
pub async fn collect_hls_output(out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
    let manifest = profile.manifest_path(out_dir);
    if !tokio::fs::try_exists(&manifest).await? {
        return Err(MediaError::MissingOutput(profile.manifest_name.clone()));
    }

    let mut segments = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_segment = matches!(path.extension().and_then(|e| e.to_str()), Some("ts") | Some("m4s"));
        if is_segment {
            segments.push(path);
        }
    }
    if segments.is_empty() {
        return Err(MediaError::MissingOutput("segments".to_string()));
    }
    segments.sort();

    Ok(HlsOutput { manifest, segments })
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    #[tracing::instrument(name = "probe_duration", skip(self))]
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        self.probe(path).await
    }

    #[tracing::instrument(name = "transcode_hls", skip(self, profile))]
    async fn transcode_hls(&self, source: &Path, out_dir: &Path, profile: &TranscodeProfile) -> Result<HlsOutput, MediaError> {
        tokio::fs::create_dir_all(out_dir).await?;

        let output = Command::new(&self.ffmpeg)
            .args(profile.ffmpeg_args(source, out_dir))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn { tool: "ffmpeg", source })?;
        check_status("ffmpeg", output)?;

        let hls = collect_hls_output(out_dir, profile).await?;
        tracing::debug!(segments = hls.segments.len(), "transcode finished");
        Ok(hls)
    }
}
