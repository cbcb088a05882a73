//! Media probing results and the fixed HLS transcode profile.

use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Single-rendition HLS profile used for every short.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeProfile {
    pub video_codec: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub segment_secs: u32,
    pub segment_pattern: String,
    pub manifest_name: String,
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            video_bitrate: "1500k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            segment_secs: 6,
            segment_pattern: "segment_%03d.ts".to_string(),
            manifest_name: super::shorts::MANIFEST_NAME.to_string(),
        }
    }
}

impl TranscodeProfile {
    pub fn manifest_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(&self.manifest_name)
    }

    /// Arguments for `ffmpeg` producing segments plus one manifest in `out_dir`.
    pub fn ffmpeg_args(&self, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let segment_secs = self.segment_secs.to_string();
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());

        let encoding = [
            "-c:v",
            self.video_codec.as_str(),
            "-b:v",
            self.video_bitrate.as_str(),
            "-c:a",
            self.audio_codec.as_str(),
            "-b:a",
            self.audio_bitrate.as_str(),
            "-start_number",
            "0",
            "-hls_time",
            segment_secs.as_str(),
            "-hls_list_size",
            "0",
            "-hls_playlist_type",
            "vod",
            "-hls_segment_filename",
        ];
        args.extend(encoding.iter().map(OsString::from));
        args.push(out_dir.join(&self.segment_pattern).into_os_string());
        args.push(OsString::from("-f"));
        args.push(OsString::from("hls"));
        args.push(self.manifest_path(out_dir).into_os_string());
        args
    }
}

/// Files produced by one transcode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsOutput {
    pub manifest: PathBuf,
    pub segments: Vec<PathBuf>,
}

impl HlsOutput {
    /// Every file to publish, segments first so the manifest lands last.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.segments.iter().chain(std::iter::once(&self.manifest))
    }
}

/// Container duration reported by `ffprobe -show_format -print_format json`.
pub fn duration_from_ffprobe_json(raw: &str) -> Option<f64> {
    let v: Value = serde_json::from_str(raw).ok()?;
    let duration = v.get("format")?.get("duration")?;
    let seconds = match duration {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds)
    } else {
        None
    }
}
