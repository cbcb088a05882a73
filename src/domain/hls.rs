use once_cell::sync::Lazy;
use regex::Regex;

static SEGMENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.(ts|m4s|mp4|aac)$").unwrap());

static MAP_URI: Lazy<Regex> = Lazy::new(|| Regex::new(r#"URI="([^"]*)""#).unwrap());

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaylistError {
    #[error("manifest does not start with #EXTM3U")]
    MissingHeader,
    #[error("malformed tag on line {line}: {tag}")]
    MalformedTag { line: usize, tag: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub duration: f64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub version: u8,
    pub target_duration: u64,
    pub media_sequence: u64,
    pub segments: Vec<MediaSegment>,
    pub end_list: bool,
    pub playlist_type: Option<String>,
    pub independent_segments: bool,
    /// Initialization segment for fMP4 (EXT-X-MAP)
    pub init_segment: Option<String>,
}

impl MediaPlaylist {
    pub fn new(target_duration: u64) -> Self {
        Self {
            version: 3,
            target_duration,
            media_sequence: 0,
            segments: Vec::new(),
            end_list: true,
            playlist_type: None,
            independent_segments: false,
            init_segment: None,
        }
    }

    pub fn add_segment(&mut self, duration: f64, uri: String) {
        self.segments.push(MediaSegment { duration, uri });
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Parses a media playlist as written by ffmpeg's hls muxer.
    pub fn parse(text: &str) -> Result<Self, PlaylistError> {
        check_header(text)?;

        let mut playlist = MediaPlaylist::new(0);
        playlist.end_list = false;
        let mut pending_duration: Option<f64> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let line_no = idx + 1;
            if line.is_empty() || line == "#EXTM3U" {
                continue;
            }

            let malformed = || PlaylistError::MalformedTag {
                line: line_no,
                tag: line.to_string(),
            };

            if let Some(v) = line.strip_prefix("#EXT-X-VERSION:") {
                playlist.version = v.trim().parse().map_err(|_| malformed())?;
            } else if let Some(v) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                playlist.target_duration = v.trim().parse().map_err(|_| malformed())?;
            } else if let Some(v) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
                playlist.media_sequence = v.trim().parse().map_err(|_| malformed())?;
            } else if let Some(v) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
                playlist.playlist_type = Some(v.trim().to_string());
            } else if line == "#EXT-X-INDEPENDENT-SEGMENTS" {
                playlist.independent_segments = true;
            } else if line.starts_with("#EXT-X-MAP:") {
                let uri = MAP_URI.captures(line).ok_or_else(malformed)?;
                playlist.init_segment = Some(uri[1].to_string());
            } else if let Some(v) = line.strip_prefix("#EXTINF:") {
                let value = v.split(',').next().unwrap_or_default().trim();
                pending_duration = Some(value.parse().map_err(|_| malformed())?);
            } else if line == "#EXT-X-ENDLIST" {
                playlist.end_list = true;
            } else if line.starts_with('#') {
                // Unknown tags are carried by the raw manifest, not the model.
                continue;
            } else {
                let duration = pending_duration.take().ok_or_else(malformed)?;
                playlist.add_segment(duration, line.to_string());
            }
        }

        Ok(playlist)
    }
}

fn check_header(text: &str) -> Result<(), PlaylistError> {
    let first = text.lines().map(str::trim).find(|l| !l.is_empty());
    match first {
        Some("#EXTM3U") => Ok(()),
        _ => Err(PlaylistError::MissingHeader),
    }
}

/// Segment names accepted by the playback proxy.
pub fn is_safe_segment_name(name: &str) -> bool {
    SEGMENT_NAME.is_match(name)
}

/// Bare file name of a manifest URI: no query, fragment or directories.
fn file_name_of(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path)
}

/// Points every URI in `manifest` at `proxy_base/<file name>` so clients
/// never see the storage location. Tags are preserved verbatim except for
/// the URI inside `#EXT-X-MAP`.
pub fn rewrite_for_proxy(manifest: &str, proxy_base: &str) -> Result<String, PlaylistError> {
    // Rewriting works on the raw text so tags the model skips are kept.
    MediaPlaylist::parse(manifest)?;
    let base = proxy_base.trim_end_matches('/');
    let mut out = String::with_capacity(manifest.len() + 64);

    for raw in manifest.lines() {
        let line = raw.trim();
        if line.is_empty() {
            out.push('\n');
            continue;
        }
        if line.starts_with("#EXT-X-MAP:") {
            let rewritten = MAP_URI.replace(line, |caps: &regex::Captures| {
                format!("URI=\"{}/{}\"", base, file_name_of(&caps[1]))
            });
            out.push_str(&rewritten);
        } else if line.starts_with('#') {
            out.push_str(line);
        } else {
            out.push_str(base);
            out.push('/');
            out.push_str(file_name_of(line));
        }
        out.push('\n');
    }

    Ok(out)
}
