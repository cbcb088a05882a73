//! Short-video posts and their processing lifecycle.

use super::text::slugify;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage folder holding every published short.
pub const SHORTS_PREFIX: &str = "shorts";
/// Manifest file name inside a short's folder.
pub const MANIFEST_NAME: &str = "playlist.m3u8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortStatus {
    Inactive,
    Active,
    Deleted,
}

impl ShortStatus {
    /// `inactive` moves to exactly one terminal state and never back.
    pub fn can_transition_to(self, next: ShortStatus) -> bool {
        matches!(
            (self, next),
            (ShortStatus::Inactive, ShortStatus::Active) | (ShortStatus::Inactive, ShortStatus::Deleted)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShortStatus::Inactive => "inactive",
            ShortStatus::Active => "active",
            ShortStatus::Deleted => "deleted",
        }
    }
}

/// Coarse state exposed to clients polling an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    Processing,
    Completed,
    Failed,
}

impl From<ShortStatus> for ClientState {
    fn from(status: ShortStatus) -> Self {
        match status {
            ShortStatus::Active => ClientState::Completed,
            ShortStatus::Deleted => ClientState::Failed,
            ShortStatus::Inactive => ClientState::Processing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorKind {
    #[default]
    User,
    Admin,
}

/// Owner of a short: either a platform user or an admin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRef {
    pub kind: CreatorKind,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLocation {
    pub province: Option<String>,
    pub ward: Option<String>,
}

/// Metadata submitted alongside an uploaded video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewShort {
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<CreatorRef>,
    pub location: ShortLocation,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Short {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    /// Storage-relative manifest path, empty until published.
    pub video_url: String,
    pub created_by: Option<CreatorRef>,
    pub location: ShortLocation,
    pub tags: Vec<String>,
    pub views: u64,
    pub likes: u64,
    pub shares: u64,
    pub status: ShortStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Short {
    pub fn placeholder(id: String, new: NewShort, slug: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            slug,
            description: new.description,
            video_url: String::new(),
            created_by: new.created_by,
            location: new.location,
            tags: new.tags,
            views: 0,
            likes: 0,
            shares: 0,
            status: ShortStatus::Inactive,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Applies `active` with the published manifest path.
    /// Returns false and leaves the record untouched when not `inactive`.
    pub fn activate(&mut self, video_url: &str, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(ShortStatus::Active) {
            return false;
        }
        self.status = ShortStatus::Active;
        self.video_url = video_url.to_string();
        self.updated_at = now;
        true
    }

    /// Applies `deleted` and stamps the deletion time.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(ShortStatus::Deleted) {
            return false;
        }
        self.status = ShortStatus::Deleted;
        self.deleted_at = Some(now);
        self.updated_at = now;
        true
    }

    pub fn client_state(&self) -> ClientState {
        self.status.into()
    }
}

/// Title-derived slug with a millisecond suffix.
pub fn unique_slug(title: &str, now: DateTime<Utc>) -> String {
    let base = slugify(title);
    let base = if base.is_empty() { "short".to_string() } else { base };
    format!("{}-{}", base, now.timestamp_millis())
}

/// `slug` with a fragment of the record id appended, longer on each
/// `attempt`, for when the timestamped slug is already taken.
pub fn disambiguate_slug(slug: &str, id: &str, attempt: usize) -> String {
    let fragment: String = id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8 * attempt)
        .collect();
    format!("{}-{}", slug, fragment)
}

/// Folder holding every object of one short.
pub fn storage_folder(short_id: &str) -> String {
    format!("{}/{}", SHORTS_PREFIX, short_id)
}

pub fn segment_key(short_id: &str, segment: &str) -> String {
    format!("{}/{}", storage_folder(short_id), segment)
}

/// Splits a comma separated tag field, dropping blanks and duplicates.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_short() -> Short {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Short::placeholder(
            "abc".to_string(),
            NewShort {
                title: "Sapa".to_string(),
                ..Default::default()
            },
            "sapa-1".to_string(),
            now,
        )
    }

    #[test]
    fn test_placeholder_is_inactive_without_url() {
        let short = new_short();
        assert_eq!(short.status, ShortStatus::Inactive);
        assert!(short.video_url.is_empty());
        assert_eq!(short.client_state(), ClientState::Processing);
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut short = new_short();
        assert!(short.activate("shorts/abc/playlist.m3u8", Utc::now()));
        assert!(!short.mark_deleted(Utc::now()));
        assert!(!short.activate("other", Utc::now()));
        assert_eq!(short.status, ShortStatus::Active);
        assert_eq!(short.video_url, "shorts/abc/playlist.m3u8");
        assert!(short.deleted_at.is_none());

        let mut failed = new_short();
        assert!(failed.mark_deleted(Utc::now()));
        assert!(failed.deleted_at.is_some());
        assert!(!failed.activate("late", Utc::now()));
        assert_eq!(failed.client_state(), ClientState::Failed);
    }

    #[test]
    fn test_unique_slug_has_timestamp_suffix() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(unique_slug("Phú Quốc Sunset", now), "phu-quoc-sunset-1700000000123");
        assert_eq!(unique_slug("!!!", now), "short-1700000000123");
    }

    #[test]
    fn test_disambiguate_slug_uses_id_fragment() {
        let id = "3f2a9c1e-77b0-4d1a-9e2f-0a1b2c3d4e5f";
        assert_eq!(disambiguate_slug("ha-long-17", id, 1), "ha-long-17-3f2a9c1e");
        assert_eq!(disambiguate_slug("ha-long-17", id, 2), "ha-long-17-3f2a9c1e77b04d1a");
    }

    #[test]
    fn test_keys_are_scoped_by_id() {
        assert_eq!(segment_key("a1", MANIFEST_NAME), "shorts/a1/playlist.m3u8");
        assert_eq!(segment_key("a1", "segment_000.ts"), "shorts/a1/segment_000.ts");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" beach, ,food,beach "), vec!["beach", "food"]);
    }
}
