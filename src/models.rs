use serde::{Deserialize, Serialize};

/// Lifecycle state of a track within a playlist.
/// Only `Active` tracks participate in remote push/pull; `position` is
/// meaningful for active tracks only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    Active,
    Suggested,
    Rejected,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Active => "active",
            TrackStatus::Suggested => "suggested",
            TrackStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => TrackStatus::Active,
            "rejected" => TrackStatus::Rejected,
            _ => TrackStatus::Suggested,
        }
    }
}

/// Who created or suggested a track. The non-user variants are stored in the
/// DB as reserved sentinel strings; those sentinels never leave this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    User(String),
    System,
    AiAssistant,
}

const SYSTEM_SENTINEL: &str = "system-sync";
const AI_SENTINEL: &str = "ai-assistant";

impl Actor {
    pub fn as_db(&self) -> &str {
        match self {
            Actor::User(id) => id.as_str(),
            Actor::System => SYSTEM_SENTINEL,
            Actor::AiAssistant => AI_SENTINEL,
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            SYSTEM_SENTINEL => Actor::System,
            AI_SENTINEL => Actor::AiAssistant,
            other => Actor::User(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub playlist_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub spotify_uri: Option<String>,
    pub artist_spotify_uri: Option<String>,
    pub album_spotify_uri: Option<String>,
    pub duration_ms: Option<i64>,
    pub status: TrackStatus,
    pub position: Option<i64>,
    pub added_by: Option<Actor>,
    pub suggested_by: Option<Actor>,
    /// Epoch seconds of the last pass that confirmed this track's URI on the
    /// remote playlist. Null means "never pushed" and gates deletion detection.
    pub pushed_at: Option<i64>,
    pub rating: Option<f64>,
    pub pinned_comment: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    /// Id of the linked Spotify playlist. None means "not synced".
    pub spotify_id: Option<String>,
    /// Remote-mirrored metadata, distinct from the user-editable `title`.
    pub spotify_title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub sync_timestamp: Option<i64>,
}

/// Remote playlist metadata as returned by `PlaylistApi::playlist_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMeta {
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

/// The singleton OAuth credential row for the admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64, // epoch seconds
    pub spotify_user_id: Option<String>,
    pub spotify_display_name: Option<String>,
    pub updated_at: i64,
}
