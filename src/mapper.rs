use crate::models::{Actor, Track, TrackStatus};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

/// Fields the remote object can never decide for itself. Status, position and
/// attribution always come from the caller; they are never guessed from
/// remote data.
#[derive(Debug, Clone)]
pub struct TrackOverrides {
    pub playlist_id: String,
    pub status: TrackStatus,
    pub position: Option<i64>,
    pub added_by: Option<Actor>,
    pub suggested_by: Option<Actor>,
}

impl TrackOverrides {
    /// Overrides for a remote item discovered by pull-sync: lands in the
    /// suggestion inbox, unordered, attributed to the sync engine.
    pub fn pulled_suggestion(playlist_id: &str) -> Self {
        Self {
            playlist_id: playlist_id.to_string(),
            status: TrackStatus::Suggested,
            position: None,
            added_by: None,
            suggested_by: Some(Actor::System),
        }
    }
}

/// Build a complete local Track row from a remote track object.
///
/// This is the only place Track rows are constructed from remote data; the
/// search-add, AI-suggestion and pull-sync insertion paths all route through
/// it. Handles both the rich nested Spotify shape (`artists[]`,
/// `album{name,uri,images[]}`) and the flat normalized shape search results
/// are reduced to (`artist`, `album` as a plain string, `artwork_url`,
/// `artist_uri`, `album_uri`). Missing optional fields become None; missing
/// title/artist fall back to "Unknown". Never panics.
pub fn build_track_row(obj: &Value, overrides: &TrackOverrides) -> Track {
    let title = obj["name"]
        .as_str()
        .or_else(|| obj["title"].as_str())
        .unwrap_or("Unknown")
        .to_string();

    let artist = match obj["artists"].as_array() {
        Some(artists) if !artists.is_empty() => artists
            .iter()
            .filter_map(|a| a["name"].as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => obj["artist"].as_str().unwrap_or("").to_string(),
    };
    let artist = if artist.is_empty() {
        "Unknown".to_string()
    } else {
        artist
    };

    // `album` is an object in playlist listings but a bare string in
    // normalized search results.
    let album = obj["album"]
        .as_str()
        .or_else(|| obj["album"]["name"].as_str())
        .map(|s| s.to_string());

    let artwork_url = obj["album"]["images"][0]["url"]
        .as_str()
        .or_else(|| obj["artwork_url"].as_str())
        .map(|s| s.to_string());

    let artist_spotify_uri = obj["artists"][0]["uri"]
        .as_str()
        .or_else(|| obj["artist_uri"].as_str())
        .map(|s| s.to_string());

    let album_spotify_uri = obj["album"]["uri"]
        .as_str()
        .or_else(|| obj["album_uri"].as_str())
        .map(|s| s.to_string());

    Track {
        id: Uuid::new_v4().to_string(),
        playlist_id: overrides.playlist_id.clone(),
        title,
        artist,
        album,
        artwork_url,
        spotify_uri: obj["uri"].as_str().map(|s| s.to_string()),
        artist_spotify_uri,
        album_spotify_uri,
        duration_ms: obj["duration_ms"].as_i64(),
        status: overrides.status,
        position: overrides.position,
        added_by: overrides.added_by.clone(),
        suggested_by: overrides.suggested_by.clone(),
        pushed_at: None,
        rating: None,
        pinned_comment: None,
        created_at: Utc::now().timestamp(),
    }
}
