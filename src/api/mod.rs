pub mod mock;
pub mod spotify;
pub mod spotify_auth;

use crate::models::PlaylistMeta;
use anyhow::Result;
use serde_json::Value;

/// The remote playlist surface the sync engine needs. Implementations:
/// spotify::SpotifyClient and mock::MockPlaylistApi (tests).
///
/// Track objects cross this boundary as raw `serde_json::Value`s; the one
/// place they become local rows is `mapper::build_track_row`.
#[async_trait::async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Provider name (for logging).
    fn name(&self) -> &str;

    /// Full ordered item list of the remote playlist, pagination already
    /// followed. Each element is one remote track object.
    async fn list_items(&self, playlist_id: &str) -> Result<Vec<Value>>;

    /// Append items to the remote playlist.
    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Remove all occurrences of the given items.
    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Overwrite the remote playlist's contents and order to exactly the
    /// given sequence.
    async fn replace_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Remote playlist name/description/cover.
    async fn playlist_meta(&self, playlist_id: &str) -> Result<PlaylistMeta>;

    /// Search for a track by metadata; returns the first matching raw track
    /// object, if any.
    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Value>>;
}
