use super::PlaylistApi;
use crate::error::SyncError;
use crate::models::PlaylistMeta;
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MockPlaylist {
    items: Vec<Value>,
    meta: Option<PlaylistMeta>,
}

/// In-memory PlaylistApi holding real per-playlist item state, used by the
/// reconciliation tests and for dry runs without credentials.
pub struct MockPlaylistApi {
    playlists: Mutex<HashMap<String, MockPlaylist>>,
    failing: Mutex<HashSet<String>>,
    failing_meta: Mutex<HashSet<String>>,
    failing_remove: Mutex<HashSet<String>>,
}

impl MockPlaylistApi {
    pub fn new() -> Self {
        Self {
            playlists: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            failing_meta: Mutex::new(HashSet::new()),
            failing_remove: Mutex::new(HashSet::new()),
        }
    }

    /// Seed the remote playlist with raw track objects.
    pub async fn set_items(&self, playlist_id: &str, items: Vec<Value>) {
        let mut g = self.playlists.lock().await;
        g.entry(playlist_id.to_string()).or_default().items = items;
    }

    pub async fn set_meta(&self, playlist_id: &str, meta: PlaylistMeta) {
        let mut g = self.playlists.lock().await;
        g.entry(playlist_id.to_string()).or_default().meta = Some(meta);
    }

    /// Make every operation on this playlist fail with a 500.
    pub async fn fail_playlist(&self, playlist_id: &str) {
        self.failing.lock().await.insert(playlist_id.to_string());
    }

    /// Make only metadata fetches fail for this playlist.
    pub async fn fail_meta(&self, playlist_id: &str) {
        self.failing_meta.lock().await.insert(playlist_id.to_string());
    }

    /// Make only item removals fail for this playlist.
    pub async fn fail_remove(&self, playlist_id: &str) {
        self.failing_remove.lock().await.insert(playlist_id.to_string());
    }

    /// Current remote URI sequence, for assertions.
    pub async fn uris(&self, playlist_id: &str) -> Vec<String> {
        let g = self.playlists.lock().await;
        g.get(playlist_id)
            .map(|p| {
                p.items
                    .iter()
                    .filter_map(|i| i["uri"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn check_failing(&self, playlist_id: &str) -> Result<()> {
        if self.failing.lock().await.contains(playlist_id) {
            return Err(SyncError::Api {
                status: 500,
                endpoint: format!("/playlists/{}/items", playlist_id),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for MockPlaylistApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistApi for MockPlaylistApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<Value>> {
        self.check_failing(playlist_id).await?;
        let g = self.playlists.lock().await;
        Ok(g.get(playlist_id).map(|p| p.items.clone()).unwrap_or_default())
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.check_failing(playlist_id).await?;
        info!("MockPlaylistApi: add {} items to {}", uris.len(), playlist_id);
        let mut g = self.playlists.lock().await;
        let pl = g.entry(playlist_id.to_string()).or_default();
        for uri in uris {
            pl.items.push(json!({ "uri": uri }));
        }
        Ok(())
    }

    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.check_failing(playlist_id).await?;
        if self.failing_remove.lock().await.contains(playlist_id) {
            return Err(SyncError::Api {
                status: 500,
                endpoint: format!("/playlists/{}/items", playlist_id),
            }
            .into());
        }
        info!("MockPlaylistApi: remove {} items from {}", uris.len(), playlist_id);
        let remove: HashSet<&str> = uris.iter().map(|s| s.as_str()).collect();
        let mut g = self.playlists.lock().await;
        if let Some(pl) = g.get_mut(playlist_id) {
            pl.items
                .retain(|i| i["uri"].as_str().map(|u| !remove.contains(u)).unwrap_or(true));
        }
        Ok(())
    }

    async fn replace_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.check_failing(playlist_id).await?;
        info!("MockPlaylistApi: replace {} with {} items", playlist_id, uris.len());
        let mut g = self.playlists.lock().await;
        let pl = g.entry(playlist_id.to_string()).or_default();
        // keep any rich object already known for a URI so listings after a
        // replace still expose full metadata, as Spotify does
        let existing: HashMap<String, Value> = pl
            .items
            .iter()
            .filter_map(|i| i["uri"].as_str().map(|u| (u.to_string(), i.clone())))
            .collect();
        pl.items = uris
            .iter()
            .map(|u| existing.get(u).cloned().unwrap_or_else(|| json!({ "uri": u })))
            .collect();
        Ok(())
    }

    async fn playlist_meta(&self, playlist_id: &str) -> Result<PlaylistMeta> {
        self.check_failing(playlist_id).await?;
        if self.failing_meta.lock().await.contains(playlist_id) {
            return Err(SyncError::Api {
                status: 500,
                endpoint: format!("/playlists/{}", playlist_id),
            }
            .into());
        }
        let g = self.playlists.lock().await;
        Ok(g.get(playlist_id)
            .and_then(|p| p.meta.clone())
            .unwrap_or(PlaylistMeta {
                name: format!("mock-{}", playlist_id),
                description: None,
                cover_url: None,
            }))
    }

    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Value>> {
        Ok(Some(json!({
            "uri": format!("mock:track:{}:{}", title, artist),
            "name": title,
            "artist": artist,
        })))
    }
}
