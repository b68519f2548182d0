use super::PlaylistApi;
use crate::error::SyncError;
use crate::models::PlaylistMeta;
use crate::token::TokenStore;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::env;

const PAGE_LIMIT: usize = 50;

/// Spotify Web API client for the playlist `/items` endpoints.
///
/// Every call obtains a bearer through the TokenStore; a missing credential
/// surfaces as `SyncError::NotConnected` and any non-2xx response as
/// `SyncError::Api` with status and endpoint. No per-call retries: transient
/// failures are reconciled by the next scheduled sync pass.
/// The API base may be overridden via SPOTIFY_API_BASE (useful for tests).
pub struct SpotifyClient {
    client: Client,
    tokens: TokenStore,
    max_batch: usize,
}

impl SpotifyClient {
    pub fn new(tokens: TokenStore, max_batch: usize) -> Self {
        Self {
            client: Client::new(),
            tokens,
            max_batch,
        }
    }

    fn api_base() -> String {
        env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
    }

    async fn bearer(&self) -> Result<String> {
        match self.tokens.get_valid_access_token().await? {
            Some(token) => Ok(format!("Bearer {}", token)),
            None => Err(SyncError::NotConnected.into()),
        }
    }

    /// Issue one authenticated request against `{api_base}{path}` and parse
    /// the JSON body. 204/empty responses yield `Value::Null`.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let bearer = self.bearer().await?;
        let url = format!("{}{}", Self::api_base(), path);
        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, &bearer)
            .header(CONTENT_TYPE, "application/json");
        if let Some(b) = &body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            error!("Spotify API error [{}] {} {}: {}", status, method, path, txt);
            return Err(SyncError::Api {
                status: status.as_u16(),
                endpoint: path.to_string(),
            }
            .into());
        }
        if status.as_u16() == 204 {
            return Ok(Value::Null);
        }
        let txt = resp.text().await.unwrap_or_default();
        if txt.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&txt)?)
    }
}

#[async_trait]
impl PlaylistApi for SpotifyClient {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut offset = 0usize;
        loop {
            let path = format!(
                "/playlists/{}/items?offset={}&limit={}",
                playlist_id, offset, PAGE_LIMIT
            );
            let j = self.request(Method::GET, &path, None).await?;
            if let Some(entries) = j["items"].as_array() {
                for entry in entries {
                    // field renamed from "track" to "item"; accept both
                    let obj = if !entry["item"].is_null() {
                        &entry["item"]
                    } else {
                        &entry["track"]
                    };
                    if obj["uri"].as_str().is_some() {
                        items.push(obj.clone());
                    }
                }
            }
            offset += PAGE_LIMIT;
            if j["next"].as_str().is_none() {
                break;
            }
        }
        debug!("Listed {} items from Spotify playlist {}", items.len(), playlist_id);
        Ok(items)
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        for chunk in uris.chunks(self.max_batch) {
            let path = format!("/playlists/{}/items", playlist_id);
            self.request(Method::POST, &path, Some(json!({ "uris": chunk })))
                .await?;
        }
        Ok(())
    }

    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        for chunk in uris.chunks(self.max_batch) {
            let tracks: Vec<Value> = chunk.iter().map(|u| json!({ "uri": u })).collect();
            let path = format!("/playlists/{}/items", playlist_id);
            self.request(Method::DELETE, &path, Some(json!({ "tracks": tracks })))
                .await?;
        }
        Ok(())
    }

    async fn replace_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        // The PUT overwrites contents and order in one shot but caps at the
        // batch limit; any overflow is appended in order with POSTs.
        let path = format!("/playlists/{}/items", playlist_id);
        let first: Vec<String> = uris.iter().take(self.max_batch).cloned().collect();
        self.request(Method::PUT, &path, Some(json!({ "uris": first })))
            .await?;
        if uris.len() > self.max_batch {
            self.add_items(playlist_id, &uris[self.max_batch..]).await?;
        }
        Ok(())
    }

    async fn playlist_meta(&self, playlist_id: &str) -> Result<PlaylistMeta> {
        let path = format!("/playlists/{}", playlist_id);
        let j = self.request(Method::GET, &path, None).await?;
        Ok(PlaylistMeta {
            name: j["name"].as_str().unwrap_or("").to_string(),
            description: j["description"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            cover_url: j["images"][0]["url"].as_str().map(|s| s.to_string()),
        })
    }

    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Value>> {
        let q = format!("track:{} artist:{}", title, artist);
        let path = format!("/search?q={}&type=track&limit=1", urlencoding::encode(&q));
        let j = self.request(Method::GET, &path, None).await?;
        Ok(j["tracks"]["items"]
            .as_array()
            .and_then(|a| a.first())
            .cloned())
    }
}
