use crate::api::PlaylistApi;
use crate::db;
use crate::mapper::{build_track_row, TrackOverrides};
use crate::models::Playlist;
use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Reconciliation engine between the local track tables and one remote
/// playlist per local playlist.
///
/// All three operations are idempotent and safe to run concurrently for the
/// same playlist: a second pass with no intervening mutation finds nothing
/// new to insert (known-URI check) and nothing left to demote (demotion
/// clears `pushed_at`). That convergence, not locking, is the safety net.
pub struct SyncEngine {
    api: Arc<dyn PlaylistApi>,
    db_path: PathBuf,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn PlaylistApi>, db_path: PathBuf) -> Self {
        Self { api, db_path }
    }

    /// Run a blocking DB operation on a fresh connection.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("opening DB at {}", db_path.display()))?;
            f(&mut conn)
        })
        .await?
    }

    pub async fn linked_playlists(&self) -> Result<Vec<Playlist>> {
        self.with_db(|conn| db::linked_playlists(conn)).await
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>> {
        let id = playlist_id.to_string();
        self.with_db(move |conn| db::get_playlist(conn, &id)).await
    }

    /// Pull remote changes into the local store, then re-assert the local
    /// active list as the authoritative remote contents.
    ///
    /// Remote items not yet known locally are consumed into the suggestion
    /// inbox and removed from the remote list; leaving them remote would make
    /// them reappear as "new" on every pass, since only active tracks are
    /// pushed back. Locally active tracks whose previously-confirmed URI has
    /// vanished remotely are demoted to rejected. Unpushed tracks are never
    /// demoted: their absence from the remote list is expected, not a
    /// deletion signal.
    pub async fn pull_and_merge(&self, playlist_id: &str, spotify_id: &str) -> Result<()> {
        // Metadata first; a failure here must not block track reconciliation.
        if let Err(e) = self.sync_metadata_only(playlist_id, spotify_id).await {
            warn!("Metadata sync failed for playlist {}: {}", playlist_id, e);
        }

        let known = {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| db::known_uris(conn, &pid)).await?
        };

        // Hard dependency: everything below keys off the remote item list.
        let remote = self.api.list_items(spotify_id).await?;
        let remote_uris: HashSet<String> = remote
            .iter()
            .filter_map(|obj| obj["uri"].as_str().map(|s| s.to_string()))
            .collect();

        // New remote items -> suggestion inbox.
        let mut seen = HashSet::new();
        let mut consumed: Vec<String> = Vec::new();
        let mut inserted = 0usize;
        for obj in &remote {
            let uri = match obj["uri"].as_str() {
                Some(u) => u.to_string(),
                None => continue,
            };
            if known.contains(&uri) || !seen.insert(uri.clone()) {
                continue;
            }
            let track = build_track_row(obj, &TrackOverrides::pulled_suggestion(playlist_id));
            let insert_res = self
                .with_db(move |conn| db::insert_track(conn, &track))
                .await;
            match insert_res {
                Ok(()) => {
                    inserted += 1;
                    consumed.push(uri);
                }
                Err(e) => {
                    warn!("Failed to insert suggested track {}: {}", uri, e);
                }
            }
        }
        if inserted > 0 {
            info!(
                "Captured {} new remote track(s) as suggestions for playlist {}",
                inserted, playlist_id
            );
        }

        // Consumed items leave the remote list; best-effort relative to the
        // inserts above, which are never rolled back.
        if !consumed.is_empty() {
            if let Err(e) = self.api.remove_items(spotify_id, &consumed).await {
                warn!(
                    "Failed to remove {} consumed item(s) from remote playlist {}: {}",
                    consumed.len(),
                    spotify_id,
                    e
                );
            }
        }

        // Deletion detection, gated on pushed_at.
        let active = {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| db::active_tracks(conn, &pid)).await?
        };
        let to_demote: Vec<String> = active
            .iter()
            .filter(|t| t.pushed_at.is_some())
            .filter(|t| {
                t.spotify_uri
                    .as_ref()
                    .map(|uri| !remote_uris.contains(uri))
                    .unwrap_or(false)
            })
            .map(|t| t.id.clone())
            .collect();
        if !to_demote.is_empty() {
            info!(
                "Demoting {} track(s) removed remotely from playlist {}",
                to_demote.len(),
                playlist_id
            );
            let ids = to_demote;
            self.with_db(move |conn| db::demote_tracks(conn, &ids)).await?;
        }

        // Re-assert local order as authoritative remote contents.
        let uris = {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| db::active_tracks(conn, &pid))
                .await?
                .into_iter()
                .filter_map(|t| t.spotify_uri)
                .collect::<Vec<_>>()
        };
        self.api.replace_items(spotify_id, &uris).await?;

        // Replace confirmed: stamp pushed_at and the sync timestamp.
        let now = Utc::now().timestamp();
        {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| {
                db::mark_active_pushed(conn, &pid, now)?;
                db::touch_sync_timestamp(conn, &pid, now)
            })
            .await?;
        }

        info!("Pull-and-merge complete for playlist {}", playlist_id);
        Ok(())
    }

    /// Push the local active list (membership and order) to the remote
    /// playlist. Called after any direct mutation of the active list; call
    /// sites that must never fail a user action log and swallow the error.
    pub async fn push_to_remote(&self, playlist_id: &str, spotify_id: &str) -> Result<()> {
        let uris = {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| db::active_tracks(conn, &pid))
                .await?
                .into_iter()
                .filter_map(|t| t.spotify_uri)
                .collect::<Vec<_>>()
        };
        self.api.replace_items(spotify_id, &uris).await?;

        let now = Utc::now().timestamp();
        {
            let pid = playlist_id.to_string();
            self.with_db(move |conn| {
                db::mark_active_pushed(conn, &pid, now)?;
                db::touch_sync_timestamp(conn, &pid, now)
            })
            .await?;
        }
        info!(
            "Pushed {} track(s) to remote playlist {}",
            uris.len(),
            spotify_id
        );
        Ok(())
    }

    /// Mirror remote name/description/cover into the local playlist row.
    /// Never touches tracks.
    pub async fn sync_metadata_only(&self, playlist_id: &str, spotify_id: &str) -> Result<()> {
        let meta = self.api.playlist_meta(spotify_id).await?;
        let pid = playlist_id.to_string();
        self.with_db(move |conn| db::update_remote_metadata(conn, &pid, &meta))
            .await?;
        Ok(())
    }
}
