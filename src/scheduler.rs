use crate::error::SyncError;
use crate::sync::SyncEngine;
use anyhow::{anyhow, Result};
use futures::future::join_all;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

/// Run one pull-and-merge pass over every playlist linked to a Spotify
/// playlist. Playlists sync independently; one failure is logged and does not
/// stop the others in the same cycle.
pub async fn run_full_sync(engine: &Arc<SyncEngine>) -> Result<()> {
    let playlists = engine.linked_playlists().await?;
    if playlists.is_empty() {
        info!("No playlists to sync");
        return Ok(());
    }
    info!("Syncing {} playlist(s) with Spotify", playlists.len());

    let futs = playlists.into_iter().map(|pl| {
        let engine = engine.clone();
        async move {
            let spotify_id = match &pl.spotify_id {
                Some(id) => id.clone(),
                None => return false,
            };
            match engine.pull_and_merge(&pl.id, &spotify_id).await {
                Ok(()) => {
                    info!("Synced playlist {}", pl.id);
                    true
                }
                Err(e) => {
                    error!("Failed to sync playlist {}: {:#}", pl.id, e);
                    false
                }
            }
        }
    });
    let results = join_all(futs).await;

    let succeeded = results.iter().filter(|ok| **ok).count();
    let failed = results.len() - succeeded;
    info!("Sync cycle complete: {} succeeded, {} failed", succeeded, failed);
    Ok(())
}

/// Periodic sync loop: an immediate first pass, then one pass per interval.
/// Runs until the task is dropped. Cycle-level failures (e.g. the DB being
/// unavailable) are logged, never fatal.
pub async fn start_periodic_sync(engine: Arc<SyncEngine>, interval: Duration) {
    info!(
        "Starting periodic sync service (every {}s)",
        interval.as_secs()
    );
    if let Err(e) = run_full_sync(&engine).await {
        error!("Error during initial sync pass: {:#}", e);
    }

    let mut ticker = tokio::time::interval(interval);
    // interval's first tick fires immediately; the initial pass above already
    // covered it
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = run_full_sync(&engine).await {
            error!("Error during periodic sync pass: {:#}", e);
        }
    }
}

/// On-demand single-playlist sync (UI "sync now"). Errors surface to the
/// caller so a manual trigger can show them.
pub async fn sync_one(engine: &Arc<SyncEngine>, playlist_id: &str) -> Result<()> {
    let playlist = engine
        .get_playlist(playlist_id)
        .await?
        .ok_or_else(|| anyhow!("unknown playlist {}", playlist_id))?;
    let spotify_id = playlist
        .spotify_id
        .clone()
        .ok_or_else(|| SyncError::NotLinked(playlist_id.to_string()))?;
    engine.pull_and_merge(playlist_id, &spotify_id).await
}
