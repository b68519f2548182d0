use crate::models::{Actor, Credential, Playlist, PlaylistMeta, Track, TrackStatus};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

pub fn open_or_create(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../db/schema.sql"))?;
    Ok(())
}

// ---- credentials (singleton row) ----

pub fn save_credential(conn: &Connection, cred: &Credential) -> Result<()> {
    conn.execute(
        "INSERT INTO spotify_tokens (id, access_token, refresh_token, expires_at, spotify_user_id, spotify_display_name, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = excluded.refresh_token,
             expires_at = excluded.expires_at,
             spotify_user_id = excluded.spotify_user_id,
             spotify_display_name = excluded.spotify_display_name,
             updated_at = excluded.updated_at",
        params![
            cred.access_token,
            cred.refresh_token,
            cred.expires_at,
            cred.spotify_user_id,
            cred.spotify_display_name,
            cred.updated_at
        ],
    )?;
    Ok(())
}

pub fn load_credential(conn: &Connection) -> Result<Option<Credential>> {
    let mut stmt = conn.prepare(
        "SELECT access_token, refresh_token, expires_at, spotify_user_id, spotify_display_name, updated_at
         FROM spotify_tokens WHERE id = 1 LIMIT 1",
    )?;
    let row = stmt
        .query_row([], |r| {
            Ok(Credential {
                access_token: r.get(0)?,
                refresh_token: r.get(1)?,
                expires_at: r.get(2)?,
                spotify_user_id: r.get(3)?,
                spotify_display_name: r.get(4)?,
                updated_at: r.get(5)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn clear_credential(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM spotify_tokens WHERE id = 1", [])?;
    Ok(())
}

// ---- playlists ----

pub fn insert_playlist(conn: &Connection, pl: &Playlist) -> Result<()> {
    conn.execute(
        "INSERT INTO playlists (id, title, spotify_id, spotify_title, description, cover_url, sync_timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            pl.id,
            pl.title,
            pl.spotify_id,
            pl.spotify_title,
            pl.description,
            pl.cover_url,
            pl.sync_timestamp
        ],
    )?;
    Ok(())
}

fn row_to_playlist(r: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: r.get(0)?,
        title: r.get(1)?,
        spotify_id: r.get(2)?,
        spotify_title: r.get(3)?,
        description: r.get(4)?,
        cover_url: r.get(5)?,
        sync_timestamp: r.get(6)?,
    })
}

pub fn get_playlist(conn: &Connection, id: &str) -> Result<Option<Playlist>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, spotify_id, spotify_title, description, cover_url, sync_timestamp
         FROM playlists WHERE id = ?1 LIMIT 1",
    )?;
    let row = stmt.query_row(params![id], row_to_playlist).optional()?;
    Ok(row)
}

/// All playlists with a linked Spotify playlist id.
pub fn linked_playlists(conn: &Connection) -> Result<Vec<Playlist>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, spotify_id, spotify_title, description, cover_url, sync_timestamp
         FROM playlists WHERE spotify_id IS NOT NULL",
    )?;
    let rows = stmt.query_map([], row_to_playlist)?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Mirror remote playlist metadata into the local row. The user-editable
/// `title` is never touched; description/cover are only overwritten when the
/// remote actually has a value.
pub fn update_remote_metadata(conn: &Connection, playlist_id: &str, meta: &PlaylistMeta) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET spotify_title = ?2 WHERE id = ?1",
        params![playlist_id, meta.name],
    )?;
    if let Some(desc) = &meta.description {
        conn.execute(
            "UPDATE playlists SET description = ?2 WHERE id = ?1",
            params![playlist_id, desc],
        )?;
    }
    if let Some(cover) = &meta.cover_url {
        conn.execute(
            "UPDATE playlists SET cover_url = ?2 WHERE id = ?1",
            params![playlist_id, cover],
        )?;
    }
    Ok(())
}

pub fn touch_sync_timestamp(conn: &Connection, playlist_id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET sync_timestamp = ?2 WHERE id = ?1",
        params![playlist_id, now],
    )?;
    Ok(())
}

// ---- tracks ----

pub fn insert_track(conn: &Connection, t: &Track) -> Result<()> {
    conn.execute(
        "INSERT INTO tracks (id, playlist_id, title, artist, album, artwork_url, spotify_uri,
                             artist_spotify_uri, album_spotify_uri, duration_ms, status, position,
                             added_by, suggested_by, pushed_at, rating, pinned_comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            t.id,
            t.playlist_id,
            t.title,
            t.artist,
            t.album,
            t.artwork_url,
            t.spotify_uri,
            t.artist_spotify_uri,
            t.album_spotify_uri,
            t.duration_ms,
            t.status.as_str(),
            t.position,
            t.added_by.as_ref().map(|a| a.as_db().to_string()),
            t.suggested_by.as_ref().map(|a| a.as_db().to_string()),
            t.pushed_at,
            t.rating,
            t.pinned_comment,
            t.created_at
        ],
    )?;
    Ok(())
}

fn row_to_track(r: &Row<'_>) -> rusqlite::Result<Track> {
    let status: String = r.get(10)?;
    let added_by: Option<String> = r.get(12)?;
    let suggested_by: Option<String> = r.get(13)?;
    Ok(Track {
        id: r.get(0)?,
        playlist_id: r.get(1)?,
        title: r.get(2)?,
        artist: r.get(3)?,
        album: r.get(4)?,
        artwork_url: r.get(5)?,
        spotify_uri: r.get(6)?,
        artist_spotify_uri: r.get(7)?,
        album_spotify_uri: r.get(8)?,
        duration_ms: r.get(9)?,
        status: TrackStatus::from_str(&status),
        position: r.get(11)?,
        added_by: added_by.as_deref().map(Actor::from_db),
        suggested_by: suggested_by.as_deref().map(Actor::from_db),
        pushed_at: r.get(14)?,
        rating: r.get(15)?,
        pinned_comment: r.get(16)?,
        created_at: r.get(17)?,
    })
}

const TRACK_COLUMNS: &str = "id, playlist_id, title, artist, album, artwork_url, spotify_uri, \
     artist_spotify_uri, album_spotify_uri, duration_ms, status, position, \
     added_by, suggested_by, pushed_at, rating, pinned_comment, created_at";

pub fn get_track(conn: &Connection, id: &str) -> Result<Option<Track>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracks WHERE id = ?1 LIMIT 1",
        TRACK_COLUMNS
    ))?;
    let row = stmt.query_row(params![id], row_to_track).optional()?;
    Ok(row)
}

pub fn tracks_for_playlist(conn: &Connection, playlist_id: &str) -> Result<Vec<Track>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracks WHERE playlist_id = ?1 ORDER BY created_at ASC",
        TRACK_COLUMNS
    ))?;
    let rows = stmt.query_map(params![playlist_id], row_to_track)?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// All Spotify URIs known locally for this playlist, regardless of status.
/// Tracks without a URI are invisible to remote sync and excluded here.
pub fn known_uris(conn: &Connection, playlist_id: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT spotify_uri FROM tracks WHERE playlist_id = ?1 AND spotify_uri IS NOT NULL",
    )?;
    let rows = stmt.query_map(params![playlist_id], |r| r.get::<_, String>(0))?;
    let mut set = HashSet::new();
    for r in rows {
        set.insert(r?);
    }
    Ok(set)
}

/// Active tracks in position-ascending order. Gaps in `position` are
/// tolerated; the stored values decide the order.
pub fn active_tracks(conn: &Connection, playlist_id: &str) -> Result<Vec<Track>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracks WHERE playlist_id = ?1 AND status = 'active' ORDER BY position ASC",
        TRACK_COLUMNS
    ))?;
    let rows = stmt.query_map(params![playlist_id], row_to_track)?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Demote tracks that disappeared from the remote playlist: rejected, no
/// position, pushed_at cleared so a second pass has nothing left to demote.
pub fn demote_tracks(conn: &mut Connection, ids: &[String]) -> Result<()> {
    let tx = conn.transaction()?;
    for id in ids {
        tx.execute(
            "UPDATE tracks SET status = 'rejected', position = NULL, pushed_at = NULL WHERE id = ?1",
            params![id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Stamp pushed_at on every active track that has a URI, after a confirmed
/// replace of the remote playlist contents.
pub fn mark_active_pushed(conn: &Connection, playlist_id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE tracks SET pushed_at = ?2
         WHERE playlist_id = ?1 AND status = 'active' AND spotify_uri IS NOT NULL",
        params![playlist_id, now],
    )?;
    Ok(())
}

/// Status transition used by promotion/rejection flows (and tests). Keeps the
/// pushed_at invariant: leaving `active` clears the stamp.
pub fn set_track_status(
    conn: &Connection,
    track_id: &str,
    status: TrackStatus,
    position: Option<i64>,
) -> Result<()> {
    match status {
        TrackStatus::Active => conn.execute(
            "UPDATE tracks SET status = 'active', position = ?2 WHERE id = ?1",
            params![track_id, position],
        )?,
        other => conn.execute(
            "UPDATE tracks SET status = ?2, position = NULL, pushed_at = NULL WHERE id = ?1",
            params![track_id, other.as_str()],
        )?,
    };
    Ok(())
}

/// Convenience for connect/reconnect flows: build a credential row stamped now.
pub fn credential_now(
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    spotify_user_id: Option<String>,
    spotify_display_name: Option<String>,
) -> Credential {
    let now = Utc::now().timestamp();
    Credential {
        access_token,
        refresh_token,
        expires_at: now + expires_in,
        spotify_user_id,
        spotify_display_name,
        updated_at: now,
    }
}
