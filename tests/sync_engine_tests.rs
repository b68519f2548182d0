use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use wedding_playlist_sync as lib;

use lib::api::mock::MockPlaylistApi;
use lib::db;
use lib::models::{Actor, Playlist, Track, TrackStatus};
use lib::sync::SyncEngine;

const PLAYLIST: &str = "p1";
const REMOTE: &str = "sp1";

fn setup_db() -> (TempDir, PathBuf) {
    let td = tempdir().expect("tmpdir");
    let db_path = td.path().join("sync.db");
    let conn = db::open_or_create(&db_path).expect("open db");
    db::insert_playlist(
        &conn,
        &Playlist {
            id: PLAYLIST.into(),
            title: "Our Wedding".into(),
            spotify_id: Some(REMOTE.into()),
            spotify_title: None,
            description: None,
            cover_url: None,
            sync_timestamp: None,
        },
    )
    .expect("insert playlist");
    (td, db_path)
}

fn active_track(id: &str, uri: Option<&str>, position: i64, pushed_at: Option<i64>) -> Track {
    Track {
        id: id.into(),
        playlist_id: PLAYLIST.into(),
        title: format!("Track {}", id),
        artist: "Artist".into(),
        album: None,
        artwork_url: None,
        spotify_uri: uri.map(|s| s.to_string()),
        artist_spotify_uri: None,
        album_spotify_uri: None,
        duration_ms: Some(200_000),
        status: TrackStatus::Active,
        position: Some(position),
        added_by: Some(Actor::User("u1".into())),
        suggested_by: None,
        pushed_at,
        rating: None,
        pinned_comment: None,
        created_at: Utc::now().timestamp(),
    }
}

fn insert(db_path: &Path, track: &Track) {
    let conn = rusqlite::Connection::open(db_path).expect("open");
    db::insert_track(&conn, track).expect("insert track");
}

fn remote_obj(uri: &str) -> serde_json::Value {
    json!({
        "uri": uri,
        "name": format!("Remote {}", uri),
        "artists": [ { "name": "Remote Artist", "uri": "spotify:artist:r" } ],
        "album": { "name": "Remote Album", "uri": "spotify:album:r", "images": [ { "url": "https://img.example/r.jpg" } ] },
        "duration_ms": 180_000
    })
}

fn engine(api: Arc<MockPlaylistApi>, db_path: &Path) -> SyncEngine {
    SyncEngine::new(api, db_path.to_path_buf())
}

#[test]
fn new_remote_item_becomes_suggestion_and_leaves_remote() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_items(REMOTE, vec![remote_obj("spotify:track:3")]).await;
        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let tracks = db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks");
        assert_eq!(tracks.len(), 1);
        let t = &tracks[0];
        assert_eq!(t.status, TrackStatus::Suggested);
        assert_eq!(t.position, None);
        assert_eq!(t.spotify_uri.as_deref(), Some("spotify:track:3"));
        assert_eq!(t.suggested_by, Some(Actor::System));
        assert_eq!(t.title, "Remote spotify:track:3");
        assert_eq!(t.pushed_at, None);

        // Consumed into the local inbox: no longer on the remote list.
        assert!(api.uris(REMOTE).await.is_empty());

        let pl = db::get_playlist(&conn, PLAYLIST).expect("get").expect("row");
        assert!(pl.sync_timestamp.is_some());
    });
}

#[test]
fn pull_and_merge_is_idempotent() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("a", Some("spotify:track:1"), 1, Some(1_000)));
    insert(&db_path, &active_track("b", Some("spotify:track:2"), 2, Some(1_000)));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_items(
            REMOTE,
            vec![remote_obj("spotify:track:2"), remote_obj("spotify:track:3")],
        )
        .await;

        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("first pull");

        let snapshot = |conn: &rusqlite::Connection| {
            db::tracks_for_playlist(conn, PLAYLIST)
                .expect("tracks")
                .into_iter()
                .map(|t| (t.id, t.status.as_str(), t.position, t.spotify_uri))
                .collect::<Vec<_>>()
        };
        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let after_first = snapshot(&conn);
        let remote_first = api.uris(REMOTE).await;

        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("second pull");
        let after_second = snapshot(&conn);
        let remote_second = api.uris(REMOTE).await;

        assert_eq!(after_first, after_second, "local state must not drift");
        assert_eq!(remote_first, remote_second, "remote state must not drift");
        // No duplicate suggestion for track 3.
        let suggested = after_second
            .iter()
            .filter(|(_, s, _, _)| *s == "suggested")
            .count();
        assert_eq!(suggested, 1);
    });
}

#[test]
fn pushed_track_missing_remotely_is_demoted() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("a", Some("spotify:track:x"), 1, Some(1_000)));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_items(REMOTE, vec![]).await;
        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let t = db::get_track(&conn, "a").expect("get").expect("row");
        assert_eq!(t.status, TrackStatus::Rejected);
        assert_eq!(t.position, None);
        assert_eq!(t.pushed_at, None);
    });
}

#[test]
fn unpushed_track_missing_remotely_is_not_demoted() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    // Never pushed: absence from the remote list is expected, not a deletion.
    insert(&db_path, &active_track("c", Some("spotify:track:z"), 1, None));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_items(REMOTE, vec![]).await;
        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let t = db::get_track(&conn, "c").expect("get").expect("row");
        assert_eq!(t.status, TrackStatus::Active);
        assert_eq!(t.position, Some(1));
        // The pass pushed it, so it is confirmed remote now.
        assert!(t.pushed_at.is_some());
        assert_eq!(api.uris(REMOTE).await, vec!["spotify:track:z".to_string()]);
    });
}

#[test]
fn pushed_track_is_not_reimported_on_pull() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("a", Some("spotify:track:1"), 1, None));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        eng.push_to_remote(PLAYLIST, REMOTE).await.expect("push");
        assert_eq!(api.uris(REMOTE).await, vec!["spotify:track:1".to_string()]);

        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let tracks = db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks");
        assert_eq!(tracks.len(), 1, "known URI must not come back as a suggestion");
        assert_eq!(tracks[0].status, TrackStatus::Active);
    });
}

#[test]
fn push_asserts_position_order_with_gaps() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("a", Some("spotify:track:late"), 9, None));
    insert(&db_path, &active_track("b", Some("spotify:track:first"), 2, None));
    insert(&db_path, &active_track("c", Some("spotify:track:mid"), 5, None));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        eng.push_to_remote(PLAYLIST, REMOTE).await.expect("push");
        assert_eq!(
            api.uris(REMOTE).await,
            vec![
                "spotify:track:first".to_string(),
                "spotify:track:mid".to_string(),
                "spotify:track:late".to_string()
            ]
        );

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        for id in ["a", "b", "c"] {
            let t = db::get_track(&conn, id).expect("get").expect("row");
            assert!(t.pushed_at.is_some(), "pushed_at stamped after confirmed push");
        }
        let pl = db::get_playlist(&conn, PLAYLIST).expect("get").expect("row");
        assert!(pl.sync_timestamp.is_some());
    });
}

#[test]
fn track_without_uri_is_invisible_to_sync() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("manual", None, 1, None));
    insert(&db_path, &active_track("a", Some("spotify:track:1"), 2, None));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        assert_eq!(api.uris(REMOTE).await, vec!["spotify:track:1".to_string()]);
        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let manual = db::get_track(&conn, "manual").expect("get").expect("row");
        assert_eq!(manual.status, TrackStatus::Active);
        assert_eq!(manual.pushed_at, None, "a track with no URI can never be pushed");
    });
}

#[test]
fn metadata_is_mirrored_without_touching_local_title() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_meta(
            REMOTE,
            lib::models::PlaylistMeta {
                name: "Remote Name".into(),
                description: Some("Remote description".into()),
                cover_url: Some("https://img.example/c.jpg".into()),
            },
        )
        .await;
        eng.sync_metadata_only(PLAYLIST, REMOTE).await.expect("meta sync");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let pl = db::get_playlist(&conn, PLAYLIST).expect("get").expect("row");
        assert_eq!(pl.title, "Our Wedding");
        assert_eq!(pl.spotify_title.as_deref(), Some("Remote Name"));
        assert_eq!(pl.description.as_deref(), Some("Remote description"));
        assert_eq!(pl.cover_url.as_deref(), Some("https://img.example/c.jpg"));
        // Metadata-only sync must not create tracks or stamp sync_timestamp.
        assert!(db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks").is_empty());
        assert_eq!(pl.sync_timestamp, None);
    });
}

#[test]
fn metadata_failure_does_not_abort_track_reconciliation() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.fail_meta(REMOTE).await;
        api.set_items(REMOTE, vec![remote_obj("spotify:track:3")]).await;

        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull succeeds anyway");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let tracks = db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks");
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].status, TrackStatus::Suggested);
    });
}

#[test]
fn failed_consume_removal_does_not_roll_back_suggestion() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.fail_remove(REMOTE).await;
        api.set_items(REMOTE, vec![remote_obj("spotify:track:3")]).await;

        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull succeeds anyway");

        let conn = rusqlite::Connection::open(&db_path).expect("open");
        let tracks = db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks");
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].status, TrackStatus::Suggested);
        // The replace step still re-asserted the (empty) active list, so the
        // consumed item is gone from the remote despite the failed removal.
        assert!(api.uris(REMOTE).await.is_empty());
    });
}

// The concrete end-to-end scenario: local [A(uri 1, pos 1), B(uri 2, pos 2)]
// both pushed; remote [uri 2, uri 3].
#[test]
fn mixed_scenario_converges() {
    let (_td, db_path) = setup_db();
    let api = Arc::new(MockPlaylistApi::new());
    let eng = engine(api.clone(), &db_path);

    insert(&db_path, &active_track("a", Some("spotify:track:1"), 1, Some(1_000)));
    insert(&db_path, &active_track("b", Some("spotify:track:2"), 2, Some(1_000)));

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        api.set_items(
            REMOTE,
            vec![remote_obj("spotify:track:2"), remote_obj("spotify:track:3")],
        )
        .await;
        eng.pull_and_merge(PLAYLIST, REMOTE).await.expect("pull");

        let conn = rusqlite::Connection::open(&db_path).expect("open");

        // A was deleted remotely -> demoted.
        let a = db::get_track(&conn, "a").expect("get").expect("row");
        assert_eq!(a.status, TrackStatus::Rejected);
        assert_eq!(a.position, None);
        assert_eq!(a.pushed_at, None);

        // B stays active and confirmed.
        let b = db::get_track(&conn, "b").expect("get").expect("row");
        assert_eq!(b.status, TrackStatus::Active);
        assert!(b.pushed_at.is_some());

        // uri 3 was consumed into a suggestion.
        let tracks = db::tracks_for_playlist(&conn, PLAYLIST).expect("tracks");
        let suggested: Vec<_> = tracks
            .iter()
            .filter(|t| t.status == TrackStatus::Suggested)
            .collect();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].spotify_uri.as_deref(), Some("spotify:track:3"));

        // Remote ends up with exactly the surviving active list.
        assert_eq!(api.uris(REMOTE).await, vec!["spotify:track:2".to_string()]);
    });
}
