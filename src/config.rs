use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Interval between periodic full syncs, in seconds.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Maximum URIs per add/remove/replace request (Spotify caps at 100).
    #[serde(default = "default_max_batch")]
    pub max_batch_size: usize,

    /// OAuth client credentials. Empty values fall back to the
    /// SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET environment variables.
    #[serde(default)]
    pub spotify_client_id: String,
    #[serde(default)]
    pub spotify_client_secret: String,

    #[serde(default = "default_redirect_uri")]
    pub spotify_redirect_uri: String,
}

fn default_db_path() -> PathBuf { "/var/lib/wedding-playlist/sync.db".into() }
fn default_log_dir() -> PathBuf { "/var/log/wedding-playlist".into() }
fn default_sync_interval() -> u64 { 600 }
fn default_max_batch() -> usize { 100 }
fn default_redirect_uri() -> String { "http://127.0.0.1:3000/api/auth/spotify/callback".into() }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Client id with env fallback.
    pub fn client_id(&self) -> String {
        if self.spotify_client_id.is_empty() {
            std::env::var("SPOTIFY_CLIENT_ID").unwrap_or_default()
        } else {
            self.spotify_client_id.clone()
        }
    }

    /// Client secret with env fallback.
    pub fn client_secret(&self) -> String {
        if self.spotify_client_secret.is_empty() {
            std::env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default()
        } else {
            self.spotify_client_secret.clone()
        }
    }
}
