use crate::db;
use crate::models::Credential;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, info};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::env;
use std::path::PathBuf;

/// Tokens are considered expired this many seconds before their actual
/// expiry, so a request never starts with a token about to lapse mid-flight.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// DB-backed store for the single admin OAuth credential.
///
/// "Not connected" (no stored row) is a normal state and surfaces as
/// `Ok(None)`; a failed refresh-token exchange is an operational fault and
/// surfaces as `Err`. The refresh is not mutex-guarded: a concurrent duplicate
/// refresh is wasteful but harmless, since whichever result persists last wins.
pub struct TokenStore {
    client: Client,
    client_id: String,
    client_secret: String,
    db_path: PathBuf,
}

impl TokenStore {
    pub fn new(client_id: String, client_secret: String, db_path: PathBuf) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            db_path,
        }
    }

    /// Auth endpoint base, overridable for tests.
    pub fn auth_base() -> String {
        env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
    }

    async fn load(&self) -> Result<Option<Credential>> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<Credential>> {
            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("opening DB at {}", db_path.display()))?;
            db::load_credential(&conn)
        })
        .await?
    }

    async fn persist(&self, cred: Credential) -> Result<()> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("opening DB at {}", db_path.display()))?;
            db::save_credential(&conn, &cred)
        })
        .await?
    }

    /// Return a currently-valid access token, refreshing transparently when
    /// the stored one is within the expiry buffer. `Ok(None)` means Spotify
    /// has never been connected.
    pub async fn get_valid_access_token(&self) -> Result<Option<String>> {
        let cred = match self.load().await? {
            Some(c) => c,
            None => return Ok(None),
        };

        let now = Utc::now().timestamp();
        if cred.expires_at - EXPIRY_BUFFER_SECS > now {
            return Ok(Some(cred.access_token));
        }

        debug!("Spotify access token at/near expiry, refreshing");
        let refreshed = self.refresh(cred).await?;
        Ok(Some(refreshed))
    }

    /// Exchange the stored refresh token for a new access token and persist
    /// the result. Spotify may rotate the refresh token; when the response
    /// omits one, the old refresh token stays in force.
    async fn refresh(&self, cred: Credential) -> Result<String> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", cred.refresh_token.as_str()),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let url = format!("{}/api/token", Self::auth_base());
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to refresh token: {} - {}", status, body));
        }
        let j: serde_json::Value = resp.json().await?;
        let access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no access_token in refresh response"))?
            .to_string();
        let expires_in = j["expires_in"].as_i64().unwrap_or(3600);
        let new_refresh = j["refresh_token"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or(cred.refresh_token);

        let now = Utc::now().timestamp();
        let updated = Credential {
            access_token: access_token.clone(),
            refresh_token: new_refresh,
            expires_at: now + expires_in,
            spotify_user_id: cred.spotify_user_id,
            spotify_display_name: cred.spotify_display_name,
            updated_at: now,
        };
        self.persist(updated).await?;
        info!("Spotify token refreshed");
        Ok(access_token)
    }

    /// Upsert the singleton credential row (OAuth connect/reconnect flow).
    pub async fn save_credential(
        &self,
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        spotify_user_id: Option<String>,
        spotify_display_name: Option<String>,
    ) -> Result<()> {
        let cred = db::credential_now(
            access_token,
            refresh_token,
            expires_in,
            spotify_user_id,
            spotify_display_name,
        );
        self.persist(cred).await?;
        info!("Spotify credential saved");
        Ok(())
    }

    /// Delete the stored credential (disconnect).
    pub async fn clear_credential(&self) -> Result<()> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("opening DB at {}", db_path.display()))?;
            db::clear_credential(&conn)
        })
        .await??;
        info!("Spotify credential cleared");
        Ok(())
    }

    /// Stored account identity and expiry, for status display. Does not
    /// refresh anything.
    pub async fn connection_status(&self) -> Result<Option<Credential>> {
        self.load().await
    }
}
