use crate::config::Config;
use crate::token::TokenStore;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

/// Manual OAuth helper for connecting the admin Spotify account:
/// 1. Build the authorization URL and print it.
/// 2. Admin opens it in a browser, approves and gets redirected.
/// 3. Admin pastes the full redirect URL back into this CLI.
/// 4. The CLI extracts the `code` param and exchanges it for tokens.
/// 5. Tokens plus the account identity (from /me) are stored in the DB.
///
/// This avoids running an embedded HTTP server and works well for manual setup.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

const SCOPES: &[&str] = &[
    "playlist-modify-public",
    "playlist-modify-private",
    "playlist-read-private",
    "playlist-read-collaborative",
];

pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    use std::io;

    let client_id = cfg.client_id();
    let client_secret = cfg.client_secret();
    if client_id.is_empty() || client_secret.is_empty() {
        return Err(anyhow!(
            "missing Spotify client credentials (set spotify_client_id/spotify_client_secret in config or SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET env vars)"
        ));
    }

    let mut url = Url::parse(&format!("{}/authorize", TokenStore::auth_base()))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client_id)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("redirect_uri", &cfg.spotify_redirect_uri)
        .append_pair("show_dialog", "true");

    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing you'll be redirected. Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    let parsed = Url::parse(input).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    let code = parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_else(|| anyhow!("no code in redirect URL"))?
        .1
        .into_owned();

    // Exchange code for tokens
    let client = Client::new();
    let params = [
        ("grant_type", "authorization_code"),
        ("code", &code),
        ("redirect_uri", &cfg.spotify_redirect_uri),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret))
    );
    let resp = client
        .post(format!("{}/api/token", TokenStore::auth_base()))
        .header(AUTHORIZATION, &auth_header)
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }
    let tr: TokenResponse = resp.json().await?;
    let refresh_token = tr
        .refresh_token
        .ok_or_else(|| anyhow!("no refresh_token in token response"))?;

    // Fetch the account identity so the admin dashboard can show who is
    // connected.
    let api_base = std::env::var("SPOTIFY_API_BASE")
        .unwrap_or_else(|_| "https://api.spotify.com/v1".into());
    let me: serde_json::Value = client
        .get(format!("{}/me", api_base))
        .header(AUTHORIZATION, format!("Bearer {}", tr.access_token))
        .send()
        .await?
        .json()
        .await?;
    let user_id = me["id"].as_str().map(|s| s.to_string());
    let display_name = me["display_name"].as_str().map(|s| s.to_string());

    let store = TokenStore::new(client_id, client_secret, cfg.db_path.clone());
    store
        .save_credential(tr.access_token, refresh_token, tr.expires_in, user_id, display_name)
        .await?;

    info!("Spotify account connected and tokens saved");
    println!("Saved tokens to DB. Playlist sync is now enabled.");
    Ok(())
}
