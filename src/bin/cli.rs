use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use wedding_playlist_sync as lib;

use lib::api::spotify::SpotifyClient;
use lib::config::Config;
use lib::sync::SyncEngine;
use lib::token::TokenStore;

#[derive(Parser)]
#[command(name = "wedding-playlist-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic sync service (long-running)
    Sync,
    /// Run one full sync pass over all linked playlists and exit
    SyncOnce,
    /// Sync a single playlist on demand
    SyncOne {
        /// Local playlist id
        playlist_id: String,
    },
    /// Push the local active list of a playlist to Spotify
    Push {
        /// Local playlist id
        playlist_id: String,
    },
    /// Auth helpers
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
    /// Disconnect the stored Spotify account
    Disconnect,
    /// Show Spotify connection status
    Status,
    /// Validate config file and exit
    ConfigValidate,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Authorize Spotify and store tokens in DB (interactive)
    Spotify,
}

fn build_engine(cfg: &Config) -> Arc<SyncEngine> {
    let tokens = TokenStore::new(cfg.client_id(), cfg.client_secret(), cfg.db_path.clone());
    let api = Arc::new(SpotifyClient::new(tokens, cfg.max_batch_size));
    Arc::new(SyncEngine::new(api, cfg.db_path.clone()))
}

async fn ensure_db(cfg: &Config) -> Result<()> {
    let db_path = cfg.db_path.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        lib::db::open_or_create(&db_path)
            .with_context(|| format!("opening DB at {}", db_path.display()))?;
        Ok(())
    })
    .await?
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer the
    // system-wide config and fall back to the repository example config for
    // local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/wedding-playlist/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "wedding-playlist-sync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command {
        Commands::Sync => {
            ensure_db(&cfg).await?;
            let engine = build_engine(&cfg);
            let interval = Duration::from_secs(cfg.sync_interval_secs);
            tokio::select! {
                _ = lib::scheduler::start_periodic_sync(engine, interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down periodic sync");
                }
            }
        }
        Commands::SyncOnce => {
            ensure_db(&cfg).await?;
            let engine = build_engine(&cfg);
            lib::scheduler::run_full_sync(&engine)
                .await
                .with_context(|| "running full sync".to_string())?;
        }
        Commands::SyncOne { playlist_id } => {
            ensure_db(&cfg).await?;
            let engine = build_engine(&cfg);
            if let Err(e) = lib::scheduler::sync_one(&engine, &playlist_id).await {
                eprintln!("Sync failed: {:#}", e);
                std::process::exit(1);
            }
            println!("Playlist {} synced.", playlist_id);
        }
        Commands::Push { playlist_id } => {
            ensure_db(&cfg).await?;
            let engine = build_engine(&cfg);
            let playlist = engine
                .get_playlist(&playlist_id)
                .await?
                .with_context(|| format!("unknown playlist {}", playlist_id))?;
            let spotify_id = playlist
                .spotify_id
                .with_context(|| format!("playlist {} is not linked to Spotify", playlist_id))?;
            if let Err(e) = engine.push_to_remote(&playlist_id, &spotify_id).await {
                eprintln!("Push failed: {:#}", e);
                std::process::exit(1);
            }
            println!("Playlist {} pushed to Spotify.", playlist_id);
        }
        Commands::Auth { sub } => match sub {
            AuthCommands::Spotify => {
                ensure_db(&cfg).await?;
                lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
            }
        },
        Commands::Disconnect => {
            ensure_db(&cfg).await?;
            let tokens = TokenStore::new(cfg.client_id(), cfg.client_secret(), cfg.db_path.clone());
            tokens.clear_credential().await?;
            println!("Spotify account disconnected.");
        }
        Commands::Status => {
            ensure_db(&cfg).await?;
            let tokens = TokenStore::new(cfg.client_id(), cfg.client_secret(), cfg.db_path.clone());
            match tokens.connection_status().await? {
                Some(cred) => {
                    println!("Spotify: connected");
                    if let Some(name) = cred.spotify_display_name {
                        println!("  account: {}", name);
                    }
                    if let Some(id) = cred.spotify_user_id {
                        println!("  user id: {}", id);
                    }
                    println!("  token expires at: {}", cred.expires_at);
                }
                None => {
                    println!("Spotify: not connected");
                }
            }
        }
        Commands::ConfigValidate => match Config::from_path(resolved_config_path.as_path()) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
    }

    Ok(())
}
