use thiserror::Error;

/// Typed failure conditions callers may need to branch on. Everything else
/// travels as a plain `anyhow::Error` with context.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No credential stored: the admin has not connected Spotify. A normal
    /// unconfigured state until an operation actually needs a token.
    #[error("Spotify not connected; admin must authenticate first")]
    NotConnected,

    /// Non-2xx response from the Spotify API.
    #[error("Spotify API error: {status} on {endpoint}")]
    Api { status: u16, endpoint: String },

    /// The playlist exists locally but has no linked Spotify playlist.
    #[error("playlist {0} is not linked to a Spotify playlist")]
    NotLinked(String),
}
