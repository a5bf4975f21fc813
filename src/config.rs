//! Configuration management for the Spotify dashboard.
//!
//! This module handles loading and accessing configuration values from
//! environment variables and `.env` files. The configuration system follows
//! a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! Everything is read once at startup into a [`Config`]; request handling
//! never touches the process environment.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{Error, Result};

const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_SCOPE: &str =
    "user-read-private user-top-read user-read-recently-played user-library-read";

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the necessary directory structure if it doesn't exist and loads
/// environment variables from `spotdash/.env` inside the platform-specific
/// local data directory:
/// - Linux: `~/.local/share/spotdash/.env`
/// - macOS: `~/Library/Application Support/spotdash/.env`
/// - Windows: `%LOCALAPPDATA%/spotdash/.env`
///
/// A missing file is fine: the process environment alone may carry the
/// configuration (containers, CI). A file that exists but cannot be parsed is
/// reported as [`Error::Config`].
pub async fn load_env() -> Result<()> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    if path.is_file() {
        dotenv::from_path(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    }
    Ok(())
}

/// Root of everything spotdash keeps on disk.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotdash");
    path
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub server_addr: String,
    pub spotify: SpotifySettings,
    pub session: SessionSettings,
    /// Directory holding one JSON token record per user.
    pub token_dir: PathBuf,
    /// Page size requested from the recommendation endpoint.
    pub recommend_limit: u32,
    /// Explicit release-year filter for recommendations; `None` disables it.
    pub from_year: Option<i32>,
    /// Mark cookies `Secure` (set when served over HTTPS).
    pub cookie_secure: bool,
}

/// Endpoints and client registration for the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

/// Timing knobs of the credential cache and the authorization handoff.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upper bound for how long a client handle stays cached in memory.
    pub cache_ttl_ceiling: Duration,
    /// How long a page request waits for the callback to deliver a client.
    pub handoff_timeout: Duration,
    /// How long an unclaimed pending authorization is kept before collection.
    pub pending_ttl: Duration,
    /// How often expired cache entries and pending authorizations are purged.
    pub reap_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ceiling: Duration::from_secs(60 * 60),
            handoff_timeout: Duration::from_secs(60),
            pending_ttl: Duration::from_secs(10 * 60),
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `SPOTIFY_API_AUTH_CLIENT_ID` or
    /// `SPOTIFY_API_REDIRECT_URI` is missing, or when a numeric setting
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let defaults = SessionSettings::default();

        let spotify = SpotifySettings {
            client_id: required("SPOTIFY_API_AUTH_CLIENT_ID")?,
            redirect_uri: required("SPOTIFY_API_REDIRECT_URI")?,
            scope: optional("SPOTIFY_API_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.into()),
            auth_url: optional("SPOTIFY_API_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.into()),
            token_url: optional("SPOTIFY_API_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            api_url: optional("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
        };

        let session = SessionSettings {
            cache_ttl_ceiling: seconds("SPOTDASH_CACHE_TTL_SECS")?
                .unwrap_or(defaults.cache_ttl_ceiling),
            handoff_timeout: seconds("SPOTDASH_HANDOFF_TIMEOUT_SECS")?
                .unwrap_or(defaults.handoff_timeout),
            pending_ttl: seconds("SPOTDASH_PENDING_TTL_SECS")?.unwrap_or(defaults.pending_ttl),
            reap_interval: defaults.reap_interval,
        };

        Ok(Self {
            server_addr: optional("SERVER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.into()),
            spotify,
            session,
            token_dir: optional("SPOTDASH_TOKEN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir().join("tokens")),
            recommend_limit: parsed("SPOTDASH_RECOMMEND_LIMIT")?.unwrap_or(20),
            from_year: parsed("SPOTDASH_FROM_YEAR")?,
            cookie_secure: parsed("SPOTDASH_COOKIE_SECURE")?.unwrap_or(false),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{name} must be set")))
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}

fn seconds(name: &str) -> Result<Option<Duration>> {
    Ok(parsed::<u64>(name)?.map(Duration::from_secs))
}
