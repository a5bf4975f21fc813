use std::{collections::BTreeSet, fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer/refresh token pair with an absolute expiry and the granted scopes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub scope: BTreeSet<String>,
}

impl Credential {
    /// Builds a credential from a token grant that is valid for `expires_in`
    /// seconds starting now. `scope` is the space-separated list the
    /// authorization server returned.
    pub fn from_grant(
        access_token: String,
        refresh_token: String,
        expires_in: u64,
        scope: &str,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now().timestamp() + expires_in as i64,
            scope: scope.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        let left = self.expires_at - Utc::now().timestamp();
        Duration::from_secs(left.max(0) as u64)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }

    /// True when the token expires within `margin` from now (or already has).
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now().timestamp() + margin.as_secs() as i64 >= self.expires_at
    }
}

// tokens stay out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Opaque identifier minted when authorization starts. It is the OAuth
/// `state`, the cache key and the correlation key of the pending handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Anything the music service identifies by an ID.
pub trait HasId {
    fn id(&self) -> &str;
}

/// Collects the IDs of `items`, in order.
pub fn ids_of<T: HasId>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub album: SimpleAlbum,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub duration_ms: u32,
}

impl Track {
    /// Artist names joined with `separator`.
    pub fn artist_names(&self, separator: &str) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Release year of the track's album, if the date can be read.
    pub fn release_year(&self) -> Option<i32> {
        self.album.release_date.get(..4)?.parse().ok()
    }
}

impl HasId for Track {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleArtist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

impl HasId for SimpleArtist {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleAlbum {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: String,
}

impl HasId for SimpleAlbum {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
}

impl HasId for Artist {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Audio features of a single track, as reported by the music service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    #[serde(default)]
    pub acousticness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
    #[serde(default)]
    pub liveness: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub valence: f64,
    #[serde(default)]
    pub danceability: f64,
    #[serde(default)]
    pub speechiness: f64,
    #[serde(default)]
    pub loudness: f64,
    #[serde(default)]
    pub tempo: f64,
}

impl HasId for AudioFeatures {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The account a client handle acts for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// One entry of the user's listening history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayedItem {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

/// A page of listening history, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub items: Vec<PlayedItem>,
    /// Millisecond timestamp to continue from, when more history exists.
    pub next_before: Option<i64>,
}
