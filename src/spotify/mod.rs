//! # Spotify Integration Module
//!
//! This module defines how the dashboard talks to the music service. The
//! [`MusicService`] trait is the seam: the session layer and the
//! recommendation engine only ever see the trait, so the real Web API client
//! ([`SpotifyClient`]) can be swapped for a scripted one in tests.
//!
//! ## Architecture
//!
//! ```text
//! Session / Engine Layer
//!          ↓
//! MusicService trait
//!     ├── Authorization (PKCE code exchange, refresh)
//!     ├── Catalog lookups (tracks, audio features)
//!     ├── Listening data (recently played, top tracks/artists)
//!     └── Recommendations
//!          ↓
//! HTTP Layer (reqwest, JSON)
//!          ↓
//! Spotify Web API
//! ```
//!
//! ## Client handles
//!
//! A [`ClientHandle`] is the authenticated handle handed out by the session
//! layer. It is cheap to clone and immutable: a refreshed credential produces
//! a new handle rather than altering the existing one.
//!
//! ## Batch limits
//!
//! Catalog lookups accept at most [`TRACKS_BATCH_SIZE`] track IDs and
//! [`AUDIO_FEATURES_BATCH_SIZE`] audio-feature IDs per call. Callers that
//! hold longer lists go through [`crate::engine::BatchFetcher`].

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    Result,
    engine::TrackAttributeProfile,
    types::{Artist, AudioFeatures, Credential, HistoryPage, Track, UserIdentity},
};

pub mod auth;
pub mod client;

pub use client::SpotifyClient;

/// Maximum number of IDs accepted by one track lookup.
pub const TRACKS_BATCH_SIZE: usize = 50;
/// Maximum number of IDs accepted by one audio-feature lookup.
pub const AUDIO_FEATURES_BATCH_SIZE: usize = 100;

/// Authenticated handle used to issue calls on a user's behalf.
#[derive(Clone)]
pub struct ClientHandle {
    credential: Arc<Credential>,
}

impl ClientHandle {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Arc::new(credential),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn access_token(&self) -> &str {
        &self.credential.access_token
    }

    /// True when both handles are the same handle (not merely equal tokens).
    pub fn ptr_eq(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.credential, &other.credential)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("expires_at", &self.credential.expires_at)
            .finish()
    }
}

/// Seed identifiers of a recommendation request. Tracks and artists are
/// never mixed in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seeds {
    Tracks(Vec<String>),
    Artists(Vec<String>),
}

impl Seeds {
    pub fn ids(&self) -> &[String] {
        match self {
            Seeds::Tracks(ids) | Seeds::Artists(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Same kind of seeds, keeping only the first `n` identifiers.
    pub fn truncated(&self, n: usize) -> Seeds {
        let keep = |ids: &Vec<String>| ids.iter().take(n).cloned().collect();
        match self {
            Seeds::Tracks(ids) => Seeds::Tracks(keep(ids)),
            Seeds::Artists(ids) => Seeds::Artists(keep(ids)),
        }
    }
}

/// Input to the recommendation endpoint.
#[derive(Debug, Clone)]
pub struct RecommendationSeed {
    pub seeds: Seeds,
    pub attributes: TrackAttributeProfile,
}

/// Request options for the recommendation endpoint.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Number of tracks to ask for.
    pub limit: u32,
    /// Market (ISO country code) to restrict playable tracks to.
    pub country: Option<String>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            country: None,
        }
    }
}

/// Everything the dashboard core needs from the music service.
///
/// Implementations surface failures as typed [`crate::Error`] values and
/// never retry beyond what the transport itself does for transient errors.
#[async_trait]
pub trait MusicService: Send + Sync {
    /// URL of the authorization page; `state` is echoed back on the callback.
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchanges an authorization code (plus PKCE verifier) for a credential.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Credential>;

    /// Obtains a fresh credential using the refresh token of `credential`.
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Builds an authenticated handle from a credential.
    fn new_client(&self, credential: Credential) -> ClientHandle {
        ClientHandle::new(credential)
    }

    async fn current_user(&self, client: &ClientHandle) -> Result<UserIdentity>;

    /// Looks up at most [`TRACKS_BATCH_SIZE`] tracks, in request order.
    async fn lookup_tracks(&self, client: &ClientHandle, ids: &[String]) -> Result<Vec<Track>>;

    /// Looks up at most [`AUDIO_FEATURES_BATCH_SIZE`] feature vectors, in
    /// request order.
    async fn lookup_audio_features(
        &self,
        client: &ClientHandle,
        ids: &[String],
    ) -> Result<Vec<AudioFeatures>>;

    /// Returns one page of recommendations for the seed.
    async fn recommend(
        &self,
        client: &ClientHandle,
        seed: &RecommendationSeed,
        options: &RecommendOptions,
    ) -> Result<Vec<Track>>;

    /// Listening history, newest first, strictly before `before` (ms) if given.
    async fn recently_played(
        &self,
        client: &ClientHandle,
        limit: u32,
        before: Option<i64>,
    ) -> Result<HistoryPage>;

    async fn top_tracks(&self, client: &ClientHandle, limit: u32) -> Result<Vec<Track>>;

    async fn top_artists(&self, client: &ClientHandle, limit: u32) -> Result<Vec<Artist>>;
}
