//! # Recommendation Engine
//!
//! Computes a [`TrackAttributeProfile`] from the audio features of a track
//! set and asks the music service for one page of recommendations seeded by
//! up to [`MAX_SEEDS`] tracks or artists.
//!
//! ```text
//! track set ──► BatchFetcher (audio features) ──► means ──► as_attribute windows
//!                                                               │
//! seed IDs ──► dedupe, first four ──────────────────────────────┤
//!                                                               ▼
//!                                   MusicService::recommend (one page)
//!                                                               │
//!                                       optional ReleaseYearFilter (explicit)
//! ```
//!
//! All lookups go through the caller's [`ClientHandle`]; dropping the returned
//! future cancels the outstanding request.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    Error, Result,
    spotify::{ClientHandle, MusicService, RecommendOptions, RecommendationSeed, Seeds},
    types::{Track, ids_of},
    utils,
};

mod attributes;
mod batch;

pub use attributes::{AttributeRange, BoundKind, TrackAttributeProfile, as_attribute};
pub use batch::{BatchFetcher, fetch_chunked};

/// Most seed identifiers sent with one recommendation request.
pub const MAX_SEEDS: usize = 4;

const RECENT_TRACKS_LIMIT: u32 = 50;
const TOP_ARTISTS_LIMIT: u32 = 5;
const TOP_TRACKS_LIMIT: u32 = 20;

/// Keeps only tracks released in or after `from_year`.
///
/// Tracks whose release date cannot be read are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseYearFilter {
    pub from_year: i32,
}

impl ReleaseYearFilter {
    pub fn keeps(&self, track: &Track) -> bool {
        track
            .release_year()
            .is_none_or(|year| year >= self.from_year)
    }
}

pub struct RecommendationEngine {
    service: Arc<dyn MusicService>,
    options: RecommendOptions,
    release_filter: Option<ReleaseYearFilter>,
}

impl RecommendationEngine {
    pub fn new(service: Arc<dyn MusicService>, options: RecommendOptions) -> Self {
        Self {
            service,
            options,
            release_filter: None,
        }
    }

    /// Applies `filter` to every page this engine returns. Without it pages
    /// are returned verbatim.
    pub fn with_release_filter(mut self, filter: Option<ReleaseYearFilter>) -> Self {
        self.release_filter = filter;
        self
    }

    /// Recommendations shaped like `track_set`, seeded by the given tracks.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientSeeds`] when `seed_ids` holds no usable ID; the
    ///   service is not called in that case
    /// - [`Error::EmptyTrackSet`] when `track_set` is empty
    /// - any lookup failure of the service, unchanged
    pub async fn recommend(
        &self,
        client: &ClientHandle,
        track_set: &[Track],
        seed_ids: &[String],
    ) -> Result<Vec<Track>> {
        self.recommend_with(client, track_set, Seeds::Tracks(seed_ids.to_vec()))
            .await
    }

    /// Like [`recommend`](Self::recommend) but with explicit seed kind.
    pub async fn recommend_with(
        &self,
        client: &ClientHandle,
        track_set: &[Track],
        seeds: Seeds,
    ) -> Result<Vec<Track>> {
        let seeds = prepare_seeds(seeds)?;
        let attributes = self.profile(client, track_set).await?;
        self.fetch_page(client, RecommendationSeed { seeds, attributes })
            .await
    }

    /// Audio-feature profile of `track_set`.
    pub async fn profile(
        &self,
        client: &ClientHandle,
        track_set: &[Track],
    ) -> Result<TrackAttributeProfile> {
        if track_set.is_empty() {
            return Err(Error::EmptyTrackSet);
        }
        let ids = ids_of(track_set);
        let features = BatchFetcher::new(self.service.as_ref(), client)
            .fetch_audio_features(&ids)
            .await?;
        TrackAttributeProfile::from_features(&features)
    }

    /// Recommendations based on the user's recent listening: the profile of
    /// the recently played tracks, seeded by the four most recent of them.
    pub async fn recommend_from_recent(&self, client: &ClientHandle) -> Result<Vec<Track>> {
        let page = self
            .service
            .recently_played(client, RECENT_TRACKS_LIMIT, None)
            .await?;
        let played = utils::normalize_recently_played(page.items);

        let mut tracks: Vec<Track> = Vec::with_capacity(played.len());
        for item in played {
            if !tracks.iter().any(|t| t.id == item.track.id) {
                tracks.push(item.track);
            }
        }

        let seed_ids = ids_of(&tracks);
        debug!(tracks = tracks.len(), "recommending from recent history");
        self.recommend(client, &tracks, &seed_ids).await
    }

    /// Recommendations based on the user's top artists: one page per artist,
    /// all shaped by the profile of the user's top tracks.
    pub async fn recommend_from_top(&self, client: &ClientHandle) -> Result<Vec<Track>> {
        let artists = self.service.top_artists(client, TOP_ARTISTS_LIMIT).await?;
        if artists.is_empty() {
            return Err(Error::InsufficientSeeds);
        }
        let top_tracks = self.service.top_tracks(client, TOP_TRACKS_LIMIT).await?;
        let attributes = self.profile(client, &top_tracks).await?;

        let mut tracks = Vec::new();
        for artist in artists {
            let seed = RecommendationSeed {
                seeds: Seeds::Artists(vec![artist.id.clone()]),
                attributes,
            };
            let page = self.fetch_page(client, seed).await?;
            info!(artist = %artist.name, count = page.len(), "recommendations seeded by artist");
            tracks.extend(page);
        }

        Ok(tracks)
    }

    async fn fetch_page(
        &self,
        client: &ClientHandle,
        seed: RecommendationSeed,
    ) -> Result<Vec<Track>> {
        let page = self.service.recommend(client, &seed, &self.options).await?;

        Ok(match self.release_filter {
            Some(filter) => page.into_iter().filter(|t| filter.keeps(t)).collect(),
            None => page,
        })
    }
}

/// Dedupes seed IDs (first occurrence wins), drops empty ones and keeps at
/// most [`MAX_SEEDS`]. Fewer seeds than that are fine; none is an error.
pub fn prepare_seeds(seeds: Seeds) -> Result<Seeds> {
    let unique = match &seeds {
        Seeds::Tracks(ids) => Seeds::Tracks(utils::unique_ids(ids.iter().cloned())),
        Seeds::Artists(ids) => Seeds::Artists(utils::unique_ids(ids.iter().cloned())),
    };

    if unique.is_empty() {
        return Err(Error::InsufficientSeeds);
    }
    Ok(unique.truncated(MAX_SEEDS))
}
