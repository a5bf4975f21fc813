use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{
    AUDIO_FEATURES_BATCH_SIZE, ClientHandle, MusicService, RecommendOptions, RecommendationSeed,
    Seeds, TRACKS_BATCH_SIZE, auth,
};
use crate::{
    Error, Result,
    config::SpotifySettings,
    types::{Artist, AudioFeatures, Credential, HistoryPage, PlayedItem, Track, UserIdentity},
};

/// Attempts made for a request that keeps failing with 502 Bad Gateway.
const BAD_GATEWAY_ATTEMPTS: u32 = 3;
const BAD_GATEWAY_PAUSE: Duration = Duration::from_secs(2);

/// Spotify Web API client.
///
/// Holds one connection pool for all users; the user is selected per call by
/// the [`ClientHandle`] passed in.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    settings: SpotifySettings,
}

impl SpotifyClient {
    pub fn new(settings: SpotifySettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &ClientHandle,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.settings.api_url, path);
        let mut attempt = 1;

        loop {
            let response = self
                .http
                .get(&url)
                .query(query)
                .bearer_auth(client.access_token())
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json::<T>().await?);
            }

            match status {
                StatusCode::BAD_GATEWAY if attempt < BAD_GATEWAY_ATTEMPTS => {
                    warn!(path, attempt, "bad gateway from music service, retrying");
                    attempt += 1;
                    sleep(BAD_GATEWAY_PAUSE).await;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    return Err(Error::RateLimited { retry_after });
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(Error::Authorization(
                        "access token rejected by the music service".into(),
                    ));
                }
                _ => {
                    let message = response.text().await.unwrap_or_default();
                    return Err(Error::Service {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct TracksResponse {
    tracks: Vec<Option<Track>>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<Track>,
}

#[derive(Deserialize)]
struct PagingResponse<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct RecentlyPlayedResponse {
    items: Vec<PlayedItem>,
    #[serde(default)]
    cursors: Option<RecentlyPlayedCursors>,
}

#[derive(Deserialize)]
struct RecentlyPlayedCursors {
    #[serde(default)]
    before: Option<String>,
}

/// Query parameters of a recommendation request: seeds, the ten attribute
/// bounds, limit and optional market.
pub fn recommendation_query(
    seed: &RecommendationSeed,
    options: &RecommendOptions,
) -> Vec<(String, String)> {
    let mut query = Vec::with_capacity(14);

    match &seed.seeds {
        Seeds::Tracks(ids) => query.push(("seed_tracks".to_string(), ids.join(","))),
        Seeds::Artists(ids) => query.push(("seed_artists".to_string(), ids.join(","))),
    }

    for (name, range) in seed.attributes.ranges() {
        query.push((format!("min_{name}"), format!("{:.3}", range.min)));
        query.push((format!("max_{name}"), format!("{:.3}", range.max)));
    }

    query.push(("limit".to_string(), options.limit.to_string()));
    if let Some(country) = &options.country {
        query.push(("market".to_string(), country.clone()));
    }

    query
}

fn ids_query(ids: &[String]) -> Vec<(String, String)> {
    vec![("ids".to_string(), ids.join(","))]
}

#[async_trait]
impl MusicService for SpotifyClient {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        auth::authorize_url(&self.settings, state, code_challenge)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Credential> {
        auth::exchange_code_pkce(&self.http, &self.settings, code, code_verifier).await
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        auth::refresh_token(&self.http, &self.settings, credential).await
    }

    async fn current_user(&self, client: &ClientHandle) -> Result<UserIdentity> {
        self.get_json(client, "/me", &[]).await
    }

    async fn lookup_tracks(&self, client: &ClientHandle, ids: &[String]) -> Result<Vec<Track>> {
        let ids = &ids[..ids.len().min(TRACKS_BATCH_SIZE)];
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let body: TracksResponse = self.get_json(client, "/tracks", &ids_query(ids)).await?;
        // unknown IDs come back as null; the batch layer reports the shortfall
        Ok(body.tracks.into_iter().flatten().collect())
    }

    async fn lookup_audio_features(
        &self,
        client: &ClientHandle,
        ids: &[String],
    ) -> Result<Vec<AudioFeatures>> {
        let ids = &ids[..ids.len().min(AUDIO_FEATURES_BATCH_SIZE)];
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let body: AudioFeaturesResponse = self
            .get_json(client, "/audio-features", &ids_query(ids))
            .await?;
        Ok(body.audio_features.into_iter().flatten().collect())
    }

    async fn recommend(
        &self,
        client: &ClientHandle,
        seed: &RecommendationSeed,
        options: &RecommendOptions,
    ) -> Result<Vec<Track>> {
        let query = recommendation_query(seed, options);
        let body: RecommendationsResponse =
            self.get_json(client, "/recommendations", &query).await?;
        debug!(count = body.tracks.len(), "recommendations received");
        Ok(body.tracks)
    }

    async fn recently_played(
        &self,
        client: &ClientHandle,
        limit: u32,
        before: Option<i64>,
    ) -> Result<HistoryPage> {
        let mut query = vec![("limit".to_string(), limit.min(50).to_string())];
        if let Some(before) = before {
            query.push(("before".to_string(), before.to_string()));
        }

        let body: RecentlyPlayedResponse = self
            .get_json(client, "/me/player/recently-played", &query)
            .await?;
        let next_before = body
            .cursors
            .and_then(|c| c.before)
            .and_then(|b| b.parse::<i64>().ok());

        Ok(HistoryPage {
            items: body.items,
            next_before,
        })
    }

    async fn top_tracks(&self, client: &ClientHandle, limit: u32) -> Result<Vec<Track>> {
        let query = [("limit".to_string(), limit.min(50).to_string())];
        let body: PagingResponse<Track> = self.get_json(client, "/me/top/tracks", &query).await?;
        Ok(body.items)
    }

    async fn top_artists(&self, client: &ClientHandle, limit: u32) -> Result<Vec<Artist>> {
        let query = [("limit".to_string(), limit.min(50).to_string())];
        let body: PagingResponse<Artist> =
            self.get_json(client, "/me/top/artists", &query).await?;
        Ok(body.items)
    }
}
