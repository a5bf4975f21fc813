#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use spotdash::{
    Error, Result,
    management::{MemoryTokenStore, StoredToken, TokenFields, TokenStore},
    spotify::{ClientHandle, MusicService, RecommendOptions, RecommendationSeed},
    types::{
        Artist, AudioFeatures, Credential, HistoryPage, PlayedItem, SimpleAlbum, SimpleArtist,
        Track, UserIdentity,
    },
};

pub const OWNER: &str = "alice";

pub fn track(id: &str, release_date: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {id}"),
        uri: format!("spotify:track:{id}"),
        artists: vec![SimpleArtist {
            id: format!("artist-{id}"),
            name: format!("Artist {id}"),
        }],
        album: SimpleAlbum {
            id: format!("album-{id}"),
            name: format!("Album {id}"),
            release_date: release_date.to_string(),
        },
        popularity: 50,
        duration_ms: 180_000,
    }
}

pub fn tracks(count: usize) -> Vec<Track> {
    (0..count).map(|i| track(&format!("t{i}"), "2020-01-01")).collect()
}

pub fn features(id: &str, value: f64) -> AudioFeatures {
    AudioFeatures {
        id: id.to_string(),
        acousticness: value,
        instrumentalness: value,
        liveness: value,
        energy: value,
        valence: value,
        ..AudioFeatures::default()
    }
}

pub fn artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        name: format!("Artist {id}"),
        genres: vec![],
        popularity: 70,
    }
}

pub fn played(id: &str, at: &str) -> PlayedItem {
    PlayedItem {
        track: track(id, "2020-01-01"),
        played_at: at.parse::<DateTime<Utc>>().unwrap(),
    }
}

pub fn credential(access: &str, expires_in: u64) -> Credential {
    Credential::from_grant(
        access.to_string(),
        format!("refresh-{access}"),
        expires_in,
        "user-read-private user-top-read",
    )
}

pub fn client(access: &str) -> ClientHandle {
    ClientHandle::new(credential(access, 3600))
}

#[derive(Default)]
pub struct Calls {
    pub exchange_code: AtomicUsize,
    pub refresh: AtomicUsize,
    pub current_user: AtomicUsize,
    pub lookup_tracks: AtomicUsize,
    pub lookup_audio_features: AtomicUsize,
    pub recommend: AtomicUsize,
    pub recently_played: AtomicUsize,
    pub top_tracks: AtomicUsize,
    pub top_artists: AtomicUsize,
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

/// Scripted music service. Every catalog item it knows comes from the
/// public fields; every call is counted.
#[derive(Default)]
pub struct FakeMusicService {
    pub calls: Calls,
    pub catalog: Mutex<HashMap<String, Track>>,
    /// Features reported for any requested ID; defaults to 0.5 everywhere.
    pub feature_value: Mutex<Option<f64>>,
    pub recommendations: Mutex<Vec<Track>>,
    pub history: Mutex<HistoryPage>,
    pub top_tracks: Mutex<Vec<Track>>,
    pub top_artists: Mutex<Vec<Artist>>,
    /// Seeds of every recommendation request, in call order.
    pub seen_seeds: Mutex<Vec<RecommendationSeed>>,
    pub refresh_fails: AtomicBool,
    /// 1-based call number of `lookup_tracks` that fails.
    pub fail_tracks_call: Mutex<Option<usize>>,
}

impl FakeMusicService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_catalog(tracks: &[Track]) -> Arc<Self> {
        let service = Self::default();
        {
            let mut catalog = service.catalog.lock().unwrap();
            for track in tracks {
                catalog.insert(track.id.clone(), track.clone());
            }
        }
        Arc::new(service)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicService for FakeMusicService {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        format!("https://accounts.test/authorize?state={state}&code_challenge={code_challenge}")
    }

    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> Result<Credential> {
        let n = bump(&self.calls.exchange_code);
        if code == "bad-code" {
            return Err(Error::Authorization("invalid_grant".into()));
        }
        Ok(credential(&format!("access-{n}"), 3600))
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let n = bump(&self.calls.refresh);
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(Error::Service {
                status: 503,
                message: "unavailable".into(),
            });
        }
        let mut fresh = self::credential(&format!("refreshed-{n}"), 3600);
        fresh.refresh_token = credential.refresh_token.clone();
        Ok(fresh)
    }

    async fn current_user(&self, _client: &ClientHandle) -> Result<UserIdentity> {
        bump(&self.calls.current_user);
        Ok(UserIdentity {
            id: OWNER.to_string(),
            display_name: Some("Alice".to_string()),
            country: Some("DE".to_string()),
        })
    }

    async fn lookup_tracks(&self, _client: &ClientHandle, ids: &[String]) -> Result<Vec<Track>> {
        let n = bump(&self.calls.lookup_tracks);
        if *self.fail_tracks_call.lock().unwrap() == Some(n) {
            return Err(Error::Service {
                status: 500,
                message: "boom".into(),
            });
        }
        let catalog = self.catalog.lock().unwrap();
        Ok(ids.iter().filter_map(|id| catalog.get(id).cloned()).collect())
    }

    async fn lookup_audio_features(
        &self,
        _client: &ClientHandle,
        ids: &[String],
    ) -> Result<Vec<AudioFeatures>> {
        bump(&self.calls.lookup_audio_features);
        let value = self.feature_value.lock().unwrap().unwrap_or(0.5);
        Ok(ids.iter().map(|id| features(id, value)).collect())
    }

    async fn recommend(
        &self,
        _client: &ClientHandle,
        seed: &RecommendationSeed,
        _options: &RecommendOptions,
    ) -> Result<Vec<Track>> {
        bump(&self.calls.recommend);
        self.seen_seeds.lock().unwrap().push(seed.clone());
        Ok(self.recommendations.lock().unwrap().clone())
    }

    async fn recently_played(
        &self,
        _client: &ClientHandle,
        _limit: u32,
        _before: Option<i64>,
    ) -> Result<HistoryPage> {
        bump(&self.calls.recently_played);
        Ok(self.history.lock().unwrap().clone())
    }

    async fn top_tracks(&self, _client: &ClientHandle, _limit: u32) -> Result<Vec<Track>> {
        bump(&self.calls.top_tracks);
        Ok(self.top_tracks.lock().unwrap().clone())
    }

    async fn top_artists(&self, _client: &ClientHandle, _limit: u32) -> Result<Vec<Artist>> {
        bump(&self.calls.top_artists);
        Ok(self.top_artists.lock().unwrap().clone())
    }
}

/// In-memory token store that counts reads and updates.
#[derive(Default)]
pub struct CountingTokenStore {
    pub inner: MemoryTokenStore,
    pub reads: AtomicUsize,
    pub updates: AtomicUsize,
}

impl CountingTokenStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Seeds a record for `owner` without counting it as a write.
    pub async fn seed(&self, owner: &str, credential: &Credential) {
        self.inner
            .upsert_merge(owner, TokenFields::credential(credential))
            .await
            .unwrap();
    }

    pub async fn peek(&self, owner: &str) -> Option<StoredToken> {
        self.inner.read(owner).await.unwrap()
    }
}

#[async_trait]
impl TokenStore for CountingTokenStore {
    async fn read(&self, owner: &str) -> Result<Option<StoredToken>> {
        bump(&self.reads);
        self.inner.read(owner).await
    }

    async fn upsert_merge(&self, owner: &str, fields: TokenFields) -> Result<()> {
        self.inner.upsert_merge(owner, fields).await
    }

    async fn update(&self, owner: &str, credential: &Credential) -> Result<()> {
        bump(&self.updates);
        self.inner.update(owner, credential).await
    }
}
