use std::{collections::HashMap, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

use crate::{
    spotify::ClientHandle,
    types::{Credential, SessionKey},
};

struct CacheEntry {
    client: ClientHandle,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// In-memory map from session key to authenticated client handle.
///
/// The single authority for "is this session already authenticated". Every
/// operation takes the internal lock for its whole duration, so each get,
/// put and invalidate is atomic with respect to the others. Expired entries
/// are dropped lazily on access and by [`purge_expired`](Self::purge_expired).
///
/// A hit does not look at the credential's own expiry; callers check
/// [`Credential::expires_within`] before making privileged calls.
pub struct CredentialCache {
    entries: Mutex<HashMap<SessionKey, CacheEntry>>,
    ceiling: Duration,
}

impl CredentialCache {
    /// Creates an empty cache whose entries never live longer than `ceiling`.
    pub fn new(ceiling: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ceiling,
        }
    }

    /// Lifetime for an entry holding `credential`: whatever the token has
    /// left, but never more than the in-memory ceiling.
    pub fn ttl_for(&self, credential: &Credential) -> Duration {
        credential.remaining().min(self.ceiling)
    }

    pub async fn get(&self, key: &SessionKey) -> Option<ClientHandle> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.client.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(session = %key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Inserts `client` under `key`, replacing any previous entry whole.
    pub async fn put(&self, key: SessionKey, client: ClientHandle, ttl: Duration) {
        let entry = CacheEntry {
            client,
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries.lock().await.insert(key, entry);
        debug!(session = %key, ttl_secs = ttl.as_secs(), "client cached");
    }

    /// Removes the entry for `key`. Returns whether one was present.
    pub async fn invalidate(&self, key: &SessionKey) -> bool {
        let removed = self.entries.lock().await.remove(key).is_some();
        if removed {
            debug!(session = %key, "cache entry invalidated");
        }
        removed
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
