use std::future::Future;

use tracing::debug;

use crate::{
    Error, Result,
    spotify::{AUDIO_FEATURES_BATCH_SIZE, ClientHandle, MusicService, TRACKS_BATCH_SIZE},
    types::{AudioFeatures, Track},
    utils,
};

/// Runs `lookup` once per chunk of at most `chunk_size` IDs, sequentially,
/// and concatenates the results in chunk order.
///
/// Empty input returns empty output without calling `lookup`. The first
/// failing chunk aborts the whole fetch and earlier results are dropped: a
/// silently shortened list would break the index parity between parallel
/// lookups (`tracks[i]` belongs to `features[i]`). For the same reason a chunk
/// that comes back with a different number of items is an error.
pub async fn fetch_chunked<T, F, Fut>(
    ids: &[String],
    chunk_size: usize,
    mut lookup: F,
) -> Result<Vec<T>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let chunks = utils::chunk_ids(ids, chunk_size);
    debug!(ids = ids.len(), chunks = chunks.len(), "batch lookup");

    let mut results = Vec::with_capacity(ids.len());
    for chunk in chunks {
        let requested = chunk.len();
        let items = lookup(chunk).await?;
        if items.len() != requested {
            return Err(Error::IncompleteBatch {
                requested,
                received: items.len(),
            });
        }
        results.extend(items);
    }

    Ok(results)
}

/// Chunked catalog lookups for one authenticated client.
pub struct BatchFetcher<'a> {
    service: &'a dyn MusicService,
    client: &'a ClientHandle,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(service: &'a dyn MusicService, client: &'a ClientHandle) -> Self {
        Self { service, client }
    }

    /// Full tracks for `ids`, in input order.
    pub async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Track>> {
        let (service, client) = (self.service, self.client);
        fetch_chunked(ids, TRACKS_BATCH_SIZE, move |chunk| async move {
            service.lookup_tracks(client, &chunk).await
        })
        .await
    }

    /// Audio features for `ids`, in input order.
    pub async fn fetch_audio_features(&self, ids: &[String]) -> Result<Vec<AudioFeatures>> {
        let (service, client) = (self.service, self.client);
        fetch_chunked(ids, AUDIO_FEATURES_BATCH_SIZE, move |chunk| async move {
            service.lookup_audio_features(client, &chunk).await
        })
        .await
    }
}
