use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DurationRound, TimeDelta};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result, types::PlayedItem};

/// Plays of the same track that start inside the same window count once.
const REPLAY_WINDOW_SECS: i64 = 30;

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Splits `items` into consecutive chunks of at most `chunk_size` elements,
/// keeping their order. A zero `chunk_size` is treated as one.
pub fn chunk_ids<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Drops repeated IDs while keeping the first occurrence of each in place.
pub fn unique_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(Into::into)
        .filter(|id: &String| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Collapses duplicate plays produced by flaky connections and player
/// switches: two consecutive entries of the same track whose start times fall
/// into the same 30-second window are kept once.
pub fn normalize_recently_played(items: Vec<PlayedItem>) -> Vec<PlayedItem> {
    let window = TimeDelta::seconds(REPLAY_WINDOW_SECS);
    let mut normalized: Vec<PlayedItem> = Vec::with_capacity(items.len());

    for item in items {
        if let Some(prev) = normalized.last() {
            let same_track = prev.track.id == item.track.id;
            let same_window = match (
                prev.played_at.duration_trunc(window),
                item.played_at.duration_trunc(window),
            ) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same_track && same_window {
                continue;
            }
        }
        normalized.push(item);
    }

    normalized
}

/// Position in the listening history, handed to the browser as an opaque token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCursor {
    /// Only plays strictly before this millisecond timestamp are listed.
    pub before: i64,
}

impl HistoryCursor {
    pub fn encode(&self) -> String {
        // serializing two integers cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| Error::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCursor(e.to_string()))
    }
}
