//! One-shot handoff between the OAuth callback and the page request waiting
//! for its result.
//!
//! The browser-redirect protocol splits "who starts authorization" (a page
//! handler that found no credential) from "who finishes it" (the callback
//! handler, on its own request, at an unpredictable time). Each started
//! authorization gets a [`PendingAuth`] slot keyed by its [`SessionKey`]:
//!
//! ```text
//! Idle ──begin──► AwaitingCallback ──claim──► Exchanging ──deliver──► Delivered
//!                        │                        │
//!                        │                        └──deliver(Failed)──► Failed
//!                        └──────── wait() exceeds its bound ──► removed (TimedOut)
//! ```
//!
//! A delivered slot lives only as long as somebody waits on it: the first
//! waiter to consume it, or the delivery itself when nobody waits, removes
//! it. A slot accepts exactly one delivery; later deliveries are ignored. Every
//! wait is bounded by a timeout, and a waiter that goes away (client
//! disconnected, future dropped) releases nothing but its own receiver.
//! Slots nobody claims are collected by [`AuthHandoff::purge_expired`].

use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::{Mutex, watch},
    time::{Instant, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    spotify::{ClientHandle, MusicService},
    types::SessionKey,
    utils,
};

/// The single value published on a pending authorization.
#[derive(Debug, Clone)]
pub enum Delivery {
    Client(ClientHandle),
    Failed(String),
}

/// What a waiting request ends up with.
#[derive(Debug, Clone)]
pub enum HandoffOutcome {
    Delivered(ClientHandle),
    Failed(String),
    TimedOut,
    /// No pending authorization exists (anymore) for the key.
    NotPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    AwaitingCallback,
    Exchanging,
    Delivered,
    Failed,
}

/// Result of [`AuthHandoff::begin`]: where to send the browser.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub session_key: SessionKey,
    pub authorize_url: String,
}

/// Handed to the one callback allowed to complete a pending authorization.
#[derive(Debug, Clone)]
pub struct Claim {
    pub code_verifier: String,
    pub return_to: String,
}

struct PendingAuth {
    code_verifier: String,
    return_to: String,
    state: HandoffState,
    created_at: Instant,
    sender: watch::Sender<Option<Delivery>>,
    receiver: watch::Receiver<Option<Delivery>>,
}

/// Table of pending authorizations.
pub struct AuthHandoff {
    pending: Mutex<HashMap<SessionKey, PendingAuth>>,
    ttl: Duration,
}

impl AuthHandoff {
    /// `ttl` bounds how long an unclaimed slot survives before collection.
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Starts an authorization: mints a session key and PKCE verifier,
    /// records the pending slot and builds the authorization URL carrying the
    /// key as `state`.
    pub async fn begin(&self, service: &dyn MusicService, return_to: &str) -> PendingLogin {
        let session_key = SessionKey::new();
        let code_verifier = utils::generate_code_verifier();
        let code_challenge = utils::generate_code_challenge(&code_verifier);
        let (sender, receiver) = watch::channel(None);

        self.pending.lock().await.insert(
            session_key,
            PendingAuth {
                code_verifier,
                return_to: return_to.to_string(),
                state: HandoffState::AwaitingCallback,
                created_at: Instant::now(),
                sender,
                receiver,
            },
        );

        info!(session = %session_key, return_to, "authorization started");
        PendingLogin {
            session_key,
            authorize_url: service.authorize_url(&session_key.to_string(), &code_challenge),
        }
    }

    /// Reserves the slot for the callback that will complete it.
    ///
    /// Returns `Ok(None)` when another callback already claimed the slot, so
    /// a repeated callback becomes a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSession`] when no slot exists for `key` (never started,
    /// consumed, timed out or collected).
    pub async fn claim(&self, key: &SessionKey) -> Result<Option<Claim>> {
        let mut pending = self.pending.lock().await;
        let slot = pending.get_mut(key).ok_or(Error::UnknownSession)?;

        if slot.state != HandoffState::AwaitingCallback {
            debug!(session = %key, state = ?slot.state, "authorization already claimed");
            return Ok(None);
        }

        slot.state = HandoffState::Exchanging;
        Ok(Some(Claim {
            code_verifier: slot.code_verifier.clone(),
            return_to: slot.return_to.clone(),
        }))
    }

    /// Publishes the outcome of a pending authorization.
    ///
    /// Only the first delivery for a slot is published; the return value
    /// tells whether this call was it. With nobody waiting the slot is
    /// released right away, since the outcome already lives in the
    /// credential cache (or nowhere, for a failure).
    pub async fn deliver(&self, key: &SessionKey, delivery: Delivery) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(slot) = pending.get_mut(key) else {
            debug!(session = %key, "delivery for unknown session dropped");
            return false;
        };

        if matches!(slot.state, HandoffState::Delivered | HandoffState::Failed) {
            warn!(session = %key, "duplicate delivery ignored");
            return false;
        }

        slot.state = match delivery {
            Delivery::Client(_) => HandoffState::Delivered,
            Delivery::Failed(_) => HandoffState::Failed,
        };
        slot.sender.send_replace(Some(delivery));

        // the slot keeps one receiver of its own
        if slot.sender.receiver_count() <= 1 {
            pending.remove(key);
            debug!(session = %key, "no waiter, authorization slot released");
        }
        true
    }

    /// Waits at most `limit` for the slot of `key` to be delivered.
    ///
    /// A consumed or timed-out slot is removed. Dropping the returned future
    /// only releases this waiter's receiver; the slot stays for the callback.
    pub async fn wait(&self, key: &SessionKey, limit: Duration) -> HandoffOutcome {
        let mut receiver = {
            let pending = self.pending.lock().await;
            match pending.get(key) {
                Some(slot) => slot.receiver.clone(),
                None => return HandoffOutcome::NotPending,
            }
        };

        // copy the value out so no watch guard lives across an await
        let waited = timeout(limit, receiver.wait_for(Option::is_some))
            .await
            .map(|changed| changed.map(|value| value.clone()));

        let delivered = match waited {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => {
                // slot collected while we waited
                return HandoffOutcome::NotPending;
            }
            Err(_) => {
                self.pending.lock().await.remove(key);
                warn!(session = %key, waited_secs = limit.as_secs(), "authorization timed out");
                return HandoffOutcome::TimedOut;
            }
        };

        self.pending.lock().await.remove(key);
        match delivered {
            Some(Delivery::Client(client)) => HandoffOutcome::Delivered(client),
            Some(Delivery::Failed(reason)) => HandoffOutcome::Failed(reason),
            None => HandoffOutcome::NotPending,
        }
    }

    pub async fn state(&self, key: &SessionKey) -> Option<HandoffState> {
        self.pending.lock().await.get(key).map(|slot| slot.state)
    }

    /// Whether an authorization for `key` is still waiting on its callback.
    /// Delivered slots only linger for their waiters and do not count.
    pub async fn is_pending(&self, key: &SessionKey) -> bool {
        matches!(
            self.state(key).await,
            Some(HandoffState::AwaitingCallback | HandoffState::Exchanging)
        )
    }

    /// Drops the slot of `key` whatever its state. Waiters still holding a
    /// receiver see the slot as collected.
    pub async fn forget(&self, key: &SessionKey) -> bool {
        self.pending.lock().await.remove(key).is_some()
    }

    /// Removes slots older than the configured TTL, whatever their state.
    pub async fn purge_expired(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let now = Instant::now();
        let before = pending.len();
        pending.retain(|_, slot| now.duration_since(slot.created_at) < self.ttl);
        before - pending.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
