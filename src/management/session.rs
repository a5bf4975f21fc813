use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    config::SessionSettings,
    spotify::{ClientHandle, MusicService},
    types::{Credential, SessionKey, UserIdentity},
};

use super::{
    cache::CredentialCache,
    handoff::{AuthHandoff, Delivery, HandoffOutcome},
    store::{TokenFields, TokenStore},
};

/// A credential this close to expiry is refreshed before it is handed out.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(240);

/// What a page request knows about its caller.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Session key from the caller's cookie, if any.
    pub session_key: Option<SessionKey>,
    /// Music-service user ID the caller authorized as before, if any.
    pub owner: Option<String>,
    /// Where to send the browser once authorization completes.
    pub return_to: String,
}

#[derive(Debug, Clone)]
pub enum Acquired {
    Ready {
        session_key: SessionKey,
        client: ClientHandle,
    },
    /// The browser must visit `url` to authorize; the callback will carry
    /// `session_key` as its state.
    RedirectRequired { session_key: SessionKey, url: String },
    /// Authorization for this session is in flight; wait on
    /// [`AuthSession::await_client`].
    AuthPending(SessionKey),
}

/// Answer to a completed callback.
#[derive(Debug, Clone)]
pub enum Ack {
    Completed {
        session_key: SessionKey,
        owner: String,
        return_to: String,
    },
    /// The callback for this session was already processed.
    AlreadyHandled,
}

/// Process-wide authentication context: the credential cache, the pending
/// authorization table and the durable token store behind them.
///
/// Built once at startup and shared by every handler through an `Arc`.
pub struct AuthSession {
    service: Arc<dyn MusicService>,
    store: Arc<dyn TokenStore>,
    cache: CredentialCache,
    handoff: AuthHandoff,
    settings: SessionSettings,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl AuthSession {
    pub fn new(
        service: Arc<dyn MusicService>,
        store: Arc<dyn TokenStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            service,
            store,
            cache: CredentialCache::new(settings.cache_ttl_ceiling),
            handoff: AuthHandoff::new(settings.pending_ttl),
            settings,
            reaper: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn handoff(&self) -> &AuthHandoff {
        &self.handoff
    }

    /// Finds a usable client for the caller.
    ///
    /// Lookup order: the credential cache, an authorization already in
    /// flight for the same session, the token store record of the owner, and
    /// finally a fresh authorization. Store failures and unusable records are
    /// treated as misses.
    pub async fn acquire_client(&self, ctx: &RequestContext) -> Acquired {
        let owner = ctx.owner.as_deref();

        if let Some(key) = ctx.session_key {
            if let Some(client) = self.cache.get(&key).await {
                if let Some(client) = self.ensure_fresh(key, client, owner).await {
                    return Acquired::Ready {
                        session_key: key,
                        client,
                    };
                }
            } else if self.handoff.is_pending(&key).await {
                return Acquired::AuthPending(key);
            }
        }

        if let Some(owner) = owner {
            if let Some(client) = self.load_stored(owner).await {
                let key = ctx.session_key.unwrap_or_default();
                self.cache
                    .put(key, client.clone(), self.cache.ttl_for(client.credential()))
                    .await;
                info!(session = %key, owner, "client restored from token store");
                return Acquired::Ready {
                    session_key: key,
                    client,
                };
            }
        }

        let login = self
            .handoff
            .begin(self.service.as_ref(), &ctx.return_to)
            .await;
        Acquired::RedirectRequired {
            session_key: login.session_key,
            url: login.authorize_url,
        }
    }

    /// Waits, bounded by the configured handoff timeout, for the
    /// authorization of `key` to finish.
    pub async fn await_client(&self, key: SessionKey) -> Result<ClientHandle> {
        match self.handoff.wait(&key, self.settings.handoff_timeout).await {
            HandoffOutcome::Delivered(client) => Ok(client),
            HandoffOutcome::Failed(reason) => Err(Error::Authorization(reason)),
            HandoffOutcome::TimedOut => Err(Error::Authorization(
                "timed out waiting for authorization".into(),
            )),
            // the callback may already have been consumed by another waiter
            HandoffOutcome::NotPending => self.cache.get(&key).await.ok_or(Error::UnknownSession),
        }
    }

    /// Finishes the authorization identified by `key` with the code from the
    /// callback.
    ///
    /// On success the client is cached, the credential and user profile are
    /// merged into the token store and the client is delivered to any
    /// waiting request. A repeated callback for the same key is acknowledged
    /// with [`Ack::AlreadyHandled`] and changes nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownSession`] when `key` has neither a pending
    ///   authorization nor a cached client
    /// - the exchange or profile lookup error; the failure is also delivered
    ///   to waiters
    pub async fn complete_auth(&self, code: &str, key: SessionKey) -> Result<Ack> {
        let claim = match self.handoff.claim(&key).await {
            Ok(Some(claim)) => claim,
            Ok(None) => return Ok(Ack::AlreadyHandled),
            Err(Error::UnknownSession) => {
                // the slot is gone but the session it produced is still cached
                if self.cache.get(&key).await.is_some() {
                    debug!(session = %key, "callback for completed session");
                    return Ok(Ack::AlreadyHandled);
                }
                return Err(Error::UnknownSession);
            }
            Err(e) => return Err(e),
        };

        let (client, user) = match self.exchange(code, &claim.code_verifier).await {
            Ok(authorized) => authorized,
            Err(e) => {
                warn!(session = %key, error = %e, "code exchange failed");
                self.handoff
                    .deliver(&key, Delivery::Failed(e.to_string()))
                    .await;
                return Err(e);
            }
        };

        self.cache
            .put(key, client.clone(), self.cache.ttl_for(client.credential()))
            .await;

        let fields = TokenFields::credential(client.credential()).with_user(&user);
        if let Err(e) = self.store.upsert_merge(&user.id, fields).await {
            warn!(owner = %user.id, error = %e, "could not persist credential");
        }

        self.handoff.deliver(&key, Delivery::Client(client)).await;
        info!(session = %key, owner = %user.id, "authorization completed");

        Ok(Ack::Completed {
            session_key: key,
            owner: user.id,
            return_to: claim.return_to,
        })
    }

    /// Ends the authorization of `key` without a code (the user declined,
    /// or the service reported an error on the callback).
    pub async fn fail_auth(&self, key: SessionKey, reason: &str) -> Result<()> {
        if self.handoff.claim(&key).await?.is_some() {
            self.handoff
                .deliver(&key, Delivery::Failed(reason.to_string()))
                .await;
            info!(session = %key, reason, "authorization declined");
        }
        Ok(())
    }

    /// Forgets the cached client of `key` and any authorization slot it
    /// still has. The token store is left alone.
    pub async fn logout(&self, key: SessionKey) -> bool {
        let cached = self.cache.invalidate(&key).await;
        let pending = self.handoff.forget(&key).await;
        cached || pending
    }

    /// Purges expired cache entries and stale pending authorizations once.
    pub async fn reap(&self) -> (usize, usize) {
        let cached = self.cache.purge_expired().await;
        let pending = self.handoff.purge_expired().await;
        if cached + pending > 0 {
            debug!(cached, pending, "reaped expired session state");
        }
        (cached, pending)
    }

    /// Starts the periodic purge task. The task holds only a weak reference
    /// and ends on its own once the session is dropped.
    pub async fn spawn_reaper(self: &Arc<Self>) {
        let session: Weak<Self> = Arc::downgrade(self);
        let every = self.settings.reap_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.reap().await;
            }
        });

        if let Some(previous) = self.reaper.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Stops the purge task, if running.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.reaper.lock().await.take() {
            handle.abort();
            debug!("session reaper stopped");
        }
    }

    async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<(ClientHandle, UserIdentity)> {
        let credential = self.service.exchange_code(code, code_verifier).await?;
        let client = self.service.new_client(credential);
        let user = self.service.current_user(&client).await?;
        Ok((client, user))
    }

    /// Returns `client` if its credential is good for a while, a client with
    /// a refreshed credential (replacing the cache entry) if not, or `None`
    /// after invalidating the session when the credential is unusable.
    async fn ensure_fresh(
        &self,
        key: SessionKey,
        client: ClientHandle,
        owner: Option<&str>,
    ) -> Option<ClientHandle> {
        if !client.credential().expires_within(REFRESH_MARGIN) {
            return Some(client);
        }

        match self.refreshed(owner, client.credential()).await {
            Some(credential) if credential == *client.credential() => Some(client),
            Some(credential) => {
                let fresh = self.service.new_client(credential);
                self.cache
                    .put(key, fresh.clone(), self.cache.ttl_for(fresh.credential()))
                    .await;
                Some(fresh)
            }
            None => {
                self.cache.invalidate(&key).await;
                None
            }
        }
    }

    async fn load_stored(&self, owner: &str) -> Option<ClientHandle> {
        let record = match self.store.read(owner).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(owner, error = %e, "token store read failed");
                return None;
            }
        };

        let Some(credential) = record.credential() else {
            warn!(owner, "stored token record is incomplete");
            return None;
        };

        self.refreshed(Some(owner), &credential)
            .await
            .map(|credential| self.service.new_client(credential))
    }

    /// The credential to use in place of `credential`: itself while it is
    /// not close to expiry, otherwise a refreshed one. A failed refresh
    /// falls back to the current credential while it is still valid.
    async fn refreshed(&self, owner: Option<&str>, credential: &Credential) -> Option<Credential> {
        if !credential.expires_within(REFRESH_MARGIN) {
            return Some(credential.clone());
        }

        match self.service.refresh(credential).await {
            Ok(fresh) => {
                if let Some(owner) = owner {
                    if let Err(e) = self.store.update(owner, &fresh).await {
                        warn!(owner, error = %e, "could not persist refreshed credential");
                    }
                }
                debug!("credential refreshed");
                Some(fresh)
            }
            Err(e) if credential.is_expired() => {
                warn!(error = %e, "refresh of expired credential failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping current credential");
                Some(credential.clone())
            }
        }
    }
}
