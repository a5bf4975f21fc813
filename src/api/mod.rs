//! # API Module
//!
//! HTTP handlers of the dashboard. Every page handler follows the same path:
//!
//! 1. Build a [`RequestContext`] from the session and user cookies
//! 2. Ask [`AuthSession::acquire_client`] for a client
//! 3. Redirect to the authorization page, wait for an in-flight
//!    authorization, or continue with the client
//! 4. Call the service or the recommendation engine and render HTML
//!
//! Failures are [`crate::Error`] values; their `IntoResponse` impl picks the
//! status code and renders either a message or a re-authorize prompt.
//!
//! ## Endpoints
//!
//! - `/health` - status, version and session counters as JSON
//! - `/login`, `/callback`, `/logout` - authorization flow
//! - `/user` - the logged-in profile
//! - `/recommend?t=<id,id>` - recommendations seeded by explicit tracks
//! - `/mood` - recommendations from recent listening
//! - `/discover` - recommendations from top artists
//! - `/history?cursor=<token>` - paged listening history

use std::sync::Arc;

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    engine::RecommendationEngine,
    management::{Acquired, AuthSession, RequestContext},
    spotify::{ClientHandle, MusicService},
};

mod auth;
mod cookies;
mod error;
mod health;
mod pages;
mod render;

pub use auth::{callback, login, logout};
pub use health::health;
pub use pages::{discover, history, mood, recommend, user};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<AuthSession>,
    pub engine: Arc<RecommendationEngine>,
    pub service: Arc<dyn MusicService>,
    pub cookie_secure: bool,
}

/// Resolves the caller's client, or the response that sends the browser to
/// authorization (or explains why it cannot continue).
async fn authorize(
    state: &AppState,
    jar: CookieJar,
    return_to: &str,
) -> Result<(CookieJar, ClientHandle), Response> {
    let ctx = RequestContext {
        session_key: cookies::session_key(&jar),
        owner: cookies::owner(&jar),
        return_to: return_to.to_string(),
    };

    match state.session.acquire_client(&ctx).await {
        Acquired::Ready {
            session_key,
            client,
        } => {
            let jar = jar.add(cookies::session_cookie(session_key, state.cookie_secure));
            Ok((jar, client))
        }
        Acquired::RedirectRequired { session_key, url } => {
            let jar = jar.add(cookies::session_cookie(session_key, state.cookie_secure));
            Err((jar, Redirect::to(&url)).into_response())
        }
        Acquired::AuthPending(session_key) => match state.session.await_client(session_key).await
        {
            Ok(client) => Ok((jar, client)),
            Err(e) => Err((cookies::clear_session_cookies(jar), e).into_response()),
        },
    }
}
