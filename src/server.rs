//! Router construction and the serving loop.

use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    Error, Result, api,
    config::Config,
    engine::{RecommendationEngine, ReleaseYearFilter},
    management::{AuthSession, FileTokenStore, TokenStore},
    spotify::{MusicService, RecommendOptions, SpotifyClient},
};

pub fn build_router(state: api::AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/logout", get(api::logout))
        .route("/user", get(api::user))
        .route("/recommend", get(api::recommend))
        .route("/mood", get(api::mood))
        .route("/discover", get(api::discover))
        .route("/history", get(api::history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wires the Spotify client, token store, session and engine together from
/// `config`.
pub fn build_state(config: &Config) -> api::AppState {
    let service: Arc<dyn MusicService> = Arc::new(SpotifyClient::new(config.spotify.clone()));
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.token_dir.clone()));
    let session = Arc::new(AuthSession::new(
        Arc::clone(&service),
        store,
        config.session.clone(),
    ));

    let options = RecommendOptions {
        limit: config.recommend_limit,
        country: None,
    };
    let engine = RecommendationEngine::new(Arc::clone(&service), options)
        .with_release_filter(config.from_year.map(|from_year| ReleaseYearFilter { from_year }));

    api::AppState {
        session,
        engine: Arc::new(engine),
        service,
        cookie_secure: config.cookie_secure,
    }
}

/// Serves the dashboard until Ctrl-C, then stops the session reaper.
pub async fn start_api_server(config: Config) -> Result<()> {
    let addr = SocketAddr::from_str(&config.server_addr).map_err(|e| {
        Error::Config(format!(
            "invalid server address {}: {}",
            config.server_addr, e
        ))
    })?;

    let state = build_state(&config);
    let session = Arc::clone(&state.session);
    session.spawn_reaper().await;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "dashboard listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    session.shutdown().await;
    info!("dashboard stopped");
    Ok(())
}
