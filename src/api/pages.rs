use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::{AppState, authorize, render};
use crate::{
    Error, Result,
    engine::{BatchFetcher, MAX_SEEDS},
    utils::HistoryCursor,
};

/// Track IDs accepted from `/recommend?t=`; extras are ignored.
const MAX_REQUESTED_TRACKS: usize = 5;
const HISTORY_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    /// Comma-separated track IDs.
    #[serde(default)]
    pub t: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub cursor: Option<String>,
}

fn respond(jar: CookieJar, page: Result<String>) -> Response {
    match page {
        Ok(html) => (jar, Html(html)).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

/// The IDs in `/recommend?t=` come from the user, so a lookup that cannot
/// resolve them is a bad request rather than a server fault.
fn seed_lookup_error(error: Error, ids: &[String]) -> Error {
    match error {
        Error::IncompleteBatch { .. } | Error::Service { status: 400 | 404, .. } => {
            Error::UnknownSeed(ids.join(","))
        }
        other => other,
    }
}

pub async fn user(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, client) = match authorize(&state, jar, "/user").await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let page = state
        .service
        .current_user(&client)
        .await
        .map(|user| render::user(&user));
    respond(jar, page)
}

pub async fn recommend(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<RecommendQuery>,
) -> Response {
    let return_to = format!("/recommend?t={}", urlencoding::encode(&query.t));
    let (jar, client) = match authorize(&state, jar, &return_to).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let ids: Vec<String> = query
        .t
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .take(MAX_REQUESTED_TRACKS)
        .map(str::to_string)
        .collect();

    let page = async {
        let seeds = BatchFetcher::new(state.service.as_ref(), &client)
            .fetch_many(&ids)
            .await
            .map_err(|e| seed_lookup_error(e, &ids))?;
        let tracks = state.engine.recommend(&client, &seeds, &ids).await?;
        let shown = seeds.len().min(MAX_SEEDS);
        Ok::<_, Error>(render::recommendations(
            "Recommendations",
            &seeds[..shown],
            &tracks,
        ))
    }
    .await;
    respond(jar, page)
}

pub async fn mood(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, client) = match authorize(&state, jar, "/mood").await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let page = state
        .engine
        .recommend_from_recent(&client)
        .await
        .map(|tracks| render::recommendations("Your current mood", &[], &tracks));
    respond(jar, page)
}

pub async fn discover(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, client) = match authorize(&state, jar, "/discover").await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let page = state
        .engine
        .recommend_from_top(&client)
        .await
        .map(|tracks| render::recommendations("Discover", &[], &tracks));
    respond(jar, page)
}

pub async fn history(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let return_to = match &query.cursor {
        Some(cursor) => format!("/history?cursor={}", urlencoding::encode(cursor)),
        None => "/history".to_string(),
    };
    let (jar, client) = match authorize(&state, jar, &return_to).await {
        Ok(authorized) => authorized,
        Err(response) => return response,
    };

    let page = async {
        let before = match query.cursor.as_deref() {
            Some(token) => Some(HistoryCursor::decode(token)?.before),
            None => None,
        };
        let played = state
            .service
            .recently_played(&client, HISTORY_PAGE_SIZE, before)
            .await?;
        let next = played
            .next_before
            .map(|before| HistoryCursor { before }.encode());
        Ok::<_, Error>(render::history(&played.items, next.as_deref()))
    }
    .await;
    respond(jar, page)
}
