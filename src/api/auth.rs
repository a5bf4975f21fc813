use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::warn;

use super::{AppState, authorize, cookies, render};
use crate::{Error, management::Ack, types::SessionKey};

/// Query string of the authorization redirect back to us.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn login(State(state): State<AppState>, jar: CookieJar) -> Response {
    match authorize(&state, jar, "/user").await {
        Ok((jar, _)) => (jar, Redirect::to("/user")).into_response(),
        Err(response) => response,
    }
}

pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let Some(key) = params
        .state
        .as_deref()
        .and_then(|raw| raw.parse::<SessionKey>().ok())
    else {
        warn!("callback without a valid state parameter");
        return Error::UnknownSession.into_response();
    };

    if let Some(reason) = params.error {
        return match state.session.fail_auth(key, &reason).await {
            Ok(()) => Html(render::reauthorize(&format!(
                "Spotify did not authorize the dashboard: {reason}"
            )))
            .into_response(),
            Err(e) => e.into_response(),
        };
    }

    let Some(code) = params.code else {
        return Html(render::message(
            "Login failed",
            "The callback carried no authorization code.",
        ))
        .into_response();
    };

    match state.session.complete_auth(&code, key).await {
        Ok(Ack::Completed {
            session_key,
            owner,
            return_to,
        }) => {
            let jar = jar
                .add(cookies::session_cookie(session_key, state.cookie_secure))
                .add(cookies::owner_cookie(&owner, state.cookie_secure));
            (jar, Redirect::to(&return_to)).into_response()
        }
        Ok(Ack::AlreadyHandled) => Redirect::to("/user").into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(key) = cookies::session_key(&jar) {
        state.session.logout(key).await;
    }
    let jar = cookies::clear_session_cookies(jar);
    (
        jar,
        Html(render::message("Logged out", "Your session has ended.")),
    )
        .into_response()
}
