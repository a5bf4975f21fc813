use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use super::render;
use crate::Error;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            e if e.requires_reauth() => StatusCode::UNAUTHORIZED,
            e if e.is_transient() => StatusCode::BAD_GATEWAY,
            Error::InsufficientSeeds
            | Error::UnknownSeed(_)
            | Error::EmptyTrackSet
            | Error::InvalidCursor(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }

        let body = if self.requires_reauth() {
            render::reauthorize(&self.to_string())
        } else if self.is_transient() {
            render::message(
                "Spotify is not responding",
                &format!("{self}. Please try again in a moment."),
            )
        } else {
            render::message("Something went wrong", &self.to_string())
        };

        (status, Html(body)).into_response()
    }
}
